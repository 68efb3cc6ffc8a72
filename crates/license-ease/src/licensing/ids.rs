//! Short human-readable identifiers for applications and companies.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;

pub const APPLICATION_PREFIX: char = 'A';
pub const COMPANY_PREFIX: char = 'C';

/// Produces `prefix` followed by six `[A-Z0-9]` characters, drawing again until `taken`
/// reports the candidate as free.
pub fn generate_id<R, F>(rng: &mut R, prefix: char, mut taken: F) -> String
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> bool,
{
    loop {
        let candidate = candidate(rng, prefix);
        if !taken(&candidate) {
            return candidate;
        }
        tracing::debug!(%candidate, "identifier collision, regenerating");
    }
}

fn candidate<R: Rng + ?Sized>(rng: &mut R, prefix: char) -> String {
    let mut id = String::with_capacity(SUFFIX_LEN + 1);
    id.push(prefix);
    for _ in 0..SUFFIX_LEN {
        let index = rng.gen_range(0..ALPHABET.len());
        id.push(ALPHABET[index] as char);
    }
    id
}

/// Checks the `prefix + 6 x [A-Z0-9]` shape.
pub fn is_well_formed(id: &str, prefix: char) -> bool {
    let mut chars = id.chars();
    chars.next() == Some(prefix)
        && id.len() == SUFFIX_LEN + 1
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

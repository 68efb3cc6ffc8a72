use chrono::{DateTime, Utc};

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];
pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Reasons an uploaded document is refused before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileRejection {
    #[error("file name is empty")]
    EmptyName,
    #[error("file '{filename}' has no extension; allowed: {allowed}")]
    MissingExtension { filename: String, allowed: String },
    #[error("invalid file type for {filename}; allowed: {allowed}")]
    DisallowedExtension { filename: String, allowed: String },
    #[error("file '{filename}' is {size} bytes, exceeding the {max} byte limit")]
    TooLarge {
        filename: String,
        size: u64,
        max: u64,
    },
}

/// Allowed extensions and size cap applied to every uploaded file.
#[derive(Debug, Clone)]
pub struct FileIntakePolicy {
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl Default for FileIntakePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_BYTES)
    }
}

impl FileIntakePolicy {
    pub fn new<I, S>(allowed_extensions: I, max_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_bytes,
        }
    }

    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS, max_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Extension is the text after the final '.', compared case-insensitively.
    pub fn validate(&self, filename: &str, size_bytes: u64) -> Result<(), FileRejection> {
        let trimmed = filename.trim();
        if trimmed.is_empty() {
            return Err(FileRejection::EmptyName);
        }

        let extension = match trimmed.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => {
                return Err(FileRejection::MissingExtension {
                    filename: trimmed.to_string(),
                    allowed: self.allowed_list(),
                })
            }
        };

        if !self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            return Err(FileRejection::DisallowedExtension {
                filename: trimmed.to_string(),
                allowed: self.allowed_list(),
            });
        }

        if size_bytes > self.max_bytes {
            return Err(FileRejection::TooLarge {
                filename: trimmed.to_string(),
                size: size_bytes,
                max: self.max_bytes,
            });
        }

        Ok(())
    }

    fn allowed_list(&self) -> String {
        self.allowed_extensions.join(", ")
    }
}

/// Reduces a client-supplied name to `[A-Za-z0-9._-]`, dropping any directory part.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            c if c.is_whitespace() => '_',
            _ => '_',
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Stored name `{YYYYMMDD_HHMMSS}_{sanitised}` used as the blob key suffix.
pub fn stored_filename(original: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", at.format("%Y%m%d_%H%M%S"), sanitize_filename(original))
}

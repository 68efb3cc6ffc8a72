use std::sync::Arc;

use chrono::Utc;

use super::domain::{ClientProfile, Company, CompanyDraft, CompanyStatus};
use super::repository::{CompanyStore, ProfileStore};
use crate::licensing::applications::{Application, StoreError};
use crate::licensing::ids::{generate_id, COMPANY_PREFIX};

const MAX_WRITE_ATTEMPTS: usize = 8;

/// Maintains client profiles and company records.
pub struct DirectoryService {
    profiles: Arc<dyn ProfileStore>,
    companies: Arc<dyn CompanyStore>,
}

impl DirectoryService {
    pub fn new(profiles: Arc<dyn ProfileStore>, companies: Arc<dyn CompanyStore>) -> Self {
        Self {
            profiles,
            companies,
        }
    }

    /// Recomputes the profile for `email` from the application set returned by `load`.
    ///
    /// The stored profile is read before `load` runs and replaced only if it is still
    /// unchanged, so a refresh built from an older application set never overwrites a newer one.
    pub fn refresh_client<F>(
        &self,
        email: &str,
        mut load: F,
    ) -> Result<ClientProfile, DirectoryError>
    where
        F: FnMut() -> Result<Vec<Application>, StoreError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let existing = self.profiles.get(email)?;
            let applications = load()?;
            let profile =
                ClientProfile::recompute(email, &applications, existing.as_ref(), Utc::now());
            let outcome = match &existing {
                Some(current) => self.profiles.compare_and_swap(current, profile),
                None => self.profiles.insert(profile),
            };

            match outcome {
                Ok(stored) => {
                    tracing::debug!(
                        email = %stored.email,
                        applications = stored.applications_count,
                        "client profile refreshed"
                    );
                    return Ok(stored);
                }
                Err(StoreError::Conflict | StoreError::StaleRecord) => {
                    tracing::debug!(
                        %email,
                        attempt,
                        "client profile changed underneath, recomputing"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(DirectoryError::Contention)
    }

    pub fn client(&self, email: &str) -> Result<ClientProfile, DirectoryError> {
        self.profiles
            .get(email)?
            .ok_or_else(|| DirectoryError::NotFound(format!("no client profile for {email}")))
    }

    pub fn clients(&self) -> Result<Vec<ClientProfile>, DirectoryError> {
        Ok(self.profiles.list()?)
    }

    /// Creates the owner's company or updates it in place; an owner never holds two.
    pub fn register_company(
        &self,
        owner_email: &str,
        draft: CompanyDraft,
    ) -> Result<Company, DirectoryError> {
        let owner = owner_email.trim().to_ascii_lowercase();
        if owner.is_empty() {
            return Err(DirectoryError::Validation(
                "an owner email is required to register a company".into(),
            ));
        }
        let validated = ValidatedDraft::try_from(draft)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let outcome = match self.companies.find_by_owner(&owner)? {
                Some(existing) => {
                    let updated = validated.apply_to(existing.clone());
                    self.companies.compare_and_swap(&existing, updated)
                }
                None => {
                    let mut rng = rand::thread_rng();
                    let companies = &self.companies;
                    let id = generate_id(&mut rng, COMPANY_PREFIX, |candidate| {
                        matches!(companies.get(candidate), Ok(Some(_)))
                    });
                    let company = validated.clone().into_company(id, &owner);
                    self.companies.insert(company)
                }
            };

            match outcome {
                Ok(company) => {
                    tracing::info!(company_id = %company.id, owner = %owner, "company registered");
                    return Ok(company);
                }
                Err(StoreError::Conflict | StoreError::StaleRecord) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Err(DirectoryError::Contention)
    }

    /// All companies, or just the one owned by `owner_email`.
    pub fn companies(&self, owner_email: Option<&str>) -> Result<Vec<Company>, DirectoryError> {
        match owner_email {
            Some(owner) => Ok(self.companies.find_by_owner(owner)?.into_iter().collect()),
            None => Ok(self.companies.list()?),
        }
    }
}

#[derive(Debug, Clone)]
struct ValidatedDraft {
    name: String,
    draft: CompanyDraft,
}

impl TryFrom<CompanyDraft> for ValidatedDraft {
    type Error = DirectoryError;

    fn try_from(draft: CompanyDraft) -> Result<Self, Self::Error> {
        let name = draft
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DirectoryError::Validation("company name is required".into()))?
            .to_string();

        for (index, representative) in draft.representatives.iter().enumerate() {
            if representative.full_name.trim().is_empty() {
                return Err(DirectoryError::Validation(format!(
                    "representative {} is missing a full name",
                    index + 1
                )));
            }
            if representative.id_number.trim().is_empty() {
                return Err(DirectoryError::Validation(format!(
                    "representative {} is missing an id or passport number",
                    index + 1
                )));
            }
        }

        Ok(Self { name, draft })
    }
}

impl ValidatedDraft {
    fn into_company(self, id: String, owner: &str) -> Company {
        let ValidatedDraft { name, draft } = self;
        Company {
            id,
            name,
            registration_number: draft.registration_number,
            company_type: draft.company_type,
            address: draft.address,
            email: draft.email,
            phone: draft.phone,
            representatives: draft.representatives,
            registered_at: Utc::now(),
            status: CompanyStatus::Pending,
            submitted_by: owner.to_string(),
        }
    }

    fn apply_to(&self, mut company: Company) -> Company {
        company.name = self.name.clone();
        company.registration_number = self.draft.registration_number.clone();
        company.company_type = self.draft.company_type.clone();
        company.address = self.draft.address.clone();
        company.email = self.draft.email.clone();
        company.phone = self.draft.phone.clone();
        company.representatives = self.draft.representatives.clone();
        company
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("directory record kept changing during update")]
    Contention,
    #[error(transparent)]
    Store(#[from] StoreError),
}

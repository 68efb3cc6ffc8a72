use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::licensing::applications::{Application, ApplicationStatus, ApplicationType};

pub const CLIENT_ROLE: &str = "client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
}

/// Denormalised view of one applicant, keyed by email.
///
/// Every count is derived from the applications carrying this email; the profile is
/// rebuilt from that set rather than adjusted in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: String,
    pub registration_date: DateTime<Utc>,
    pub applications_count: usize,
    /// Applications still awaiting a decision (`pending` or `under_review`).
    pub pending_applications: usize,
    pub approved_applications: usize,
    pub rejected_applications: usize,
    pub last_application_date: Option<DateTime<Utc>>,
    pub last_application_type: Option<String>,
    pub status: AccountStatus,
}

impl ClientProfile {
    /// Rebuilds the profile for `email` from `applications`, keeping the registration date and
    /// account status of `existing`.
    pub fn recompute(
        email: &str,
        applications: &[Application],
        existing: Option<&ClientProfile>,
        now: DateTime<Utc>,
    ) -> Self {
        let owned: Vec<&Application> = applications
            .iter()
            .filter(|application| application.is_owned_by(email))
            .collect();

        let latest = owned
            .iter()
            .max_by_key(|application| application.submitted_at)
            .copied();

        let count = |predicate: fn(ApplicationStatus) -> bool| {
            owned
                .iter()
                .filter(|application| predicate(application.status))
                .count()
        };

        let name = latest
            .map(|application| application.applicant_name.clone())
            .or_else(|| existing.map(|profile| profile.name.clone()))
            .unwrap_or_default();

        Self {
            name,
            email: email.to_ascii_lowercase(),
            phone: latest
                .and_then(|application| application.applicant_phone.clone())
                .or_else(|| existing.and_then(|profile| profile.phone.clone())),
            company: latest
                .and_then(|application| application.company.clone())
                .or_else(|| existing.and_then(|profile| profile.company.clone())),
            role: CLIENT_ROLE.to_string(),
            registration_date: existing
                .map(|profile| profile.registration_date)
                .or_else(|| owned.iter().map(|application| application.submitted_at).min())
                .unwrap_or(now),
            applications_count: owned.len(),
            pending_applications: count(|status| !status.is_terminal()),
            approved_applications: count(|status| status == ApplicationStatus::Approved),
            rejected_applications: count(|status| status == ApplicationStatus::Rejected),
            last_application_date: latest.map(|application| application.submitted_at),
            last_application_type: latest.map(|application| {
                let kind = match application.application_type {
                    ApplicationType::FirstTime => "",
                    ApplicationType::Renewal => " (renewal)",
                };
                format!("{}{}", application.license_type, kind)
            }),
            status: existing.map(|profile| profile.status).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

/// Person authorised to act for a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representative {
    pub full_name: String,
    /// National id or passport number.
    pub id_number: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(rename = "role", default)]
    pub role_title: String,
}

/// Registered company; at most one per owner email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    pub registration_number: Option<String>,
    pub company_type: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub representatives: Vec<Representative>,
    pub registered_at: DateTime<Utc>,
    pub status: CompanyStatus,
    pub submitted_by: String,
}

/// Company fields supplied by the owner on registration or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub company_type: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub representatives: Vec<Representative>,
}

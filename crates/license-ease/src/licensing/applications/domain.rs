use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle states of a license application.
///
/// `pending -> under_review -> approved | rejected`. Reviewers may also resolve a
/// `pending` application directly. `approved` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        match (self, next) {
            (ApplicationStatus::Pending, ApplicationStatus::UnderReview) => true,
            (
                ApplicationStatus::Pending | ApplicationStatus::UnderReview,
                ApplicationStatus::Approved | ApplicationStatus::Rejected,
            ) => true,
            _ => false,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ApplicationStatus::Pending),
            "under_review" | "under-review" => Some(ApplicationStatus::UnderReview),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

/// Whether the applicant is requesting a new license or renewing an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    #[default]
    FirstTime,
    Renewal,
}

impl ApplicationType {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationType::FirstTime => "first_time",
            ApplicationType::Renewal => "renewal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "first_time" | "first-time" | "new" => Some(ApplicationType::FirstTime),
            "renewal" | "renew" => Some(ApplicationType::Renewal),
            _ => None,
        }
    }
}

/// Application and license fees quoted at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub application_fee: u64,
    pub license_fee: u64,
    pub total: u64,
    pub paid: bool,
}

impl FeeBreakdown {
    /// Builds an unpaid breakdown whose total is always the sum of its parts.
    pub fn unpaid(application_fee: u64, license_fee: u64) -> Self {
        Self {
            application_fee,
            license_fee,
            total: application_fee.saturating_add(license_fee),
            paid: false,
        }
    }
}

/// Uploaded supporting document as stored alongside the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "type")]
    pub file_type: String,
    pub filename: String,
    pub original_filename: String,
    pub url: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Stored license application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_name: String,
    pub applicant_email: String,
    #[serde(default)]
    pub applicant_phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub license_type: String,
    #[serde(default)]
    pub application_type: ApplicationType,
    pub description: String,
    pub files: Vec<FileRecord>,
    pub status: ApplicationStatus,
    pub fees: FeeBreakdown,
    #[serde(default)]
    pub processing_notes: Vec<String>,
    /// Subject id of the principal that submitted the application.
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.applicant_email.eq_ignore_ascii_case(email)
    }
}

/// Text fields of a submission before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationFields {
    #[serde(default)]
    pub applicant_name: Option<String>,
    #[serde(default)]
    pub applicant_email: Option<String>,
    #[serde(default)]
    pub applicant_phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default)]
    pub application_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Raw document received with a submission.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file arrived under; becomes the file record's type tag.
    pub file_type: String,
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        file_type: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_type: file_type.into(),
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_type", &self.file_type)
            .field("filename", &self.filename)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Listing order requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    #[default]
    Submission,
    Recent,
}

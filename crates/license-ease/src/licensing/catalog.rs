//! License offerings and the fee schedule derived from them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::applications::{ApplicationType, FeeBreakdown};

pub const DEFAULT_APPLICATION_FEE: u64 = 50;
pub const DEFAULT_LICENSE_FEE: u64 = 250;

/// One license that can be applied for, with first-time and renewal fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseOffering {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub application_requirements: Vec<String>,
    #[serde(default)]
    pub renewal_requirements: Vec<String>,
    #[serde(default)]
    pub first_time_application_fee: u64,
    #[serde(default)]
    pub renewal_application_fee: u64,
    #[serde(default)]
    pub first_time_license_fee: u64,
    #[serde(default)]
    pub renewal_license_fee: u64,
    /// Years the issued license stays valid.
    #[serde(default)]
    pub validity: u32,
    /// Expected processing time in days.
    #[serde(default)]
    pub processing_time: u32,
}

impl LicenseOffering {
    pub fn fees_for(&self, application_type: ApplicationType) -> FeeBreakdown {
        match application_type {
            ApplicationType::FirstTime => FeeBreakdown::unpaid(
                self.first_time_application_fee,
                self.first_time_license_fee,
            ),
            ApplicationType::Renewal => {
                FeeBreakdown::unpaid(self.renewal_application_fee, self.renewal_license_fee)
            }
        }
    }

    fn matches(&self, license_type: &str) -> bool {
        let needle = license_type.trim();
        self.id.eq_ignore_ascii_case(needle) || self.name.eq_ignore_ascii_case(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseCategory {
    pub name: String,
    pub licenses: Vec<LicenseOffering>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to read fee schedule {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fee schedule {path} is not a valid category list: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Externally supplied fee table keyed by license id or name.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    categories: Vec<LicenseCategory>,
    default_application_fee: u64,
    default_license_fee: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeeSchedule {
    pub fn new(categories: Vec<LicenseCategory>) -> Self {
        Self {
            categories,
            default_application_fee: DEFAULT_APPLICATION_FEE,
            default_license_fee: DEFAULT_LICENSE_FEE,
        }
    }

    pub fn with_default_fees(mut self, application_fee: u64, license_fee: u64) -> Self {
        self.default_application_fee = application_fee;
        self.default_license_fee = license_fee;
        self
    }

    /// Reads a JSON array of categories in the `GET /services` shape.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: display.clone(),
            source,
        })?;
        let categories: Vec<LicenseCategory> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: display,
                source,
            })?;
        Ok(Self::new(categories))
    }

    pub fn categories(&self) -> &[LicenseCategory] {
        &self.categories
    }

    pub fn find(&self, license_type: &str) -> Option<&LicenseOffering> {
        self.categories
            .iter()
            .flat_map(|category| category.licenses.iter())
            .find(|offering| offering.matches(license_type))
    }

    /// Unknown license types fall back to the default application and license fees.
    pub fn quote(&self, license_type: &str, application_type: ApplicationType) -> FeeBreakdown {
        match self.find(license_type) {
            Some(offering) => offering.fees_for(application_type),
            None => {
                tracing::debug!(license_type, "license type not in catalog, using default fees");
                FeeBreakdown::unpaid(self.default_application_fee, self.default_license_fee)
            }
        }
    }

    /// Built-in catalog used when no schedule file is configured.
    pub fn standard() -> Self {
        Self::new(vec![
            LicenseCategory {
                name: "Business Licenses".to_string(),
                licenses: vec![
                    offering(
                        "bl_001",
                        "Import/Export License",
                        &[
                            "Business registration certificate",
                            "Tax clearance certificate",
                            "Bank guarantee letter",
                            "Business plan",
                        ],
                        &[
                            "Updated financial statements",
                            "Tax compliance certificate",
                        ],
                        (50, 30, 200, 150),
                        (2, 14),
                    ),
                    offering(
                        "bl_002",
                        "Trading License",
                        &[
                            "RDB certificate",
                            "Company constitution",
                            "Proof of premises",
                            "Financial statements",
                        ],
                        &["Updated RDB certificate", "Annual financial report"],
                        (25, 15, 100, 75),
                        (1, 7),
                    ),
                ],
            },
            LicenseCategory {
                name: "Professional Licenses".to_string(),
                licenses: vec![offering(
                    "pl_001",
                    "Engineering License",
                    &[
                        "Academic credentials",
                        "Professional experience certificate",
                        "Character reference letters",
                        "Professional insurance",
                    ],
                    &[
                        "Continuing education certificates",
                        "Professional development record",
                    ],
                    (75, 40, 300, 200),
                    (3, 21),
                )],
            },
            LicenseCategory {
                name: "Transport Licenses".to_string(),
                licenses: vec![offering(
                    "tl_001",
                    "Commercial Transport License",
                    &[
                        "Valid driving license",
                        "Vehicle inspection certificate",
                        "Insurance documents",
                        "Route operation plan",
                    ],
                    &[
                        "Updated vehicle inspection",
                        "Insurance renewal documents",
                    ],
                    (40, 20, 120, 80),
                    (1, 10),
                )],
            },
        ])
    }
}

/// `fees` is (first-time application, renewal application, first-time license, renewal license);
/// `terms` is (validity years, processing days).
fn offering(
    id: &str,
    name: &str,
    application_requirements: &[&str],
    renewal_requirements: &[&str],
    fees: (u64, u64, u64, u64),
    terms: (u32, u32),
) -> LicenseOffering {
    LicenseOffering {
        id: id.to_string(),
        name: name.to_string(),
        application_requirements: application_requirements
            .iter()
            .map(|req| req.to_string())
            .collect(),
        renewal_requirements: renewal_requirements
            .iter()
            .map(|req| req.to_string())
            .collect(),
        first_time_application_fee: fees.0,
        renewal_application_fee: fees.1,
        first_time_license_fee: fees.2,
        renewal_license_fee: fees.3,
        validity: terms.0,
        processing_time: terms.1,
    }
}

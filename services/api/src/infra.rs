use async_trait::async_trait;
use license_ease::access::{
    AccessGate, JwtIdentityVerifier, Role, RoleAssigner, RoleAssignmentError, RoleClaimPolicy,
};
use license_ease::config::AppConfig;
use license_ease::error::AppError;
use license_ease::licensing::applications::{ApplicationService, FileIntakePolicy};
use license_ease::licensing::catalog::FeeSchedule;
use license_ease::licensing::directory::DirectoryService;
use license_ease::licensing::documents::{DocumentClassifier, KeywordClassifier};
use license_ease::licensing::memory::{
    InMemoryApplicationStore, InMemoryCompanyStore, InMemoryDocumentStore, InMemoryProfileStore,
};
use license_ease::licensing::payments::rates::DEFAULT_SETTLEMENT_CURRENCY;
use license_ease::licensing::payments::{
    CardCharge, CardIntentHandle, FixedRateTable, MobileCharge, MobileChargeHandle,
    PaymentCoordinator, PaymentProcessor, ProviderError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Every service the HTTP surface and the demo share, wired against in-memory stores.
pub(crate) struct LicenseServices {
    pub(crate) gate: AccessGate,
    pub(crate) applications: Arc<ApplicationService<InMemoryApplicationStore>>,
    pub(crate) payments: Arc<PaymentCoordinator<InMemoryApplicationStore>>,
    pub(crate) directory: Arc<DirectoryService>,
    pub(crate) roles: Arc<InMemoryRoleRegistry>,
    pub(crate) classifier: Arc<dyn DocumentClassifier>,
    pub(crate) documents: Arc<InMemoryDocumentStore>,
}

impl LicenseServices {
    pub(crate) fn in_memory(config: &AppConfig) -> Result<Self, AppError> {
        let catalog = match &config.intake.fee_schedule_path {
            Some(path) => FeeSchedule::from_path(path)?,
            None => FeeSchedule::standard(),
        };

        let gate = AccessGate::new(
            Arc::new(JwtIdentityVerifier::new(&config.auth.jwt_secret)),
            RoleClaimPolicy::new(
                config.auth.role_claim.clone(),
                Role::parse(&config.auth.default_role),
            ),
        );

        let documents = Arc::new(InMemoryDocumentStore::default());
        let directory = Arc::new(DirectoryService::new(
            Arc::new(InMemoryProfileStore::default()),
            Arc::new(InMemoryCompanyStore::default()),
        ));
        let applications = Arc::new(ApplicationService::new(
            Arc::new(InMemoryApplicationStore::default()),
            documents.clone(),
            directory.clone(),
            Arc::new(catalog),
            FileIntakePolicy::with_max_bytes(config.intake.max_upload_bytes),
        ));
        let payments = Arc::new(PaymentCoordinator::new(
            applications.clone(),
            Arc::new(SimulatedPaymentProcessor),
            Arc::new(rate_table(&config.payments.settlement_currency)),
            config.payments.webhook_secret.clone(),
            config.payments.webhook_tolerance_secs,
        ));

        Ok(Self {
            gate,
            applications,
            payments,
            directory,
            roles: Arc::new(InMemoryRoleRegistry::default()),
            classifier: Arc::new(KeywordClassifier::default()),
            documents,
        })
    }
}

fn rate_table(settlement_currency: &str) -> FixedRateTable {
    if settlement_currency.eq_ignore_ascii_case(DEFAULT_SETTLEMENT_CURRENCY) {
        FixedRateTable::default()
    } else {
        FixedRateTable::new(settlement_currency)
    }
}

/// Processor stand-in that accepts every well-formed charge and hands out random ids.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SimulatedPaymentProcessor;

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn create_card_intent(
        &self,
        charge: CardCharge,
    ) -> Result<CardIntentHandle, ProviderError> {
        ensure_currency(&charge.currency)?;
        let intent_id = format!("pi_sim_{}", random_token(24));
        let client_secret = format!("{intent_id}_secret_{}", random_token(16));
        tracing::debug!(
            %intent_id,
            amount_minor = charge.amount_minor,
            application_id = %charge.metadata.application_id,
            "simulated card intent"
        );
        Ok(CardIntentHandle {
            intent_id,
            client_secret,
        })
    }

    async fn request_mobile_payment(
        &self,
        charge: MobileCharge,
    ) -> Result<MobileChargeHandle, ProviderError> {
        ensure_currency(&charge.currency)?;
        if charge.phone_number.trim_start_matches('+').len() < 9 {
            return Err(ProviderError::Rejected(format!(
                "Invalid phone number: {}",
                charge.phone_number
            )));
        }
        let payment_id = format!("momo_sim_{}", random_token(20));
        tracing::debug!(%payment_id, amount = charge.amount, "simulated mobile money request");
        Ok(MobileChargeHandle { payment_id })
    }
}

fn ensure_currency(currency: &str) -> Result<(), ProviderError> {
    if currency.len() == 3 && currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ProviderError::Rejected(format!("Invalid currency: {currency}")))
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Records role grants; stands in for the identity provider's custom-claims API.
#[derive(Default)]
pub(crate) struct InMemoryRoleRegistry {
    roles: Mutex<HashMap<String, String>>,
}

impl InMemoryRoleRegistry {
    pub(crate) fn role_of(&self, uid: &str) -> Option<String> {
        self.roles.lock().ok()?.get(uid).cloned()
    }
}

#[async_trait]
impl RoleAssigner for InMemoryRoleRegistry {
    async fn assign_role(&self, uid: &str, role: &str) -> Result<(), RoleAssignmentError> {
        let mut roles = self
            .roles
            .lock()
            .map_err(|_| RoleAssignmentError::Provider("role registry unavailable".to_string()))?;
        roles.insert(uid.to_string(), role.to_string());
        Ok(())
    }
}

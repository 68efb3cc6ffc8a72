use std::sync::Arc;

use chrono::Utc;

use super::domain::{
    CardIntentReceipt, CardIntentRequest, MobilePaymentReceipt, MobilePaymentRequest,
    PaymentMetadata,
};
use super::processor::{CardCharge, MobileCharge, PaymentProcessor, ProviderError};
use super::rates::{ExchangeRateProvider, RateError};
use super::webhook::{verify_signature, ProviderEvent, SignatureError};
use crate::access::Principal;
use crate::licensing::applications::{
    ApplicationId, ApplicationService, ApplicationServiceError, ApplicationStore,
    PaymentApplication, PaymentRecord,
};

/// Starts payments with the external processor and applies its signed confirmations.
pub struct PaymentCoordinator<S> {
    applications: Arc<ApplicationService<S>>,
    processor: Arc<dyn PaymentProcessor>,
    rates: Arc<dyn ExchangeRateProvider>,
    webhook_secret: String,
    tolerance_secs: u64,
}

/// What a verified callback did to stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied { application_id: ApplicationId },
    Duplicate { application_id: ApplicationId },
    UnknownApplication { application_id: Option<String> },
    Ignored { event_type: String },
}

impl CallbackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CallbackOutcome::Applied { .. } => "applied",
            CallbackOutcome::Duplicate { .. } => "duplicate",
            CallbackOutcome::UnknownApplication { .. } => "unknown_application",
            CallbackOutcome::Ignored { .. } => "ignored",
        }
    }
}

impl<S> PaymentCoordinator<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(
        applications: Arc<ApplicationService<S>>,
        processor: Arc<dyn PaymentProcessor>,
        rates: Arc<dyn ExchangeRateProvider>,
        webhook_secret: impl Into<String>,
        tolerance_secs: u64,
    ) -> Self {
        Self {
            applications,
            processor,
            rates,
            webhook_secret: webhook_secret.into(),
            tolerance_secs,
        }
    }

    /// Creates a card intent for any application; every request field is required.
    pub async fn create_card_intent(
        &self,
        request: CardIntentRequest,
    ) -> Result<CardIntentReceipt, PaymentError> {
        self.card_intent(request, None).await
    }

    /// Creates a card intent on behalf of `payer`.
    ///
    /// Clients may only pay for their own applications and always pay as themselves;
    /// reviewers may pay for any application and `userId` defaults to their subject id.
    pub async fn create_card_intent_as(
        &self,
        payer: &Principal,
        request: CardIntentRequest,
    ) -> Result<CardIntentReceipt, PaymentError> {
        self.card_intent(request, Some(payer)).await
    }

    async fn card_intent(
        &self,
        request: CardIntentRequest,
        payer: Option<&Principal>,
    ) -> Result<CardIntentReceipt, PaymentError> {
        let amount = positive_amount(request.amount)?;
        let currency = required(request.currency, "currency")?.to_ascii_lowercase();
        let metadata = PaymentMetadata {
            application_id: required(request.application_id, "applicationId")?,
            user_id: paying_user(request.user_id, payer)?,
        };
        self.ensure_payable(&metadata.application_id, payer)?;

        let charge = CardCharge {
            amount_minor: (amount * 100.0).round() as u64,
            currency,
            metadata: metadata.clone(),
        };
        let handle = self
            .processor
            .create_card_intent(charge)
            .await
            .inspect_err(|err| {
                tracing::warn!(application_id = %metadata.application_id, error = %err, "card intent refused");
            })?;

        tracing::info!(
            application_id = %metadata.application_id,
            intent_id = %handle.intent_id,
            "card payment intent created"
        );
        Ok(CardIntentReceipt {
            client_secret: handle.client_secret,
            intent_id: handle.intent_id,
        })
    }

    /// Requests a mobile-money collection, converting into the settlement currency first.
    pub async fn initiate_mobile_payment(
        &self,
        request: MobilePaymentRequest,
    ) -> Result<MobilePaymentReceipt, PaymentError> {
        self.mobile_payment(request, None).await
    }

    /// Mobile-money counterpart of [`Self::create_card_intent_as`].
    pub async fn initiate_mobile_payment_as(
        &self,
        payer: &Principal,
        request: MobilePaymentRequest,
    ) -> Result<MobilePaymentReceipt, PaymentError> {
        self.mobile_payment(request, Some(payer)).await
    }

    async fn mobile_payment(
        &self,
        request: MobilePaymentRequest,
        payer: Option<&Principal>,
    ) -> Result<MobilePaymentReceipt, PaymentError> {
        let amount = positive_amount(request.amount)?;
        let phone_number = required(request.phone_number, "phoneNumber")?;
        let metadata = PaymentMetadata {
            application_id: required(request.application_id, "applicationId")?,
            user_id: paying_user(request.user_id, payer)?,
        };
        let currency = request
            .currency
            .map(|currency| currency.trim().to_ascii_uppercase())
            .filter(|currency| !currency.is_empty())
            .unwrap_or_else(|| self.rates.settlement_currency().to_string());
        self.ensure_payable(&metadata.application_id, payer)?;

        let converted = self.rates.convert(amount, &currency)?;
        let foreign = !currency.eq_ignore_ascii_case(self.rates.settlement_currency());

        let charge = MobileCharge {
            amount: converted.amount,
            currency: converted.currency.clone(),
            phone_number,
            payer_email: request.email.filter(|email| !email.trim().is_empty()),
            metadata: metadata.clone(),
        };
        let handle = self.processor.request_mobile_payment(charge).await?;

        tracing::info!(
            application_id = %metadata.application_id,
            payment_id = %handle.payment_id,
            amount = converted.amount,
            currency = %converted.currency,
            "mobile money payment requested"
        );
        Ok(MobilePaymentReceipt {
            payment_id: handle.payment_id,
            amount: converted.amount,
            currency: converted.currency,
            status: "pending",
            original_amount: amount,
            original_currency: currency,
            exchange_rate: foreign.then_some(converted.rate),
            rate_source: foreign.then_some(converted.source),
        })
    }

    /// Verifies and applies a provider callback.
    ///
    /// Once the signature checks out the callback is always acknowledged, even when the
    /// referenced application does not exist, so the provider stops retrying.
    pub fn handle_provider_callback(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<CallbackOutcome, PaymentError> {
        let signature = signature.ok_or(SignatureError::MissingHeader)?;
        verify_signature(
            &self.webhook_secret,
            signature,
            body,
            Utc::now().timestamp(),
            self.tolerance_secs,
        )
        .inspect_err(|err| tracing::warn!(error = %err, "rejected payment callback"))?;

        let event = ProviderEvent::parse(body)
            .map_err(|err| PaymentError::InvalidPayload(err.to_string()))?;

        if !event.is_payment_success() {
            tracing::debug!(event_type = %event.event_type, "ignoring payment event");
            return Ok(CallbackOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let Some(raw_id) = event.application_id.clone() else {
            tracing::warn!(
                event_type = %event.event_type,
                "payment succeeded without an applicationId in metadata"
            );
            return Ok(CallbackOutcome::UnknownApplication {
                application_id: None,
            });
        };

        let payment = PaymentRecord {
            reference: event.reference(),
            paid_at: Utc::now(),
        };
        let outcome = match self
            .applications
            .record_payment(&ApplicationId(raw_id), &payment)?
        {
            PaymentApplication::Applied(application) => CallbackOutcome::Applied {
                application_id: application.id,
            },
            PaymentApplication::AlreadyPaid(application) => CallbackOutcome::Duplicate {
                application_id: application.id,
            },
            PaymentApplication::UnknownApplication(id) => {
                tracing::warn!(
                    application_id = %id,
                    reference = %payment.reference,
                    "payment confirmed for unknown application"
                );
                CallbackOutcome::UnknownApplication {
                    application_id: Some(id.0),
                }
            }
        };
        Ok(outcome)
    }

    /// Applications a client does not own are reported as missing.
    fn ensure_payable(
        &self,
        application_id: &str,
        payer: Option<&Principal>,
    ) -> Result<(), PaymentError> {
        let id = ApplicationId::from(application_id);
        let lookup = match payer {
            Some(principal) => self.applications.get_for(&id, principal),
            None => self.applications.get(&id),
        };
        match lookup {
            Ok(application) if application.fees.paid => Err(PaymentError::AlreadyPaid(id)),
            Ok(_) => Ok(()),
            Err(ApplicationServiceError::NotFound(id)) => Err(PaymentError::NotFound(id)),
            Err(other) => Err(other.into()),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, PaymentError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PaymentError::Validation(format!("Missing required field: {field}")))
}

fn paying_user(
    requested: Option<String>,
    payer: Option<&Principal>,
) -> Result<String, PaymentError> {
    match payer {
        Some(principal) if !principal.role.can_review() => Ok(principal.subject_id.clone()),
        Some(principal) => {
            Ok(required(requested, "userId").unwrap_or_else(|_| principal.subject_id.clone()))
        }
        None => required(requested, "userId"),
    }
}

fn positive_amount(amount: Option<f64>) -> Result<f64, PaymentError> {
    match amount {
        None => Err(PaymentError::Validation(
            "Missing required field: amount".into(),
        )),
        Some(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        Some(amount) => Err(PaymentError::Validation(format!(
            "amount must be a positive number, got {amount}"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application {0} is already paid")]
    AlreadyPaid(ApplicationId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("invalid callback payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Application(#[from] ApplicationServiceError),
}

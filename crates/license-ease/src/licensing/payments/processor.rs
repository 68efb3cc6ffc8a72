use async_trait::async_trait;

use super::domain::PaymentMetadata;

/// Card charge handed to the processor; `amount_minor` is in the currency's minor unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCharge {
    pub amount_minor: u64,
    pub currency: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardIntentHandle {
    pub intent_id: String,
    pub client_secret: String,
}

/// Mobile-money collection request, always in the settlement currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileCharge {
    pub amount: u64,
    pub currency: String,
    pub phone_number: String,
    pub payer_email: Option<String>,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileChargeHandle {
    pub payment_id: String,
}

/// External payment processor boundary.
///
/// Success is reported later through the signed callback, never by these calls.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_card_intent(&self, charge: CardCharge)
        -> Result<CardIntentHandle, ProviderError>;
    async fn request_mobile_payment(
        &self,
        charge: MobileCharge,
    ) -> Result<MobileChargeHandle, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The processor refused the request, e.g. an unsupported currency.
    #[error("{0}")]
    Rejected(String),
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

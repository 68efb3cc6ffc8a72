//! Card and mobile-money payment initiation plus signed provider callbacks.

pub mod domain;
pub mod processor;
pub mod rates;
pub mod router;
pub mod service;
pub mod webhook;

pub use domain::{
    CardIntentReceipt, CardIntentRequest, MobilePaymentReceipt, MobilePaymentRequest,
    PaymentMetadata,
};
pub use processor::{
    CardCharge, CardIntentHandle, MobileCharge, MobileChargeHandle, PaymentProcessor,
    ProviderError,
};
pub use rates::{ConvertedAmount, ExchangeRateProvider, FixedRateTable, RateError};
pub use router::payment_router;
pub use service::{CallbackOutcome, PaymentCoordinator, PaymentError};
pub use webhook::{
    sign_payload, verify_signature, ProviderEvent, SignatureError, SIGNATURE_HEADER,
};

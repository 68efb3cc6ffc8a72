use crate::infra::LicenseServices;
use chrono::Utc;
use clap::Args;
use license_ease::access::{Principal, Role, RoleAssigner};
use license_ease::config::AppConfig;
use license_ease::error::{ApiError, AppError};
use license_ease::licensing::applications::{
    Application, ApplicationFields, ApplicationStatus, UploadedFile,
};
use license_ease::licensing::directory::{CompanyDraft, Representative};
use license_ease::licensing::documents::DocumentClassifier;
use license_ease::licensing::payments::{sign_payload, CardIntentRequest};
use serde_json::json;

const DEMO_OFFICER_UID: &str = "uid-demo-officer";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Catalog id of the license to apply for
    #[arg(long, default_value = "bl_001")]
    pub(crate) license_type: String,
    /// Applicant email used as the client identity
    #[arg(long, default_value = "ada@example.com")]
    pub(crate) email: String,
    /// Currency of the card payment
    #[arg(long, default_value = "usd")]
    pub(crate) currency: String,
    /// Reject the application instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        license_type,
        email,
        currency,
        reject,
    } = args;

    let config = AppConfig::load()?;
    let services = LicenseServices::in_memory(&config)?;
    let client = Principal::new(format!("uid-{email}"), Some(email.clone()), Role::Client);
    let officer = Principal::new(
        DEMO_OFFICER_UID,
        Some("officer@licensing.example".to_string()),
        Role::Officer,
    );

    println!("LicenseEase workflow demo");

    services
        .roles
        .assign_role(DEMO_OFFICER_UID, Role::Officer.label())
        .await
        .map_err(|err| ApiError::IdentityProvider(err.to_string()))?;
    println!(
        "- Granted role '{}' to {}",
        services.roles.role_of(DEMO_OFFICER_UID).unwrap_or_default(),
        DEMO_OFFICER_UID
    );

    let fields = ApplicationFields {
        applicant_name: Some("Ada Uwase".to_string()),
        applicant_email: Some(email.clone()),
        applicant_phone: Some("+250788000111".to_string()),
        company: Some("Acme Trading".to_string()),
        license_type: Some(license_type),
        application_type: None,
        description: Some("Wholesale distribution of agricultural inputs".to_string()),
    };
    let files = vec![UploadedFile::new(
        "business_registration",
        "certificate of registration.pdf",
        b"%PDF-1.7 Rwanda Development Board certificate of registration".to_vec(),
    )];
    let application = services
        .applications
        .submit(fields, files, Some(&client))
        .await
        .map_err(ApiError::from)?;
    render_application("Submitted", &application);
    for key in services.documents.keys() {
        println!("  stored document: {key}");
    }

    let verdict = services
        .classifier
        .classify(
            "Rwanda Development Board certificate of registration",
            "business_registration",
        )
        .await
        .map_err(ApiError::from)?;
    println!(
        "- Document check: matches={} ({})",
        verdict.matches, verdict.rationale
    );

    let intent = services
        .payments
        .create_card_intent(CardIntentRequest {
            amount: Some(application.fees.total as f64),
            currency: Some(currency),
            application_id: Some(application.id.0.clone()),
            user_id: Some(client.subject_id.clone()),
        })
        .await
        .map_err(ApiError::from)?;
    println!("- Card intent {} created", intent.intent_id);

    let event = json!({
        "id": format!("evt_{}", intent.intent_id),
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": intent.intent_id,
            "metadata": { "applicationId": application.id.0, "userId": client.subject_id }
        }}
    })
    .to_string();
    let signature = sign_payload(
        &config.payments.webhook_secret,
        Utc::now().timestamp(),
        event.as_bytes(),
    )
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    for attempt in ["callback", "replayed callback"] {
        let outcome = services
            .payments
            .handle_provider_callback(event.as_bytes(), Some(&signature))
            .map_err(ApiError::from)?;
        println!("- Provider {attempt}: {}", outcome.label());
    }

    let decision = if reject {
        ApplicationStatus::Rejected
    } else {
        ApplicationStatus::Approved
    };
    let reviewed = services
        .applications
        .set_status(
            &application.id,
            decision,
            Some("Documents verified against the registry"),
            &officer,
        )
        .map_err(ApiError::from)?;
    render_application("Reviewed", &reviewed);

    let company = services
        .directory
        .register_company(
            &email,
            CompanyDraft {
                name: Some("Acme Trading Ltd".to_string()),
                registration_number: Some("RDB-104233".to_string()),
                company_type: Some("private_limited".to_string()),
                representatives: vec![Representative {
                    full_name: "Ada Uwase".to_string(),
                    id_number: "1199080012345678".to_string(),
                    phone: "+250788000111".to_string(),
                    email: email.clone(),
                    language: Some("en".to_string()),
                    role_title: "Managing Director".to_string(),
                }],
                ..CompanyDraft::default()
            },
        )
        .map_err(ApiError::from)?;
    println!("- Company {} registered as {}", company.name, company.id);

    let profile = services.directory.client(&email).map_err(ApiError::from)?;
    println!(
        "- Client profile {}: {} application(s), {} pending, {} approved, {} rejected",
        profile.email,
        profile.applications_count,
        profile.pending_applications,
        profile.approved_applications,
        profile.rejected_applications
    );

    Ok(())
}

fn render_application(heading: &str, application: &Application) {
    println!(
        "- {heading} {} [{}] {} / {}: fees {} + {} = {} ({})",
        application.id,
        application.status.label(),
        application.license_type,
        application.application_type.label(),
        application.fees.application_fee,
        application.fees.license_fee,
        application.fees.total,
        if application.fees.paid {
            "paid"
        } else {
            "unpaid"
        }
    );
    for note in &application.processing_notes {
        println!("  note: {note}");
    }
}

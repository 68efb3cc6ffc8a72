//! Integration scenarios for the license application and payment workflow.
//!
//! Scenarios drive the composed HTTP routers with real HS256 tokens so identity, role checks,
//! submission, payment, and the signed provider callback are exercised together.

mod common {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use license_ease::access::{access_router, AccessGate, JwtIdentityVerifier, RoleAssigner};
    use license_ease::access::{Role, RoleAssignmentError, RoleClaimPolicy};
    use license_ease::licensing::applications::{
        application_router, ApplicationService, FileIntakePolicy,
    };
    use license_ease::licensing::catalog::FeeSchedule;
    use license_ease::licensing::directory::{directory_router, DirectoryService};
    use license_ease::licensing::memory::{
        InMemoryApplicationStore, InMemoryCompanyStore, InMemoryDocumentStore,
        InMemoryProfileStore,
    };
    use license_ease::licensing::payments::{
        payment_router, sign_payload, CardCharge, CardIntentHandle, FixedRateTable, MobileCharge,
        MobileChargeHandle, PaymentCoordinator, PaymentProcessor, ProviderError,
        SIGNATURE_HEADER,
    };

    pub(super) const JWT_SECRET: &str = "integration-jwt-secret";
    pub(super) const WEBHOOK_SECRET: &str = "integration-webhook-secret";
    const BOUNDARY: &str = "workflow-boundary";

    #[derive(Default)]
    pub(super) struct SandboxProcessor {
        pub(super) cards: Mutex<Vec<CardCharge>>,
        pub(super) mobile: Mutex<Vec<MobileCharge>>,
    }

    #[async_trait]
    impl PaymentProcessor for SandboxProcessor {
        async fn create_card_intent(
            &self,
            charge: CardCharge,
        ) -> Result<CardIntentHandle, ProviderError> {
            let mut cards = self.cards.lock().expect("processor mutex");
            cards.push(charge);
            let intent_id = format!("pi_sandbox_{}", cards.len());
            Ok(CardIntentHandle {
                client_secret: format!("{intent_id}_secret"),
                intent_id,
            })
        }

        async fn request_mobile_payment(
            &self,
            charge: MobileCharge,
        ) -> Result<MobileChargeHandle, ProviderError> {
            let mut mobile = self.mobile.lock().expect("processor mutex");
            mobile.push(charge);
            Ok(MobileChargeHandle {
                payment_id: format!("momo_sandbox_{}", mobile.len()),
            })
        }
    }

    #[derive(Default)]
    pub(super) struct RecordingAssigner {
        pub(super) assigned: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl RoleAssigner for RecordingAssigner {
        async fn assign_role(&self, uid: &str, role: &str) -> Result<(), RoleAssignmentError> {
            self.assigned
                .lock()
                .expect("assigner mutex")
                .push((uid.to_string(), role.to_string()));
            Ok(())
        }
    }

    pub(super) struct Backend {
        pub(super) router: Router,
        pub(super) processor: Arc<SandboxProcessor>,
        pub(super) documents: Arc<InMemoryDocumentStore>,
        pub(super) assigner: Arc<RecordingAssigner>,
    }

    pub(super) fn backend() -> Backend {
        let gate = AccessGate::new(
            Arc::new(JwtIdentityVerifier::new(JWT_SECRET)),
            RoleClaimPolicy::new("role", Role::Client),
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
            Arc::new(FeeSchedule::standard()),
            FileIntakePolicy::default(),
        ));
        let processor = Arc::new(SandboxProcessor::default());
        let coordinator = Arc::new(PaymentCoordinator::new(
            applications.clone(),
            processor.clone(),
            Arc::new(FixedRateTable::default()),
            WEBHOOK_SECRET,
            300,
        ));
        let assigner = Arc::new(RecordingAssigner::default());

        let router = Router::new()
            .merge(access_router(&gate, assigner.clone()))
            .merge(application_router(&gate, applications))
            .merge(payment_router(&gate, coordinator))
            .merge(directory_router(&gate, directory));

        Backend {
            router,
            processor,
            documents,
            assigner,
        }
    }

    pub(super) fn token(subject: &str, email: &str, role: Option<&str>) -> String {
        let mut claims = json!({
            "sub": subject,
            "email": email,
            "exp": Utc::now().timestamp() + 3600,
        });
        if let Some(role) = role {
            claims["role"] = json!(role);
        }
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("token encodes")
    }

    pub(super) fn submission(token: &str, license_type: &str, filename: &str) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in [
            ("applicant_name", "Ada Uwase"),
            ("applicant_email", "ada@example.com"),
            ("license_type", license_type),
            ("description", "Import and distribution of medical supplies"),
        ] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"business_registration\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[7u8; 1000]);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/applications")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request builds")
    }

    pub(super) fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    pub(super) fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request builds")
    }

    pub(super) fn callback(body: &Value, secret: &str) -> Request<Body> {
        let raw = body.to_string();
        let signature =
            sign_payload(secret, Utc::now().timestamp(), raw.as_bytes()).expect("signs");
        Request::builder()
            .method("POST")
            .uri("/payment-webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(raw))
            .expect("request builds")
    }

    pub(super) fn succeeded(intent_id: &str, application_id: &str) -> Value {
        json!({
            "id": format!("evt_{intent_id}"),
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": intent_id,
                "metadata": { "applicationId": application_id, "userId": "uid-ada" }
            }}
        })
    }

    pub(super) async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }
}

use axum::http::StatusCode;
use serde_json::json;

use common::{backend, callback, get, json_request, send, submission, succeeded, token};

#[tokio::test]
async fn submission_payment_and_callback_move_application_into_review() {
    let backend = backend();
    let client = token("uid-ada", "ada@example.com", Some("client"));
    let officer = token("uid-officer", "officer@rdb.rw", Some("officer"));

    let (status, body) = send(&backend.router, submission(&client, "X", "a.pdf")).await;
    assert_eq!(status, StatusCode::CREATED);
    let application = &body["data"];
    let application_id = application["id"].as_str().expect("id").to_string();
    assert_eq!(application_id.len(), 7);
    assert!(application_id.starts_with('A'));
    assert_eq!(application["status"], "pending");
    assert_eq!(application["fees"]["paid"], false);
    assert_eq!(application["fees"]["total"], 300);
    assert_eq!(application["files"][0]["original_filename"], "a.pdf");
    assert_eq!(backend.documents.keys().len(), 1);

    let (status, intent) = send(
        &backend.router,
        json_request(
            "POST",
            "/create-payment-intent",
            Some(&client),
            json!({
                "amount": 300,
                "currency": "usd",
                "applicationId": application_id,
                "userId": "uid-ada",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["clientSecret"], "pi_sandbox_1_secret");
    {
        let cards = backend.processor.cards.lock().unwrap();
        assert_eq!(cards[0].amount_minor, 30_000);
        assert_eq!(cards[0].metadata.application_id, application_id);
    }

    let event = succeeded("pi_sandbox_1", &application_id);
    let (status, ack) = send(&backend.router, callback(&event, common::WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["received"], true);
    assert_eq!(ack["outcome"], "applied");

    let (_, detail) = send(
        &backend.router,
        get(&format!("/applications/{application_id}"), &officer),
    )
    .await;
    assert_eq!(detail["status"], "under_review");
    assert_eq!(detail["fees"]["paid"], true);
    assert_eq!(detail["payment_reference"], "pi_sandbox_1");

    let (status, replay) = send(&backend.router, callback(&event, common::WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["outcome"], "duplicate");

    let (status, refused) = send(
        &backend.router,
        json_request(
            "POST",
            "/create-payment-intent",
            Some(&client),
            json!({
                "amount": 300,
                "currency": "usd",
                "applicationId": application_id,
                "userId": "uid-ada",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(refused["kind"], "validation_error");
}

#[tokio::test]
async fn officer_resolves_paid_application_and_profile_tracks_it() {
    let backend = backend();
    let client = token("uid-ada", "ada@example.com", None);
    let officer = token("uid-officer", "officer@rdb.rw", Some("officer"));

    let (_, body) = send(&backend.router, submission(&client, "pl_001", "permit.png")).await;
    let application_id = body["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(body["data"]["fees"]["total"], 375);

    let event = succeeded("pi_external", &application_id);
    send(&backend.router, callback(&event, common::WEBHOOK_SECRET)).await;

    let (status, approved) = send(
        &backend.router,
        json_request(
            "POST",
            &format!("/applications/{application_id}/status"),
            Some(&officer),
            json!({ "status": "approved", "note": "All documents verified" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["processing_notes"][0], "All documents verified");

    let (status, profile) = send(&backend.router, get("/clients/me", &client)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "ada@example.com");
    assert_eq!(profile["applications_count"], 1);
    assert_eq!(profile["approved_applications"], 1);
    assert_eq!(profile["pending_applications"], 0);
}

#[tokio::test]
async fn callbacks_for_unknown_applications_are_acknowledged() {
    let backend = backend();
    let event = succeeded("pi_orphan", "AGHOST1");

    let (status, ack) = send(&backend.router, callback(&event, common::WEBHOOK_SECRET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "unknown_application");
}

#[tokio::test]
async fn callbacks_with_a_forged_signature_are_rejected() {
    let backend = backend();
    let client = token("uid-ada", "ada@example.com", Some("client"));
    let (_, body) = send(&backend.router, submission(&client, "X", "a.pdf")).await;
    let application_id = body["data"]["id"].as_str().expect("id").to_string();

    let event = succeeded("pi_forged", &application_id);
    let (status, error) = send(&backend.router, callback(&event, "attacker-secret")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "invalid_signature");

    let officer = token("uid-officer", "officer@rdb.rw", Some("officer"));
    let (_, detail) = send(
        &backend.router,
        get(&format!("/applications/{application_id}"), &officer),
    )
    .await;
    assert_eq!(detail["status"], "pending");
    assert_eq!(detail["fees"]["paid"], false);
}

#[tokio::test]
async fn mobile_payment_reports_conversion() {
    let backend = backend();
    let client = token("uid-ada", "ada@example.com", Some("client"));
    let (_, body) = send(&backend.router, submission(&client, "X", "a.pdf")).await;
    let application_id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, receipt) = send(
        &backend.router,
        json_request(
            "POST",
            "/process-mobile-payment",
            Some(&client),
            json!({
                "amount": 300,
                "currency": "USD",
                "phoneNumber": "+250788123456",
                "applicationId": application_id,
                "userId": "uid-ada",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["status"], "pending");
    assert_eq!(receipt["currency"], "RWF");
    assert_eq!(receipt["amount"], 394_737);
    assert_eq!(receipt["originalCurrency"], "USD");
    assert_eq!(receipt["rateSource"], "fixed_table");
    assert_eq!(backend.processor.mobile.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn clients_only_pay_for_their_own_applications() {
    let backend = backend();
    let owner = token("uid-ada", "ada@example.com", Some("client"));
    let stranger = token("uid-bob", "bob@example.com", Some("client"));

    let (_, body) = send(&backend.router, submission(&owner, "X", "a.pdf")).await;
    let application_id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, error) = send(
        &backend.router,
        json_request(
            "POST",
            "/create-payment-intent",
            Some(&stranger),
            json!({ "amount": 300, "currency": "usd", "applicationId": application_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "not_found");
    assert!(backend.processor.cards.lock().unwrap().is_empty());

    let (status, _) = send(
        &backend.router,
        json_request(
            "POST",
            "/create-payment-intent",
            Some(&owner),
            json!({ "amount": 300, "currency": "usd", "applicationId": application_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        backend.processor.cards.lock().unwrap()[0].metadata.user_id,
        "uid-ada"
    );
}

#[tokio::test]
async fn card_intent_without_amount_is_rejected() {
    let backend = backend();
    let client = token("uid-ada", "ada@example.com", Some("client"));

    let (status, error) = send(
        &backend.router,
        json_request(
            "POST",
            "/create-payment-intent",
            Some(&client),
            json!({ "currency": "usd", "applicationId": "AAAAAAA", "userId": "uid-ada" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "Missing required field: amount");
    assert!(backend.processor.cards.lock().unwrap().is_empty());
}

#[tokio::test]
async fn only_admins_assign_roles() {
    let backend = backend();
    let client = token("uid-ada", "ada@example.com", Some("client"));
    let admin = token("uid-root", "root@rdb.rw", Some("admin"));

    let (status, error) = send(
        &backend.router,
        json_request(
            "POST",
            "/set-role",
            Some(&client),
            json!({ "uid": "uid-ada", "role": "admin" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "unauthorized - insufficient role 'client'");

    let (status, _) = send(
        &backend.router,
        json_request(
            "POST",
            "/set-role",
            Some(&admin),
            json!({ "uid": "uid-kim", "role": "officer" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        *backend.assigner.assigned.lock().unwrap(),
        vec![("uid-kim".to_string(), "officer".to_string())]
    );
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_unauthenticated() {
    let backend = backend();
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({ "sub": "uid-x", "role": "admin", "exp": chrono::Utc::now().timestamp() + 60 }),
        &jsonwebtoken::EncodingKey::from_secret(b"someone-else"),
    )
    .expect("token encodes");

    let (status, error) = send(&backend.router, get("/applications", &forged)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["kind"], "unauthenticated");
}

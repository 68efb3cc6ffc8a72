//! Pluggable check that an uploaded document's text matches the type it was filed under.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, middleware::from_fn_with_state, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::{enforce_roles, AccessGate, ALL_ROLES};
use crate::error::ApiError;
use crate::extract::JsonBody;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub matches: bool,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("document classifier unavailable: {0}")]
    Unavailable(String),
}

/// Only the boolean verdict is contractual; rationales are informational.
#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        expected_type: &str,
    ) -> Result<Classification, ClassifierError>;
}

/// Development classifier matching on keywords expected in each document type.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    table: Vec<(String, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
            .with_type("business_registration", &["registration", "certificate", "rdb"])
            .with_type("tax_clearance", &["tax", "clearance", "revenue authority"])
            .with_type("national_id", &["national id", "identity", "passport"])
            .with_type("bank_guarantee", &["bank", "guarantee"])
            .with_type(
                "financial_statements",
                &["balance sheet", "income statement", "financial statement"],
            )
            .with_type("business_plan", &["business plan", "market", "projection"])
    }
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self { table: Vec::new() }
    }

    pub fn with_type(mut self, expected_type: &str, keywords: &[&str]) -> Self {
        self.table.push((
            normalise(expected_type),
            keywords.iter().map(|keyword| keyword.to_lowercase()).collect(),
        ));
        self
    }

    fn keywords_for(&self, expected_type: &str) -> Vec<String> {
        let key = normalise(expected_type);
        match self.table.iter().find(|(name, _)| *name == key) {
            Some((_, keywords)) => keywords.clone(),
            // unlisted types are matched on the words of their own name
            None => key
                .split('_')
                .filter(|word| word.len() > 2)
                .map(str::to_string)
                .collect(),
        }
    }
}

#[async_trait]
impl DocumentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        text: &str,
        expected_type: &str,
    ) -> Result<Classification, ClassifierError> {
        let haystack = text.to_lowercase();
        let keywords = self.keywords_for(expected_type);
        let found: Vec<&str> = keywords
            .iter()
            .filter(|keyword| haystack.contains(keyword.as_str()))
            .map(String::as_str)
            .collect();

        let classification = if found.is_empty() {
            Classification {
                matches: false,
                rationale: format!(
                    "none of the expected terms for {expected_type} were found ({})",
                    keywords.join(", ")
                ),
            }
        } else {
            Classification {
                matches: true,
                rationale: format!("found {} in the document text", found.join(", ")),
            }
        };
        Ok(classification)
    }
}

fn normalise(expected_type: &str) -> String {
    expected_type
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "expectedType")]
    pub expected_type: Option<String>,
}

pub fn document_router(gate: &AccessGate, classifier: Arc<dyn DocumentClassifier>) -> Router {
    Router::new()
        .route(
            "/documents/classify",
            post(classify_handler)
                .route_layer(from_fn_with_state(gate.permit(ALL_ROLES), enforce_roles)),
        )
        .with_state(classifier)
}

pub(crate) async fn classify_handler(
    State(classifier): State<Arc<dyn DocumentClassifier>>,
    JsonBody(request): JsonBody<ClassifyRequest>,
) -> Result<Json<Classification>, ApiError> {
    let text = request
        .text
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("text is required".into()))?;
    let expected_type = request
        .expected_type
        .filter(|kind| !kind.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("expected_type is required".into()))?;

    let classification = classifier.classify(&text, &expected_type).await?;
    tracing::debug!(%expected_type, matches = classification.matches, "document classified");
    Ok(Json(classification))
}

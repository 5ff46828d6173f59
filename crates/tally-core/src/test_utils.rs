//! Test utilities for tally-core
//!
//! A mock enrichment API server bound to an ephemeral port, for unit and
//! integration tests of the HTTP backend and the enrichment tier.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Json,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// How long the `/slow` route sleeps before answering
pub const SLOW_RESPONSE_DELAY: Duration = Duration::from_millis(500);

/// Mock enrichment API server
///
/// Routes:
/// - `POST /v1/categorize`: answers from a fixed merchant table
/// - `POST /slow/v1/categorize`: same, after [`SLOW_RESPONSE_DELAY`]
/// - `POST /error`: always 500
pub struct MockEnrichmentServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockEnrichmentServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/v1/categorize", post(handle_categorize))
            .route("/slow/v1/categorize", post(handle_slow_categorize))
            .route("/error", post(handle_error));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn categorize_url(&self) -> String {
        format!("{}/v1/categorize", self.url())
    }

    pub fn slow_url(&self) -> String {
        format!("{}/slow/v1/categorize", self.url())
    }

    pub fn error_url(&self) -> String {
        format!("{}/error", self.url())
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockEnrichmentServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct CategorizeRequest {
    transactions: Vec<TransactionBody>,
}

#[derive(Debug, Deserialize)]
struct TransactionBody {
    description: String,
    #[allow(dead_code)]
    amount: f64,
    #[allow(dead_code)]
    currency: String,
}

#[derive(Debug, Serialize)]
struct CategorizeResponse {
    data: Vec<CategorizedTransaction>,
}

#[derive(Debug, Serialize)]
struct CategorizedTransaction {
    category_name: String,
    clean_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
}

/// Fixed answers: (needle, category, clean name, confidence)
const MERCHANTS: &[(&str, &str, &str, Option<f64>)] = &[
    ("NETFLIX", "Subscriptions", "Netflix", Some(0.95)),
    ("WHOLEFDS", "Groceries", "Whole Foods", None),
    ("CHEVRON", "Gas & Automotive", "Chevron", Some(0.88)),
    // Below the acceptance threshold
    ("BLUE BOTTLE", "Dining", "Blue Bottle Coffee", Some(0.55)),
    // Outside the category taxonomy
    ("SPACEPORT", "Space Travel", "Spaceport", Some(0.99)),
];

fn lookup(description: &str) -> Vec<CategorizedTransaction> {
    let upper = description.to_uppercase();
    MERCHANTS
        .iter()
        .find(|(needle, ..)| upper.contains(needle))
        .map(|(_, category, name, confidence)| CategorizedTransaction {
            category_name: category.to_string(),
            clean_description: name.to_string(),
            confidence: *confidence,
        })
        .into_iter()
        .collect()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty())
}

async fn handle_categorize(
    headers: HeaderMap,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<CategorizeResponse>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let data = request
        .transactions
        .first()
        .map(|t| lookup(&t.description))
        .unwrap_or_default();

    Ok(Json(CategorizeResponse { data }))
}

async fn handle_slow_categorize(
    headers: HeaderMap,
    body: Json<CategorizeRequest>,
) -> Result<Json<CategorizeResponse>, StatusCode> {
    tokio::time::sleep(SLOW_RESPONSE_DELAY).await;
    handle_categorize(headers, body).await
}

async fn handle_error() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

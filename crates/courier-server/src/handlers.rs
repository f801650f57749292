//! Webhook delivery handlers.
//!
//! This module mounts the delivery endpoint and translates dispatch
//! outcomes into HTTP statuses: 401 for a missing or invalid token, 404
//! when no handler is registered for the decoded subscription, 422 for any
//! processing failure (the broker retries those), and 204 on success.

use crate::config::Config;
use crate::metrics;
use anyhow::Result;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use courier_core::{Bus, CourierError};
use courier_protocol::{auth, Descriptor};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The dispatch bus.
    pub bus: Arc<Bus>,
    /// Server configuration.
    pub config: Config,
}

/// Run the webhook delivery server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config, bus: Arc<Bus>) -> Result<()> {
    config.validate()?;

    let state = Arc::new(AppState {
        bus,
        config: config.clone(),
    });

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.courier.receive_path, post(receive_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Courier server listening on {}", addr);
    info!(
        "Delivery endpoint: http://{}{}",
        addr, config.courier.receive_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Delivery endpoint handler.
async fn receive_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: String,
) -> StatusCode {
    let start = Instant::now();
    let status = dispatch(
        &state.bus,
        &state.config.courier.secret,
        query.as_deref(),
        &body,
    );
    metrics::record_delivery(status.as_u16());
    metrics::record_latency(start.elapsed().as_secs_f64());
    status
}

/// Authenticate and dispatch one delivery, mapping the outcome to a status.
fn dispatch(bus: &Bus, secret: &str, query: Option<&str>, body: &str) -> StatusCode {
    let Some(token) = extract_token(query, body) else {
        warn!("Delivery rejected: no token");
        return StatusCode::UNAUTHORIZED;
    };
    if let Err(e) = auth::verify_strict(&token, secret) {
        warn!("Delivery rejected: invalid token");
        return status_for(&CourierError::from(e));
    }

    let descriptor = match Descriptor::parse(body) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!(error = %e, "Delivery rejected: malformed body");
            return StatusCode::UNPROCESSABLE_ENTITY;
        }
    };

    match bus.receive(&descriptor) {
        Ok(()) => {
            debug!(subscription = %descriptor.subscription, "Delivery processed");
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            warn!(subscription = %descriptor.subscription, error = %e, "Delivery failed");
            metrics::record_error(match e {
                CourierError::InvalidHandler(_) => "invalid_handler",
                _ => "processing",
            });
            status_for(&e)
        }
    }
}

/// HTTP status for a dispatch error.
fn status_for(error: &CourierError) -> StatusCode {
    match error {
        CourierError::Authentication => StatusCode::UNAUTHORIZED,
        CourierError::InvalidHandler(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Pull the auth token from the query string or a top-level `token` field
/// in the JSON body. The query string wins when both are present.
fn extract_token(query: Option<&str>, body: &str) -> Option<String> {
    if let Some(token) = query.and_then(|q| query_param(q, "token")) {
        return Some(token);
    }

    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("token")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use courier_core::{Config as CoreConfig, Message, Subscriber, TopicBinding};
    use serde_json::json;

    const SECRET: &str = "s3cret";

    struct NullSubscriber;

    impl Subscriber for NullSubscriber {
        fn topics(&self) -> Vec<TopicBinding> {
            vec![TopicBinding::new("orders")]
        }

        fn process(&self, _message: &Message) -> Result<(), CourierError> {
            Ok(())
        }
    }

    struct FailingSubscriber;

    impl Subscriber for FailingSubscriber {
        fn topics(&self) -> Vec<TopicBinding> {
            vec![TopicBinding::new("orders")]
        }

        fn process(&self, _message: &Message) -> Result<(), CourierError> {
            Err(CourierError::Processing("boom".into()))
        }
    }

    fn bus() -> Bus {
        Bus::in_memory(CoreConfig::new(SECRET, "my-app"))
    }

    fn body_for(handler: &str) -> String {
        json!({
            "message": {
                "message_id": "m1",
                "data": STANDARD.encode(b"{\"order_id\":1}"),
                "attributes": {}
            },
            "subscription": format!("projects/p/subscriptions/my-app.{handler}.orders")
        })
        .to_string()
    }

    fn token_query() -> String {
        format!("token={}", auth::issue(SECRET).unwrap())
    }

    #[test]
    fn test_extract_token_prefers_query() {
        let body = json!({"token": "from-body"}).to_string();
        assert_eq!(
            extract_token(Some("a=1&token=from-query"), &body),
            Some("from-query".to_string())
        );
        assert_eq!(extract_token(None, &body), Some("from-body".to_string()));
        assert_eq!(extract_token(Some("a=1"), "{}"), None);
        assert_eq!(extract_token(None, "not json"), None);
    }

    #[test]
    fn test_dispatch_requires_valid_token() {
        let bus = bus();
        let body = body_for("null_subscriber");

        assert_eq!(
            dispatch(&bus, SECRET, None, &body),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            dispatch(&bus, SECRET, Some("token=garbage"), &body),
            StatusCode::UNAUTHORIZED
        );

        // A token signed with the empty string must not authenticate.
        let forged = format!("token={}", auth::issue("").unwrap());
        assert_eq!(
            dispatch(&bus, SECRET, Some(&forged), &body),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_dispatch_success_and_statuses() {
        let bus = bus();
        bus.registry().register_subscriber(NullSubscriber);
        bus.registry().register_subscriber(FailingSubscriber);
        let query = token_query();

        // Registered handler, processing succeeds.
        assert_eq!(
            dispatch(&bus, SECRET, Some(&query), &body_for("null_subscriber")),
            StatusCode::NO_CONTENT
        );

        // Unknown handler.
        assert_eq!(
            dispatch(&bus, SECRET, Some(&query), &body_for("ghost")),
            StatusCode::NOT_FOUND
        );

        // Handler failure is retryable.
        assert_eq!(
            dispatch(&bus, SECRET, Some(&query), &body_for("failing_subscriber")),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        // Malformed body.
        assert_eq!(
            dispatch(&bus, SECRET, Some(&query), "not json"),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_token_in_body_is_accepted() {
        let bus = bus();
        bus.registry().register_subscriber(NullSubscriber);

        let mut body: serde_json::Value =
            serde_json::from_str(&body_for("null_subscriber")).unwrap();
        body["token"] = json!(auth::issue(SECRET).unwrap());

        assert_eq!(
            dispatch(&bus, SECRET, None, &body.to_string()),
            StatusCode::NO_CONTENT
        );
    }
}

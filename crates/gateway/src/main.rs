//! MSA Board API Gateway
//!
//! The entry point for dashboard API requests.
//! Handles:
//! - MSA bucket queries
//! - Document listing, tagging and deletion
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    http::StatusCode,
    routing::{delete, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use msaboard_common::{
    buckets::BucketEngine,
    cache::create_cache,
    config::AppConfig,
    errors::Result,
    metrics,
    service::BucketService,
    store::create_store,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: BucketService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting MSA Board API Gateway v{}",
        msaboard_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    let config = Arc::new(config);

    // Wire the document store, cache and bucketing engine
    let store = create_store(&config.backend)?;
    let cache = create_cache(&config.cache).await?;
    info!(
        store = store.name(),
        cache = cache.name(),
        expiry_threshold_days = config.buckets.expiry_threshold_days,
        "Bucket service configured"
    );

    let service = BucketService::new(
        store,
        cache,
        BucketEngine::new(config.buckets.expiry_threshold_days),
        config.cache_ttl(),
    );

    let state = AppState {
        config: config.clone(),
        service,
    };

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Open connections get `shutdown_timeout` to drain after the signal
    let shutdown_started = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown_started = shutdown_started.clone();
        async move {
            shutdown_signal().await;
            shutdown_started.notify_one();
        }
    });

    let drain_limit = config.shutdown_timeout();
    tokio::select! {
        result = server.into_future() => result?,
        _ = drain_deadline(shutdown_started, drain_limit) => {
            warn!(
                timeout_secs = drain_limit.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Install the tracing subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Result<Router> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout =
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, state.config.request_timeout());

    // API routes
    let mut api_routes = Router::new()
        // Bucket view
        .route("/documents/msa-buckets", get(handlers::buckets::msa_buckets))
        // Document endpoints
        .route("/documents", get(handlers::documents::list_documents))
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document)
                .put(handlers::documents::tag_document)
                .delete(handlers::documents::delete_document),
        )
        // Delete path used by the processing backend's own clients
        .route(
            "/processed-documents/{id}",
            delete(handlers::documents::delete_document),
        );

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limiter =
            middleware::rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst)?;
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Ok(Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state))
}

/// Resolves once shutdown has started and `limit` has passed since
async fn drain_deadline(shutdown_started: Arc<Notify>, limit: Duration) {
    shutdown_started.notified().await;
    tokio::time::sleep(limit).await;
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request},
    };
    use msaboard_common::{
        cache::MemoryQueryCache,
        models::{DocumentCategory, DocumentRecord},
        store::MemoryDocumentStore,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn documents() -> Vec<DocumentRecord> {
        let due = (chrono::Utc::now().date_naive() + chrono::Days::new(5))
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        vec![
            DocumentRecord::new("doc1", DocumentCategory::Agreement)
                .with_msa("MSA-1")
                .with_amount(1000.0)
                .with_currency("EUR")
                .with_due_date(due),
            DocumentRecord::new("doc2", DocumentCategory::PurchaseOrder)
                .with_msa("MSA-1")
                .with_amount(500.0),
            DocumentRecord::new("doc3", DocumentCategory::Invoice).with_amount(200.0),
        ]
    }

    fn app_with(config: AppConfig) -> Router {
        let service = BucketService::new(
            Arc::new(MemoryDocumentStore::with_documents(documents())),
            Arc::new(MemoryQueryCache::new(16)),
            BucketEngine::default(),
            Duration::from_secs(60),
        );
        create_router(AppState {
            config: Arc::new(config),
            service,
        })
        .unwrap()
    }

    fn app() -> Router {
        app_with(AppConfig::default())
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_drain_deadline_waits_for_shutdown() {
        let shutdown_started = Arc::new(Notify::new());

        // Nothing has signalled yet, so the deadline never fires
        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            drain_deadline(shutdown_started.clone(), Duration::ZERO),
        )
        .await;
        assert!(pending.is_err());

        shutdown_started.notify_one();
        let fired = tokio::time::timeout(
            Duration::from_secs(1),
            drain_deadline(shutdown_started, Duration::from_millis(10)),
        )
        .await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready() {
        let (status, body) = send(app(), Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["store"]["status"], "up");
        assert_eq!(body["checks"]["cache"]["status"], "up");
    }

    #[tokio::test]
    async fn test_msa_buckets_shape() {
        let (status, body) = send(app(), Method::GET, "/api/documents/msa-buckets", None).await;
        assert_eq!(status, StatusCode::OK);

        let buckets = body["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);

        let bucket = &buckets[0];
        assert_eq!(bucket["msa_number"], "MSA-1");
        assert_eq!(bucket["msa_documents"][0]["id"], "doc1");
        assert_eq!(bucket["po_documents"][0]["id"], "doc2");
        assert_eq!(bucket["invoice_documents"].as_array().unwrap().len(), 0);
        assert_eq!(bucket["other_documents"].as_array().unwrap().len(), 0);
        assert_eq!(bucket["total_msa_value"], 1000.0);
        assert_eq!(bucket["total_po_value"], 500.0);
        assert_eq!(bucket["total_invoice_value"], 0.0);
        assert_eq!(bucket["currency"], "EUR");
        assert_eq!(bucket["days_until_expiry"], 5);
        assert_eq!(bucket["expiring_soon"], true);

        assert_eq!(body["unlinked_documents"][0]["id"], "doc3");
    }

    #[tokio::test]
    async fn test_msa_buckets_threshold_param() {
        let (status, body) = send(
            app(),
            Method::GET,
            "/api/documents/msa-buckets?expiring_within_days=3",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["buckets"][0]["expiring_soon"], false);

        let (status, body) = send(
            app(),
            Method::GET,
            "/api/documents/msa-buckets?expiring_within_days=-4",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            app(),
            Method::GET,
            "/api/documents/msa-buckets?expiring_within_days=soon",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_and_get_documents() {
        let (status, body) = send(app(), Method::GET, "/api/documents", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"].as_array().unwrap().len(), 3);

        let (status, body) = send(app(), Method::GET, "/api/documents/doc2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document"]["category"], "purchase_order");
    }

    #[tokio::test]
    async fn test_unknown_document_is_404() {
        let (status, body) = send(app(), Method::GET, "/api/documents/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "DOCUMENT_NOT_FOUND");

        let (status, _) = send(
            app(),
            Method::PUT,
            "/api/documents/nope",
            Some(json!({ "msa_number": "MSA-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tag_moves_document_into_bucket() {
        let app = app();

        let (status, body) = send(
            app.clone(),
            Method::PUT,
            "/api/documents/doc3",
            Some(json!({ "msa_number": " MSA-1 " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document"]["msa_number"], "MSA-1");

        let (_, body) = send(app, Method::GET, "/api/documents/msa-buckets", None).await;
        assert_eq!(body["unlinked_documents"].as_array().unwrap().len(), 0);
        assert_eq!(body["buckets"][0]["invoice_documents"][0]["id"], "doc3");
        assert_eq!(body["buckets"][0]["total_invoice_value"], 200.0);
    }

    #[tokio::test]
    async fn test_blank_tag_is_400() {
        let (status, body) = send(
            app(),
            Method::PUT,
            "/api/documents/doc3",
            Some(json!({ "msa_number": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "msa_number");

        let (status, _) = send(app(), Method::PUT, "/api/documents/doc3", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_routes() {
        let app = app();

        let (status, body) = send(app.clone(), Method::DELETE, "/api/documents/doc2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Document deleted successfully");

        let (status, _) = send(
            app.clone(),
            Method::DELETE,
            "/api/processed-documents/doc3",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(app, Method::GET, "/api/documents", None).await;
        assert_eq!(body["documents"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = app_with(config);

        let (status, _) = send(app.clone(), Method::GET, "/api/documents", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app.clone(), Method::GET, "/api/documents", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");

        // Health probes are outside the limiter
        let (status, _) = send(app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_503() {
        let mut config = AppConfig::default();
        config.backend.base_url = None;
        let service = BucketService::new(
            create_store(&config.backend).unwrap(),
            Arc::new(MemoryQueryCache::new(16)),
            BucketEngine::default(),
            Duration::from_secs(60),
        );
        let app = create_router(AppState {
            config: Arc::new(config),
            service,
        })
        .unwrap();

        let (status, body) = send(app, Method::GET, "/api/documents/msa-buckets", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "BACKEND_NOT_CONFIGURED");
    }
}

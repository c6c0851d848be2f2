//! API server — serves the management API and operational endpoints over HTTP.

use crate::rest::{self, AppState};
use axum::routing::get;
use axum::Router;
use campaign_core::config::AppConfig;
use campaign_management::{management_router, CampaignService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    service: Arc<CampaignService>,
}

impl ApiServer {
    pub fn new(config: AppConfig, service: Arc<CampaignService>) -> Self {
        Self { config, service }
    }

    /// Full application router: unauthenticated health endpoints plus the
    /// token-gated management API.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let health = Router::new()
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .with_state(state);

        Router::new()
            .merge(health)
            .merge(management_router(
                self.service.clone(),
                &self.config.admin.token,
            ))
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.metrics.port);
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use campaign_channels::LogSender;
    use campaign_management::CampaignStore;
    use campaign_segmentation::{
        InMemoryAudienceStore, MockAudienceStore, SegmentEvaluator, StoreError,
    };
    use tower::ServiceExt;

    fn server(evaluator: SegmentEvaluator) -> ApiServer {
        let service = CampaignService::new(
            Arc::new(CampaignStore::new()),
            evaluator,
            Arc::new(LogSender),
        );
        let mut config = AppConfig::default();
        config.admin.token = "ops-token".into();
        ApiServer::new(config, Arc::new(service))
    }

    fn demo_server() -> ApiServer {
        server(SegmentEvaluator::new(Arc::new(
            InMemoryAudienceStore::with_demo_data(),
        )))
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoints_skip_auth() {
        let app = demo_server().router();
        assert_eq!(status_of(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app.clone(), "/ready").await, StatusCode::OK);
        assert_eq!(status_of(app, "/live").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_management_requires_token() {
        let app = demo_server().router();
        assert_eq!(
            status_of(app, "/api/v1/management/campaigns").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_configured_token_is_accepted() {
        let app = demo_server().router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/management/audience/stats")
                    .header("authorization", "Bearer ops-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unconfigured_token_rejects_everything() {
        let service = CampaignService::new(
            Arc::new(CampaignStore::new()),
            SegmentEvaluator::new(Arc::new(InMemoryAudienceStore::with_demo_data())),
            Arc::new(LogSender),
        );
        let app = ApiServer::new(AppConfig::default(), Arc::new(service)).router();

        for header in ["Bearer ", "Bearer dev-admin-token"] {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/v1/management/campaigns")
                        .header("authorization", header)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_not_ready_when_store_fails() {
        let mut store = MockAudienceStore::new();
        store
            .expect_count()
            .returning(|_, _| Err(StoreError::Unavailable("down".into())));
        let app = server(SegmentEvaluator::new(Arc::new(store))).router();

        assert_eq!(
            status_of(app.clone(), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(app, "/live").await, StatusCode::OK);
    }
}

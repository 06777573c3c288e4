use crate::{
    api::handlers::health,
    gateway::{Gateway, GatewayConfig, MemoryTokenBridge},
    store::{CredentialStore, PgStore},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    routing::{get, options},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, debug, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Credentials for the admin account created at startup.
#[derive(Debug)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: SecretString,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    config: GatewayConfig,
    admin: Option<AdminBootstrap>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store.apply_schema().await?;
    let store: Arc<dyn CredentialStore> = Arc::new(store);

    let tokens = Arc::new(MemoryTokenBridge::new(config.token_ttl()));
    let gateway = Arc::new(Gateway::new(config, store, tokens)?);

    if let Some(admin) = admin {
        gateway
            .bootstrap_admin(&admin.email, admin.password.expose_secret())
            .await
            .context("Failed to create admin user")?;
    }

    let sweeper = spawn_token_sweeper(gateway.clone());
    let app = app(gateway)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();

    Ok(())
}

/// The full application: documented routes plus middleware.
///
/// # Errors
/// Returns an error if the gateway base URL is not a valid origin.
pub fn app(gateway: Arc<Gateway>) -> Result<Router> {
    let origin = frontend_origin(gateway.config().base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let (router, openapi) = router().split_for_parts();
    Ok(router
        .route("/health", options(health::health))
        .route("/openapi.json", get(move || async move { Json(openapi) }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(gateway)),
        ))
}

fn spawn_token_sweeper(gateway: Arc<Gateway>) -> JoinHandle<()> {
    let period = gateway.config().token_sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let purged = gateway.purge_expired_tokens();
            if purged > 0 {
                debug!(purged, "Purged expired handoff tokens");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid gateway base URL: {base_url}"))?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return Err(anyhow!("Gateway base URL must include a valid host: {base_url}"));
    }
    HeaderValue::from_str(&origin.ascii_serialization())
        .context("Failed to build gateway origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_keeps_scheme_host_and_port() -> Result<()> {
        assert_eq!(
            frontend_origin("https://auth.example.com/some/path")?,
            "https://auth.example.com"
        );
        assert_eq!(
            frontend_origin("http://auth.example.com:8080")?,
            "http://auth.example.com:8080"
        );
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }
}

// Module declarations
pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use axum::{
    extract::{Extension, State},
    http::{HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::AppState,
    app_config::AppConfig,
    db::{check_diesel_health, create_diesel_pool, mask_connection_string},
    handlers::{admin_routes, auth_routes, session_routes, user_routes},
    middleware::{
        api_rate_limit_middleware, auth_middleware, require_admin, security_headers_middleware,
        SecurityHeadersConfig,
    },
    services::{
        audit::DEFAULT_QUEUE_DEPTH, AuditJournal, AuthService, EnvSecrets, KeyProvider,
        LockoutConfig, LockoutService, RateLimiter, RefreshConfig, RefreshService,
        SecretsProvider, TokenConfig, TokenService,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle version flag for container health checks - must be FIRST
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--version" {
        println!("sentra-backend v{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentra_backend_core=debug,axum=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // All configuration is read ONCE here at the composition root
    let config = Arc::new(AppConfig::from_env()?);
    let bind_address = config.bind_address.clone();
    info!("=== STARTING SENTRA BACKEND ===");
    info!("Environment: {}", config.environment);

    // Database pool
    info!("Initializing database pool...");
    info!(
        "Database URL: {}",
        mask_connection_string(&config.database.url)
    );
    let diesel_pool = match create_diesel_pool(&config.database).await {
        Ok(pool) => {
            info!("✓ Database connection pool initialized");
            pool
        },
        Err(e) => {
            error!("✗ Failed to initialize database pool: {}", e);
            return Err(format!("Database initialization failed: {}", e).into());
        },
    };

    // Embedded migrations, applied in lexicographic order
    info!("Running embedded migrations...");
    match migrations::run_migrations(&config.database.url).await {
        Ok(0) => info!("✓ Migrations up to date"),
        Ok(count) => info!("✓ Applied {} migrations", count),
        Err(e) => {
            error!("✗ Migration failed: {}", e);
            return Err(format!("Migration failed: {}", e).into());
        },
    }

    // Signing material is read exactly once and held as a derived key table
    let secrets = EnvSecrets;
    let signing_secret = secrets.signing_secret()?;
    let key_provider = Arc::new(KeyProvider::new(
        signing_secret.as_bytes(),
        chrono::Duration::hours(config.jwt.rotation_grace_period_hours as i64),
    )?);
    info!("✓ Key provider seeded (grace window {}h)", config.jwt.rotation_grace_period_hours);

    let token_service = Arc::new(TokenService::new(
        TokenConfig {
            expiration_ms: config.jwt.expiration_ms,
            audience: config.jwt.audience.clone(),
            issuer: config.jwt.issuer.clone(),
        },
        Arc::clone(&key_provider),
    ));

    // Audit journal: callers enqueue, the worker persists
    let audit = AuditJournal::spawn(diesel_pool.clone(), DEFAULT_QUEUE_DEPTH);
    info!("✓ Audit journal worker started");

    let refresh_service = Arc::new(RefreshService::new(
        diesel_pool.clone(),
        RefreshConfig::from_settings(&config.security),
        audit.clone(),
    ));

    let lockout_service = Arc::new(LockoutService::new(
        diesel_pool.clone(),
        LockoutConfig::from_settings(&config.security),
        audit.clone(),
    ));

    let auth_service = Arc::new(AuthService::new(
        diesel_pool.clone(),
        Arc::clone(&token_service),
        Arc::clone(&refresh_service),
        Arc::clone(&lockout_service),
        audit.clone(),
    ));

    let rate_limiter = Arc::new(RateLimiter::new());

    // Periodic retention: token purges and key sweep
    services::spawn_maintenance(
        Arc::clone(&refresh_service),
        Arc::clone(&key_provider),
        config.cleanup_interval_seconds,
    );
    info!(
        "✓ Maintenance task started (every {}s)",
        config.cleanup_interval_seconds
    );

    let app_state = AppState {
        config: Arc::clone(&config),
        diesel_pool: diesel_pool.clone(),
        key_provider,
        token_service,
        refresh_service,
        lockout_service,
        auth_service,
        rate_limiter,
        audit,
    };

    let cors = build_cors_layer(&config);
    info!(
        "CORS: configured origins {:?} for {} environment",
        config.cors_allowed_origins, config.environment
    );

    // Auth routes: register/login/refresh are public, logout routes carry the
    // bearer middleware
    let auth_router = auth_routes().merge(session_routes().route_layer(
        axum_middleware::from_fn_with_state(app_state.clone(), auth_middleware),
    ));

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_router)
        .nest(
            "/api/users",
            user_routes()
                .route_layer(axum_middleware::from_fn_with_state(
                    app_state.clone(),
                    auth_middleware,
                ))
                // Admission runs before authentication: outermost layer
                .route_layer(axum_middleware::from_fn_with_state(
                    app_state.clone(),
                    api_rate_limit_middleware,
                )),
        )
        .nest(
            "/api/admin",
            admin_routes()
                .route_layer(axum_middleware::from_fn_with_state(
                    app_state.clone(),
                    require_admin,
                ))
                .route_layer(axum_middleware::from_fn_with_state(
                    app_state.clone(),
                    auth_middleware,
                ))
                .route_layer(axum_middleware::from_fn_with_state(
                    app_state.clone(),
                    api_rate_limit_middleware,
                )),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(cors)
                .layer(Extension(SecurityHeadersConfig {
                    hsts: config.is_production(),
                }))
                .layer(axum_middleware::from_fn(security_headers_middleware)),
        )
        .with_state(app_state);

    let addr: SocketAddr = bind_address.parse()?;
    info!("Starting HTTP server on {}...", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// CORS from configured origins. Wildcard (non-production only) disables
/// credentials; a whitelist allows them. Preflight results cache for 3600 s.
fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let has_wildcard = config.cors_allowed_origins.iter().any(|o| o == "*");

    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::header::ORIGIN,
        ])
        .max_age(Duration::from_secs(3600));

    if has_wildcard {
        // from_env rejects this in production
        base.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        base.allow_origin(origins).allow_credentials(true)
    }
}

// Health check handler
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    use serde_json::json;

    let timestamp = chrono::Utc::now().to_rfc3339();

    let (healthy, db_status) = match check_diesel_health(&state.diesel_pool).await {
        Ok(_) => (true, json!({"status": "healthy", "error": null})),
        Err(e) => (
            false,
            json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            }),
        ),
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "sentra-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": db_status,
            "signing_keys": json!({
                "status": "healthy",
                "held": state.key_provider.key_count()
            })
        }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

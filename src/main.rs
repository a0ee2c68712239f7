//! Ripple server binary.
//!
//! Parses configuration from flags and environment, initializes tracing
//! and serves the API router.

use axum::http::Method;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ripple::config::Config;
use ripple::server::{build_router, AppState};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ripple-server", version, about = "Ripple social backend server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "RIPPLE_PORT")]
    port: u16,

    /// HMAC secret for session tokens
    #[arg(long, default_value = "change-me", env = "RIPPLE_SECRET")]
    secret: String,

    /// Session token TTL in seconds
    #[arg(long, default_value_t = 7 * 24 * 3600, env = "SESSION_TTL_SECS")]
    session_ttl_secs: i64,

    /// Default page size for feed and comment listings
    #[arg(long, default_value_t = 10, env = "RIPPLE_PAGE_SIZE")]
    page_size: usize,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.secret == "change-me" {
        tracing::warn!("Running with the default token secret; set RIPPLE_SECRET in production");
    }

    let config = Config {
        port: args.port,
        secret: args.secret,
        session_ttl_secs: args.session_ttl_secs,
        page_size: args.page_size,
    };

    let state = AppState::new(config.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Ripple server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

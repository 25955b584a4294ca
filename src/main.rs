use std::net::{Ipv4Addr, SocketAddr};

use taskpay_server::config::AppConfig;
use taskpay_server::database::client::{Database, DbConfig};
use taskpay_server::init;
use taskpay_server::middleware::error::AppResult;
use taskpay_server::middleware::mw_ctx;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let db = Database::connect(DbConfig {
        url: &config.db_url,
        database: &config.db_database,
        namespace: &config.db_namespace,
        username: config.db_username.as_deref(),
        password: config.db_password.as_deref(),
    })
    .await;

    init::run_migrations(&db).await?;

    let ctx_state = mw_ctx::create_ctx_state(db, &config);
    let routes_all = init::main_router(&ctx_state);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080));
    info!("->> LISTENING on {addr}\n");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("tcp listener binds");

    axum::serve(listener, routes_all.into_make_service())
        .await
        .expect("server runs");

    Ok(())
}

use {
    billing_sync::{
        AppState,
        adapters::{http, stripe_client::StripeProvider},
        config::Config,
        services::{dispatch::BillingService, worker},
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let provider = Arc::new(StripeProvider::new(
        &config.stripe_secret_key,
        config.provider_timeout,
    ));
    let billing = BillingService::new(provider, config.billing_settings());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker::run_worker(
        pool.clone(),
        billing.clone(),
        shutdown_rx.clone(),
    ));
    let reaper_handle = tokio::spawn(worker::run_reaper(pool.clone(), shutdown_rx));

    let state = AppState { pool, billing };
    // provider calls are bounded individually; this caps a whole checkout
    let request_budget = config.provider_timeout * 6;
    let app = http::app(state, request_budget);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(worker_handle, reaper_handle);
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

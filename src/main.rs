use {
    pesa_sync::{
        AppState,
        adapters::daraja::{DarajaConfig, DarajaGateway},
        domain::ports::SystemClock,
        infra::{
            memory::LoggingEmailSender,
            postgres::{
                organisation_repo::PgOrganisationRepository,
                payment_request_repo::PgPaymentRequestStore, user_repo::PgUserRepository,
            },
        },
        services::{activation::SubscriptionActivator, poller::PollerConfig},
    },
    sqlx::postgres::PgPoolOptions,
    std::{env, sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let daraja_config = DarajaConfig::from_env().expect("incomplete gateway configuration");
    let poller_config = PollerConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    let clock = Arc::new(SystemClock);
    let requests = Arc::new(PgPaymentRequestStore::new(pool.clone()));
    let organisations = Arc::new(PgOrganisationRepository::new(pool.clone()));
    let activator = Arc::new(SubscriptionActivator::new(
        requests.clone(),
        organisations.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = AppState {
        gateway: Arc::new(DarajaGateway::new(daraja_config, clock.clone())),
        requests,
        organisations,
        users: Arc::new(PgUserRepository::new(pool)),
        mailer: Arc::new(LoggingEmailSender),
        activator,
        clock,
        poller: poller_config,
        shutdown: shutdown_rx,
    };

    let app = pesa_sync::router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on 0.0.0.0:3000");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Tell in-flight poll loops to stop waiting on the gateway.
            let _ = shutdown_tx.send(true);
        })
        .await
        .unwrap();
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

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

use {
    crate::{
        domain::ports::{
            Clock, EmailSender, OrganisationRepository, PaymentGateway, PaymentRequestStore,
            UserRepository,
        },
        services::{activation::SubscriptionActivator, poller::PollerConfig},
    },
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
    tower_http::timeout::TimeoutLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn PaymentGateway>,
    pub requests: Arc<dyn PaymentRequestStore>,
    pub organisations: Arc<dyn OrganisationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub mailer: Arc<dyn EmailSender>,
    pub activator: Arc<SubscriptionActivator>,
    pub clock: Arc<dyn Clock>,
    pub poller: PollerConfig,
    /// Flips to `true` on shutdown; the poll loop exits early on it.
    pub shutdown: watch::Receiver<bool>,
}

pub fn router(state: AppState) -> Router {
    // No timeout on /payments/push — it legitimately blocks for the whole
    // poll budget. The callback must answer fast or the gateway re-delivers.
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/payments/push", post(adapters::push::push_handler))
        .route(
            "/payments/callback",
            post(adapters::callback::callback_handler)
                .layer(TimeoutLayer::new(Duration::from_secs(10))),
        )
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

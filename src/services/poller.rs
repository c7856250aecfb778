use {
    crate::domain::{
        id::CheckoutRequestId,
        ports::{PaymentGateway, QueryVerdict},
    },
    std::time::Duration,
    tokio::sync::watch,
};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// How many status queries to issue before giving up.
    pub attempts: u32,
    /// Fixed wait between attempts.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(3),
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.attempts = std::env::var("POLLER_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.attempts);
        cfg.interval = Duration::from_secs(
            std::env::var("POLLER_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.interval.as_secs()),
        );
        cfg
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Confirmed {
        description: String,
    },
    Rejected {
        code: String,
        description: String,
    },
    /// Attempt budget exhausted (or the caller went away) without a terminal
    /// answer. Indeterminate, not a failure — the callback channel may still
    /// resolve the payment later.
    TimedOut {
        attempts: u32,
    },
}

/// Repeatedly query the gateway until the payment resolves or the attempt
/// budget runs out. A failed query consumes an attempt and the loop
/// continues; the gateway, not this process, is the source of truth.
pub async fn poll_confirmation(
    gateway: &dyn PaymentGateway,
    id: &CheckoutRequestId,
    config: &PollerConfig,
    mut cancel: watch::Receiver<bool>,
) -> PollOutcome {
    let mut attempted = 0u32;

    while attempted < config.attempts {
        attempted += 1;

        match gateway.query_status(id).await {
            Ok(reply) => match reply.classify() {
                QueryVerdict::Confirmed => {
                    tracing::info!(checkout_request_id = %id, attempt = attempted, "payment confirmed");
                    return PollOutcome::Confirmed {
                        description: reply.result_desc,
                    };
                }
                QueryVerdict::Rejected { code, description } => {
                    tracing::info!(
                        checkout_request_id = %id,
                        attempt = attempted,
                        result_code = %code,
                        "payment rejected"
                    );
                    return PollOutcome::Rejected { code, description };
                }
                QueryVerdict::Pending => {
                    tracing::debug!(checkout_request_id = %id, attempt = attempted, "still pending");
                }
                QueryVerdict::Inconclusive => {
                    tracing::warn!(
                        checkout_request_id = %id,
                        attempt = attempted,
                        "query not accepted by gateway, attempt consumed"
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    checkout_request_id = %id,
                    attempt = attempted,
                    error = %e,
                    "status query failed, attempt consumed"
                );
            }
        }

        if attempted < config.attempts {
            tokio::select! {
                _ = cancel.changed() => {
                    tracing::debug!(checkout_request_id = %id, "poll cancelled");
                    return PollOutcome::TimedOut { attempts: attempted };
                }
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    PollOutcome::TimedOut {
        attempts: attempted,
    }
}

use {
    crate::domain::{
        ports::{EmailMessage, EmailSender, UserRepository},
        subscription::{Organisation, OrganisationSubscription},
    },
    std::sync::Arc,
};

/// Best-effort confirmation email to the organisation's admin. Every
/// failure path is logged and swallowed; the payment response has already
/// been decided by the time this runs.
pub async fn send_confirmation(
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn EmailSender>,
    organisation: Organisation,
    subscription: OrganisationSubscription,
) {
    let admin = match users.find_by_id(organisation.admin_user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(
                organisation_id = %organisation.id,
                admin_user_id = %organisation.admin_user_id,
                "no admin user found, skipping confirmation email"
            );
            return;
        }
        Err(e) => {
            tracing::warn!(
                organisation_id = %organisation.id,
                error = %e,
                "admin lookup failed, skipping confirmation email"
            );
            return;
        }
    };

    let end_date = subscription
        .end_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let message = EmailMessage {
        to: admin.email,
        subject: format!("{} subscription activated", organisation.name),
        body: format!(
            "Your payment was received. The subscription for {} is active until {}.",
            organisation.name, end_date,
        ),
    };

    if let Err(e) = mailer.send(&message).await {
        tracing::warn!(
            organisation_id = %organisation.id,
            error = %e,
            "confirmation email failed"
        );
    }
}

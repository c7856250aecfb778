use {
    crate::domain::{
        error::FlowError,
        id::{OrganisationId, PhoneNumber},
        ports::{BoxFuture, OrganisationRepository},
        subscription::{Organisation, OrganisationSubscription, SubscriptionStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Row},
    uuid::Uuid,
};

pub struct PgOrganisationRepository {
    pool: PgPool,
}

impl PgOrganisationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "id, name, phone_number, admin_user_id, subscription_status, subscription_end_date";

fn row_to_organisation(row: &sqlx::postgres::PgRow) -> Result<Organisation, FlowError> {
    let status: String = row.try_get("subscription_status")?;
    let phone: String = row.try_get("phone_number")?;
    Ok(Organisation {
        id: OrganisationId::new(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        phone_number: PhoneNumber::new(&phone)?,
        admin_user_id: row.try_get("admin_user_id")?,
        subscription: OrganisationSubscription {
            status: SubscriptionStatus::try_from(status.as_str())?,
            end_date: row.try_get::<Option<DateTime<Utc>>, _>("subscription_end_date")?,
        },
    })
}

impl OrganisationRepository for PgOrganisationRepository {
    fn find_by_id(
        &self,
        id: &OrganisationId,
    ) -> BoxFuture<'_, Result<Option<Organisation>, FlowError>> {
        let id = *id;
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM organisations WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(row_to_organisation).transpose()
        })
    }

    fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> BoxFuture<'_, Result<Option<Organisation>, FlowError>> {
        let phone = phone.clone();
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM organisations WHERE phone_number = $1"
            ))
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(row_to_organisation).transpose()
        })
    }

    fn update_subscription(
        &self,
        id: &OrganisationId,
        subscription: &OrganisationSubscription,
    ) -> BoxFuture<'_, Result<(), FlowError>> {
        let id = *id;
        let subscription = subscription.clone();
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE organisations \
                 SET subscription_status = $2, subscription_end_date = $3, updated_at = now() \
                 WHERE id = $1",
            )
            .bind(id.as_uuid())
            .bind(subscription.status.as_str())
            .bind(subscription.end_date)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(FlowError::Validation(format!("unknown organisation: {id}")));
            }
            Ok(())
        })
    }
}

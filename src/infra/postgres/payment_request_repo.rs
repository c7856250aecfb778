use {
    crate::domain::{
        error::FlowError,
        id::{CheckoutRequestId, OrganisationId, PhoneNumber},
        payment::{NewPaymentRequest, PaymentRequest, PaymentStatus, TransitionOutcome},
        ports::{BoxFuture, PaymentRequestStore},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Row},
    uuid::Uuid,
};

pub struct PgPaymentRequestStore {
    pool: PgPool,
}

impl PgPaymentRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_request(row: &sqlx::postgres::PgRow) -> Result<PaymentRequest, FlowError> {
    let status: String = row.try_get("status")?;
    let phone: String = row.try_get("phone_number")?;
    Ok(PaymentRequest {
        checkout_request_id: CheckoutRequestId::new(row.try_get::<String, _>("checkout_request_id")?)?,
        organisation_id: OrganisationId::new(row.try_get::<Uuid, _>("organisation_id")?),
        phone_number: PhoneNumber::new(&phone)?,
        amount: row.try_get("amount")?,
        status: PaymentStatus::try_from(status.as_str())?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

const SELECT_COLUMNS: &str = "checkout_request_id, organisation_id, phone_number, amount, status, failure_reason, created_at";

impl PaymentRequestStore for PgPaymentRequestStore {
    fn insert(&self, request: NewPaymentRequest) -> BoxFuture<'_, Result<(), FlowError>> {
        Box::pin(async move {
            // First write wins; a retried insert never resets status.
            sqlx::query(
                "INSERT INTO payment_requests \
                 (checkout_request_id, organisation_id, phone_number, amount, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (checkout_request_id) DO NOTHING",
            )
            .bind(request.checkout_request_id.as_str())
            .bind(request.organisation_id.as_uuid())
            .bind(request.phone_number.as_str())
            .bind(request.amount)
            .bind(PaymentStatus::Initiated.as_str())
            .bind(request.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn find(
        &self,
        id: &CheckoutRequestId,
    ) -> BoxFuture<'_, Result<Option<PaymentRequest>, FlowError>> {
        let id = id.clone();
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM payment_requests WHERE checkout_request_id = $1"
            ))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(row_to_request).transpose()
        })
    }

    fn transition(
        &self,
        id: &CheckoutRequestId,
        status: PaymentStatus,
        detail: Option<String>,
    ) -> BoxFuture<'_, Result<TransitionOutcome, FlowError>> {
        let id = id.clone();
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query("SET LOCAL lock_timeout = '5s'")
                .execute(&mut *tx)
                .await?;

            // Serialize all writes for this checkout id; works even before
            // the row exists, so there is no insert race to handle.
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;

            let row = sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM payment_requests WHERE checkout_request_id = $1"
            ))
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                tx.commit().await?;
                return Ok(TransitionOutcome::NotFound);
            };

            let mut request = row_to_request(&row)?;
            let outcome = request.apply_transition(status, detail);

            if outcome == TransitionOutcome::Applied {
                sqlx::query(
                    "UPDATE payment_requests \
                     SET status = $2, failure_reason = $3, updated_at = now() \
                     WHERE checkout_request_id = $1",
                )
                .bind(id.as_str())
                .bind(request.status.as_str())
                .bind(&request.failure_reason)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(outcome)
        })
    }
}

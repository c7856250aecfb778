use {
    crate::domain::{
        error::FlowError,
        ports::{BoxFuture, UserRepository},
        subscription::User,
    },
    sqlx::{PgPool, Row},
    uuid::Uuid,
};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<User>, FlowError>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT id, email FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row
                .map(|row| -> Result<User, FlowError> {
                    Ok(User {
                        id: row.try_get("id")?,
                        email: row.try_get("email")?,
                    })
                })
                .transpose()?)
        })
    }
}

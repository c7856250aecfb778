use {
    crate::domain::{
        error::FlowError,
        id::CheckoutRequestId,
        ports::{Clock, PaymentGateway, PushRequest, StatusQueryReply},
    },
    base64::Engine as _,
    base64::engine::general_purpose::STANDARD as BASE64,
    chrono::{DateTime, Duration, Utc},
    serde::Deserialize,
    std::{env, future::Future, pin::Pin, sync::Arc},
    tokio::sync::Mutex,
};

/// Refresh the cached token this long before the gateway says it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct DarajaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub pass_key: String,
    pub auth_url: String,
    pub push_url: String,
    pub query_url: String,
    pub callback_url: String,
}

impl DarajaConfig {
    pub fn from_env() -> Result<Self, FlowError> {
        let require = |name: &str| {
            env::var(name).map_err(|_| FlowError::Validation(format!("{name} must be set")))
        };
        Ok(Self {
            consumer_key: require("DARAJA_CONSUMER_KEY")?,
            consumer_secret: require("DARAJA_CONSUMER_SECRET")?,
            short_code: require("DARAJA_SHORT_CODE")?,
            pass_key: require("DARAJA_PASS_KEY")?,
            auth_url: require("DARAJA_AUTH_URL")?,
            push_url: require("DARAJA_PUSH_URL")?,
            query_url: require("DARAJA_QUERY_URL")?,
            callback_url: require("DARAJA_CALLBACK_URL")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
    }
}

/// STK password: base64 of short code + pass key + timestamp, with the
/// timestamp in `YYYYMMDDHHmmss` form. Both push and query requests carry
/// the same signature pair.
pub fn signed_timestamp(short_code: &str, pass_key: &str, now: DateTime<Utc>) -> (String, String) {
    let timestamp = now.format("%Y%m%d%H%M%S").to_string();
    let password = BASE64.encode(format!("{short_code}{pass_key}{timestamp}"));
    (timestamp, password)
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
    // Delivered as a string by some gateway versions, a number by others.
    expires_in: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PushReply {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

pub struct DarajaGateway {
    http: reqwest::Client,
    config: DarajaConfig,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<CachedToken>>,
}

impl DarajaGateway {
    pub fn new(config: DarajaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            clock,
            token: Mutex::new(None),
        }
    }

    /// OAuth bearer token, cached until shortly before expiry so the
    /// polling loop does not pay a token round trip per attempt.
    async fn bearer_token(&self) -> Result<String, FlowError> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fresh_at(self.clock.now()) {
                return Ok(cached.value.clone());
            }
        }

        let response = self
            .http
            .post(&self.config.auth_url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| FlowError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlowError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let reply: TokenReply = response
            .json()
            .await
            .map_err(|e| FlowError::Auth(format!("invalid token response: {e}")))?;

        let ttl = reply
            .expires_in
            .as_ref()
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        let cached = CachedToken {
            value: reply.access_token,
            expires_at: self.clock.now() + Duration::seconds(ttl),
        };
        let token = cached.value.clone();
        *slot = Some(cached);
        tracing::debug!(ttl_secs = ttl, "gateway token refreshed");
        Ok(token)
    }

    async fn initiate_push_inner(
        &self,
        request: &PushRequest,
    ) -> Result<CheckoutRequestId, FlowError> {
        let token = self.bearer_token().await?;
        let (timestamp, password) =
            signed_timestamp(&self.config.short_code, &self.config.pass_key, self.clock.now());

        let body = serde_json::json!({
            "BusinessShortCode": self.config.short_code,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": request.amount,
            "PartyA": request.phone_number.as_str(),
            "PartyB": self.config.short_code,
            "PhoneNumber": request.phone_number.as_str(),
            "CallBackURL": self.config.callback_url,
            "AccountReference": request.account_reference,
            "TransactionDesc": request.description,
        });

        let response = self
            .http
            .post(&self.config.push_url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlowError::Gateway(e.to_string()))?;

        let status = response.status();
        let reply: PushReply = response
            .json()
            .await
            .map_err(|e| FlowError::Gateway(format!("invalid push response: {e}")))?;

        match reply.checkout_request_id {
            Some(id) => CheckoutRequestId::new(id),
            None => Err(FlowError::Gateway(format!(
                "push not accepted ({status}): [{}] {}",
                reply.error_code.unwrap_or_default(),
                reply.error_message.unwrap_or_default(),
            ))),
        }
    }

    async fn query_status_inner(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<StatusQueryReply, FlowError> {
        let token = self.bearer_token().await?;
        let (timestamp, password) =
            signed_timestamp(&self.config.short_code, &self.config.pass_key, self.clock.now());

        let body = serde_json::json!({
            "BusinessShortCode": self.config.short_code,
            "Password": password,
            "Timestamp": timestamp,
            "CheckoutRequestID": id.as_str(),
        });

        let response = self
            .http
            .post(&self.config.query_url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlowError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlowError::Gateway(format!(
                "status query returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FlowError::Gateway(format!("invalid status response: {e}")))
    }
}

impl PaymentGateway for DarajaGateway {
    fn initiate_push(
        &self,
        request: &PushRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutRequestId, FlowError>> + Send + '_>> {
        let request = request.clone();
        Box::pin(async move { self.initiate_push_inner(&request).await })
    }

    fn query_status(
        &self,
        id: &CheckoutRequestId,
    ) -> Pin<Box<dyn Future<Output = Result<StatusQueryReply, FlowError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.query_status_inner(&id).await })
    }
}

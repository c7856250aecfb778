use {
    super::error::FlowError,
    super::id::PhoneNumber,
    serde::Deserialize,
    std::collections::HashMap,
};

// Wire shape of the gateway's asynchronous result callback:
// { Body: { stkCallback: { ..., CallbackMetadata: { Item: [{Name, Value}] } } } }

#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<serde_json::Value>,
}

/// The fields a successful callback must carry, reduced from the unordered
/// `Item` list. The gateway does not guarantee item order, so items are
/// folded into a name-keyed map before any field is read.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackDetails {
    pub amount: i64,
    pub phone_number: PhoneNumber,
    pub receipt_number: String,
    pub transaction_date: String,
}

impl CallbackDetails {
    pub fn from_items(items: &[CallbackItem]) -> Result<Self, FlowError> {
        let by_name: HashMap<&str, &serde_json::Value> = items
            .iter()
            .filter_map(|item| item.value.as_ref().map(|v| (item.name.as_str(), v)))
            .collect();

        let amount = by_name
            .get("Amount")
            .and_then(|v| as_amount(v))
            .ok_or_else(|| FlowError::MalformedCallback("missing or invalid Amount".into()))?;

        let phone_raw = by_name
            .get("PhoneNumber")
            .map(|v| scalar_to_string(v))
            .ok_or_else(|| FlowError::MalformedCallback("missing PhoneNumber".into()))?;
        let phone_number = PhoneNumber::new(&phone_raw).map_err(|e| {
            FlowError::MalformedCallback(format!("invalid PhoneNumber: {e}"))
        })?;

        let receipt_number = by_name
            .get("MpesaReceiptNumber")
            .map(|v| scalar_to_string(v))
            .ok_or_else(|| FlowError::MalformedCallback("missing MpesaReceiptNumber".into()))?;

        let transaction_date = by_name
            .get("TransactionDate")
            .map(|v| scalar_to_string(v))
            .ok_or_else(|| FlowError::MalformedCallback("missing TransactionDate".into()))?;

        Ok(Self {
            amount,
            phone_number,
            receipt_number,
            transaction_date,
        })
    }
}

// Metadata values arrive as JSON numbers or strings depending on the field
// and gateway version.
fn as_amount(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => {
            n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))
        }
        serde_json::Value::String(s) => s.parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

fn scalar_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

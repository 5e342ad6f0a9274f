use {
    super::cart::CheckoutRequest,
    super::customer::DomainCustomer,
    super::error::BillingError,
    super::product::DomainProduct,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    std::str::FromStr,
};

/// Inbound message patterns, one handler each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum MessagePattern {
    #[display("addProduct")]
    #[serde(rename = "addProduct")]
    AddProduct,
    #[display("removeProduct")]
    #[serde(rename = "removeProduct")]
    RemoveProduct,
    #[display("addUser")]
    #[serde(rename = "addUser")]
    AddUser,
    #[display("removeUser")]
    #[serde(rename = "removeUser")]
    RemoveUser,
    #[display("doPayment")]
    #[serde(rename = "doPayment")]
    DoPayment,
    #[display("getPaymentLink")]
    #[serde(rename = "getPaymentLink")]
    GetPaymentLink,
    #[display("getBalance")]
    #[serde(rename = "getBalance")]
    GetBalance,
}

impl MessagePattern {
    pub const ALL: [MessagePattern; 7] = [
        Self::AddProduct,
        Self::RemoveProduct,
        Self::AddUser,
        Self::RemoveUser,
        Self::DoPayment,
        Self::GetPaymentLink,
        Self::GetBalance,
    ];
}

impl FromStr for MessagePattern {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_string() == s)
            .ok_or_else(|| BillingError::ValidationFailed(format!("unknown message pattern: {s}")))
    }
}

/// Removal payloads arrive either as a bare id or as `{"id": n}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum IdPayload {
    Bare(i64),
    Wrapped { id: i64 },
}

impl From<IdPayload> for i64 {
    fn from(p: IdPayload) -> Self {
        match p {
            IdPayload::Bare(id) | IdPayload::Wrapped { id } => id,
        }
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    AddProduct(DomainProduct),
    RemoveProduct(i64),
    AddUser(DomainCustomer),
    RemoveUser(i64),
    DoPayment(CheckoutRequest),
    GetPaymentLink(CheckoutRequest),
    GetBalance,
}

impl Message {
    pub fn decode(pattern: MessagePattern, payload: serde_json::Value) -> Result<Self, BillingError> {
        let invalid =
            |e: serde_json::Error| BillingError::ValidationFailed(format!("{pattern} payload: {e}"));
        Ok(match pattern {
            MessagePattern::AddProduct => Self::AddProduct(serde_json::from_value(payload).map_err(invalid)?),
            MessagePattern::RemoveProduct => Self::RemoveProduct(
                serde_json::from_value::<IdPayload>(payload).map_err(invalid)?.into(),
            ),
            MessagePattern::AddUser => Self::AddUser(serde_json::from_value(payload).map_err(invalid)?),
            MessagePattern::RemoveUser => Self::RemoveUser(
                serde_json::from_value::<IdPayload>(payload).map_err(invalid)?.into(),
            ),
            MessagePattern::DoPayment => Self::DoPayment(serde_json::from_value(payload).map_err(invalid)?),
            MessagePattern::GetPaymentLink => {
                Self::GetPaymentLink(serde_json::from_value(payload).map_err(invalid)?)
            }
            MessagePattern::GetBalance => Self::GetBalance,
        })
    }

    pub fn pattern(&self) -> MessagePattern {
        match self {
            Self::AddProduct(_) => MessagePattern::AddProduct,
            Self::RemoveProduct(_) => MessagePattern::RemoveProduct,
            Self::AddUser(_) => MessagePattern::AddUser,
            Self::RemoveUser(_) => MessagePattern::RemoveUser,
            Self::DoPayment(_) => MessagePattern::DoPayment,
            Self::GetPaymentLink(_) => MessagePattern::GetPaymentLink,
            Self::GetBalance => MessagePattern::GetBalance,
        }
    }
}

use {
    super::customer::DomainCustomer,
    super::money::{CurrencyCode, MoneyAmount},
    super::product::DomainProduct,
    serde::{Deserialize, Serialize},
    std::num::NonZeroU32,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: DomainProduct,
    pub quantity: NonZeroU32,
}

/// Ordered cart lines; may be empty.
pub type Cart = Vec<CartLine>;

/// Payload of `doPayment` and `getPaymentLink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub products: Cart,
    pub user: DomainCustomer,
    /// Caller-chosen attempt id. Retries carrying the same id replay the
    /// original provider calls instead of charging twice.
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
}

/// One included cart line, resolved to provider ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeLine {
    pub provider_product_id: String,
    pub provider_price_id: String,
    pub unit_amount: MoneyAmount,
    pub quantity: NonZeroU32,
}

/// Single charge built from a cart. Lives for one orchestration call only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeSpec {
    pub total: MoneyAmount,
    pub currency: CurrencyCode,
    pub lines: Vec<ChargeLine>,
    pub customer_id: String,
}

impl ChargeSpec {
    pub fn line_price_ids(&self) -> Vec<&str> {
        self.lines
            .iter()
            .map(|l| l.provider_price_id.as_str())
            .collect()
    }

    /// Comma-joined provider product ids, for audit metadata.
    pub fn joined_product_ids(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.provider_product_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationOutcome {
    Charge(ChargeSpec),
    Empty,
}

use {
    super::error::BillingError,
    super::metadata::{self, Metadata},
    super::money::{CurrencyCode, Money, MoneyAmount},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
};

/// Product row as owned by the catalogue service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Major units, e.g. `5.00`. Accepts JSON numbers or decimal strings.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_active() -> bool {
    true
}

impl DomainProduct {
    /// Natural key used to find the provider mirror.
    pub fn natural_key(&self) -> Result<&str, BillingError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(BillingError::ValidationFailed(format!(
                "product {} has an empty name",
                self.id
            )));
        }
        Ok(name)
    }

    /// The price this product should carry at the provider, if it declares
    /// one. A price without a currency falls back to `default_currency`.
    pub fn declared_price(
        &self,
        default_currency: &CurrencyCode,
    ) -> Result<Option<Money>, BillingError> {
        let Some(price) = self.price else {
            return Ok(None);
        };
        let currency = match self.currency.as_deref() {
            Some(code) if !code.trim().is_empty() => CurrencyCode::new(code)?,
            _ => default_currency.clone(),
        };
        Ok(Some(Money::new(MoneyAmount::from_major(price)?, currency)))
    }

    pub fn provider_metadata(&self) -> Metadata {
        Metadata::from([
            (metadata::PRODUCT_LOCAL_ID.to_string(), self.id.to_string()),
            (metadata::SOURCE.to_string(), metadata::SOURCE_VALUE.to_string()),
        ])
    }
}

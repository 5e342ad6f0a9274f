use {
    crate::{domain::error::BillingError, domain::money::CurrencyCode, services::dispatch::BillingSettings},
    std::{env, time::Duration},
};

const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/payment/success";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Startup configuration. Everything is validated here so a bad value stops
/// the process before it serves anything.
#[derive(Debug, Clone)]
pub struct Config {
    pub stripe_secret_key: String,
    pub database_url: String,
    pub success_url: String,
    pub default_currency: CurrencyCode,
    pub provider_timeout: Duration,
    pub bind_addr: String,
    pub test_payment_method: String,
    pub test_card_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self, BillingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BillingError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| BillingError::Config(format!("{key} must be set")));

        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        if !(stripe_secret_key.starts_with("sk_") || stripe_secret_key.starts_with("rk_")) {
            return Err(BillingError::Config(
                "STRIPE_SECRET_KEY must be a secret (sk_) or restricted (rk_) key".to_string(),
            ));
        }

        let default_currency = CurrencyCode::new(&var("DEFAULT_CURRENCY").unwrap_or_else(|| "usd".to_string()))
            .map_err(|e| BillingError::Config(format!("DEFAULT_CURRENCY: {e}")))?;

        let provider_timeout = match var("PROVIDER_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    BillingError::Config(format!("PROVIDER_TIMEOUT_SECS must be a positive integer, got {raw}"))
                })?,
            None => Duration::from_secs(10),
        };

        Ok(Self {
            stripe_secret_key,
            database_url: required("DATABASE_URL")?,
            success_url: var("STRIPE_SUCCESS_REDIRECT_URL").unwrap_or_else(|| DEFAULT_SUCCESS_URL.to_string()),
            default_currency,
            provider_timeout,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            test_payment_method: var("TEST_PAYMENT_METHOD").unwrap_or_else(|| "pm_card_visa".to_string()),
            test_card_token: var("TEST_CARD_TOKEN").unwrap_or_else(|| "tok_visa".to_string()),
        })
    }

    pub fn billing_settings(&self) -> BillingSettings {
        BillingSettings {
            success_url: self.success_url.clone(),
            default_currency: self.default_currency.clone(),
            test_payment_method: self.test_payment_method.clone(),
            test_card_token: self.test_card_token.clone(),
        }
    }
}

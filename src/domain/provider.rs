use {
    super::error::ProviderError,
    super::id::IdempotencyKey,
    super::metadata::{self, Metadata},
    super::money::{CurrencyCode, Money, MoneyAmount},
    serde::Serialize,
    std::{future::Future, num::NonZeroU32, pin::Pin},
};

pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Exact-match search on a natural key. The adapter renders it into the
/// provider's query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchClause {
    Name(String),
    Email(String),
    Metadata { key: &'static str, value: String },
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

pub trait ProviderRecord {
    fn provider_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub default_price_id: Option<String>,
    pub metadata: Metadata,
}

impl ProviderProduct {
    pub fn local_id(&self) -> Option<i64> {
        metadata::local_id(&self.metadata, metadata::PRODUCT_LOCAL_ID)
    }
}

impl ProviderRecord for ProviderProduct {
    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPrice {
    pub id: String,
    pub product_id: String,
    pub unit_amount: MoneyAmount,
    pub currency: CurrencyCode,
    pub active: bool,
}

impl ProviderPrice {
    pub fn matches(&self, money: &Money) -> bool {
        self.unit_amount == money.amount() && &self.currency == money.currency()
    }
}

impl ProviderRecord for ProviderPrice {
    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCustomer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub metadata: Metadata,
}

impl ProviderCustomer {
    pub fn local_id(&self) -> Option<i64> {
        metadata::local_id(&self.metadata, metadata::CUSTOMER_LOCAL_ID)
    }
}

impl ProviderRecord for ProviderCustomer {
    fn provider_id(&self) -> &str {
        &self.id
    }
}

/// Payment-intent lifecycle, independent of the provider's own enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: MoneyAmount,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPaymentLink {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceEntry {
    /// Signed: pending balances can go negative.
    pub amount: i64,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderBalance {
    pub available: Vec<BalanceEntry>,
}

// ── Request shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProviderProduct {
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub metadata: Metadata,
    /// Created together with the product and set as its default.
    pub default_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProviderPrice {
    pub product_id: String,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerFields {
    pub email: String,
    pub name: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub amount: MoneyAmount,
    pub currency: CurrencyCode,
    pub customer_id: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmWith {
    PaymentMethod {
        id: String,
        return_url: Option<String>,
    },
    CardToken(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLinkLine {
    pub price_id: String,
    pub quantity: NonZeroU32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentLink {
    pub lines: Vec<PaymentLinkLine>,
    pub redirect_url: String,
    pub metadata: Metadata,
}

/// Billing provider capability. Every call is one remote operation that may
/// fail; implementations bound each call with a timeout and report it as
/// [`ProviderErrorKind::Unavailable`](super::error::ProviderErrorKind).
pub trait BillingProvider: Send + Sync {
    fn search_products<'a>(
        &'a self,
        clause: &'a SearchClause,
    ) -> ProviderFuture<'a, Option<ProviderProduct>>;

    fn list_products<'a>(
        &'a self,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<ProviderProduct>>;

    fn create_product<'a>(
        &'a self,
        product: &'a NewProviderProduct,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderProduct>;

    fn retrieve_product<'a>(&'a self, product_id: &'a str) -> ProviderFuture<'a, ProviderProduct>;

    fn set_product_active<'a>(
        &'a self,
        product_id: &'a str,
        active: bool,
    ) -> ProviderFuture<'a, ProviderProduct>;

    fn set_default_price<'a>(
        &'a self,
        product_id: &'a str,
        price_id: &'a str,
    ) -> ProviderFuture<'a, ProviderProduct>;

    fn retrieve_price<'a>(&'a self, price_id: &'a str) -> ProviderFuture<'a, ProviderPrice>;

    fn list_active_prices<'a>(
        &'a self,
        product_id: &'a str,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<ProviderPrice>>;

    fn create_price<'a>(
        &'a self,
        price: &'a NewProviderPrice,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderPrice>;

    fn archive_price<'a>(&'a self, price_id: &'a str) -> ProviderFuture<'a, ProviderPrice>;

    fn search_customers<'a>(
        &'a self,
        clause: &'a SearchClause,
    ) -> ProviderFuture<'a, Option<ProviderCustomer>>;

    fn list_customers<'a>(
        &'a self,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<ProviderCustomer>>;

    fn create_customer<'a>(
        &'a self,
        customer: &'a CustomerFields,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderCustomer>;

    /// `None` when the customer has been deleted.
    fn retrieve_customer<'a>(
        &'a self,
        customer_id: &'a str,
    ) -> ProviderFuture<'a, Option<ProviderCustomer>>;

    fn update_customer<'a>(
        &'a self,
        customer_id: &'a str,
        customer: &'a CustomerFields,
    ) -> ProviderFuture<'a, ProviderCustomer>;

    fn delete_customer<'a>(&'a self, customer_id: &'a str) -> ProviderFuture<'a, ()>;

    fn create_payment_intent<'a>(
        &'a self,
        intent: &'a NewPaymentIntent,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderPaymentIntent>;

    fn confirm_payment_intent<'a>(
        &'a self,
        intent_id: &'a str,
        with: &'a ConfirmWith,
    ) -> ProviderFuture<'a, ProviderPaymentIntent>;

    fn capture_payment_intent<'a>(
        &'a self,
        intent_id: &'a str,
    ) -> ProviderFuture<'a, ProviderPaymentIntent>;

    fn create_payment_link<'a>(
        &'a self,
        link: &'a NewPaymentLink,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderPaymentLink>;

    fn retrieve_balance(&self) -> ProviderFuture<'_, ProviderBalance>;
}

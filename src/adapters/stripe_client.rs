use {
    crate::domain::{
        error::{BillingError, ProviderError, ProviderErrorKind},
        id::IdempotencyKey,
        metadata::Metadata,
        money::{CurrencyCode, MoneyAmount},
        provider::{
            BalanceEntry, BillingProvider, ConfirmWith, CustomerFields, IntentStatus,
            NewPaymentIntent, NewPaymentLink, NewProviderPrice, NewProviderProduct, Page,
            ProviderBalance, ProviderCustomer, ProviderFuture, ProviderPaymentIntent,
            ProviderPaymentLink, ProviderPrice, ProviderProduct, SearchClause,
        },
    },
    serde::Serialize,
    std::{fmt::Display, future::Future, str::FromStr, time::Duration},
};

const LIST_PAGE_SIZE: u64 = 100;

/// Stripe-backed [`BillingProvider`] on top of `async-stripe`'s typed
/// resources. Confirmation is the one raw form post: the typed confirm
/// params cannot carry a payment method.
pub struct StripeProvider {
    client: stripe::Client,
    timeout: Duration,
}

impl StripeProvider {
    pub fn new(secret_key: &str, timeout: Duration) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
            timeout,
        }
    }

    fn idempotent(&self, key: &IdempotencyKey) -> stripe::Client {
        self.client
            .clone()
            .with_strategy(stripe::RequestStrategy::Idempotent(key.as_str().to_string()))
    }

    /// Bounds one remote call. Timeouts surface as `Unavailable`.
    async fn call<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, stripe::StripeError>>,
    ) -> Result<T, ProviderError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_stripe_error(e, operation)),
            Err(_) => Err(ProviderError::unavailable(
                operation,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

// ── Error mapping ──────────────────────────────────────────────────────────

/// Classifies by HTTP status and client error variant only.
pub fn map_stripe_error(error: stripe::StripeError, operation: &'static str) -> ProviderError {
    match error {
        stripe::StripeError::Stripe(request_error) => {
            let message = request_error
                .message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            ProviderError::new(kind_for_status(request_error.http_status), operation, message)
        }
        stripe::StripeError::Timeout => ProviderError::unavailable(operation, "request timed out"),
        stripe::StripeError::ClientError(msg) => {
            ProviderError::unavailable(operation, format!("http client error: {msg}"))
        }
        other => ProviderError::validation(operation, other.to_string()),
    }
}

pub fn kind_for_status(status: u16) -> ProviderErrorKind {
    match status {
        404 => ProviderErrorKind::ResourceMissing,
        409 | 429 => ProviderErrorKind::Unavailable,
        s if (500..600).contains(&s) => ProviderErrorKind::Unavailable,
        _ => ProviderErrorKind::Validation,
    }
}

/// Renders a search clause into Stripe's search query language.
pub fn render_query(clause: &SearchClause) -> String {
    match clause {
        SearchClause::Name(name) => format!("name:\"{}\"", escape_query_value(name)),
        SearchClause::Email(email) => format!("email:\"{}\"", escape_query_value(email)),
        SearchClause::Metadata { key, value } => {
            format!("metadata[\"{key}\"]:\"{}\"", escape_query_value(value))
        }
    }
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Conversion helpers ─────────────────────────────────────────────────────

fn parse_id<T>(operation: &'static str, raw: &str) -> Result<T, ProviderError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|e| ProviderError::validation(operation, format!("invalid id {raw}: {e}")))
}

fn to_stripe_currency(
    operation: &'static str,
    currency: &CurrencyCode,
) -> Result<stripe::Currency, ProviderError> {
    currency
        .as_str()
        .parse::<stripe::Currency>()
        .map_err(|e| ProviderError::validation(operation, format!("{currency}: {e}")))
}

pub fn convert_currency(
    operation: &'static str,
    currency: stripe::Currency,
) -> Result<CurrencyCode, ProviderError> {
    CurrencyCode::new(&currency.to_string())
        .map_err(|e| ProviderError::validation(operation, e.to_string()))
}

pub fn convert_pi_status(status: stripe::PaymentIntentStatus) -> IntentStatus {
    match status {
        stripe::PaymentIntentStatus::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
        stripe::PaymentIntentStatus::RequiresConfirmation => IntentStatus::RequiresConfirmation,
        stripe::PaymentIntentStatus::RequiresAction => IntentStatus::RequiresAction,
        stripe::PaymentIntentStatus::Processing => IntentStatus::Processing,
        stripe::PaymentIntentStatus::RequiresCapture => IntentStatus::RequiresCapture,
        stripe::PaymentIntentStatus::Canceled => IntentStatus::Canceled,
        stripe::PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
    }
}

fn to_stripe_metadata(metadata: &Metadata) -> Option<stripe::Metadata> {
    Some(metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn from_stripe_metadata(metadata: Option<stripe::Metadata>) -> Metadata {
    metadata.unwrap_or_default().into_iter().collect()
}

fn convert_product(product: stripe::Product) -> ProviderProduct {
    ProviderProduct {
        id: product.id.to_string(),
        name: product.name.unwrap_or_default(),
        description: product.description,
        active: product.active.unwrap_or_default(),
        default_price_id: product.default_price.map(|price| price.id().to_string()),
        metadata: from_stripe_metadata(product.metadata),
    }
}

fn convert_price(price: stripe::Price) -> Result<ProviderPrice, ProviderError> {
    const OP: &str = "decode_price";
    let invalid = |e: BillingError| ProviderError::validation(OP, format!("{}: {e}", price.id));
    // tiered and customer-chosen prices carry no unit amount
    let unit_amount = price
        .unit_amount
        .ok_or_else(|| ProviderError::validation(OP, format!("{} has no unit amount", price.id)))?;
    let currency = price
        .currency
        .ok_or_else(|| ProviderError::validation(OP, format!("{} has no currency", price.id)))?;
    let product_id = price
        .product
        .as_ref()
        .map(|product| product.id().to_string())
        .ok_or_else(|| ProviderError::validation(OP, format!("{} has no product", price.id)))?;
    Ok(ProviderPrice {
        unit_amount: MoneyAmount::new(unit_amount).map_err(invalid)?,
        currency: convert_currency(OP, currency)?,
        product_id,
        active: price.active.unwrap_or_default(),
        id: price.id.to_string(),
    })
}

fn convert_customer(customer: stripe::Customer) -> ProviderCustomer {
    ProviderCustomer {
        id: customer.id.to_string(),
        email: customer.email,
        name: customer.name,
        metadata: from_stripe_metadata(customer.metadata),
    }
}

fn convert_payment_intent(
    pi: stripe::PaymentIntent,
) -> Result<ProviderPaymentIntent, ProviderError> {
    const OP: &str = "decode_payment_intent";
    Ok(ProviderPaymentIntent {
        amount: MoneyAmount::new(pi.amount)
            .map_err(|e| ProviderError::validation(OP, format!("{}: {e}", pi.id)))?,
        currency: convert_currency(OP, pi.currency)?,
        status: convert_pi_status(pi.status),
        id: pi.id.to_string(),
    })
}

fn product_page(list: stripe::List<stripe::Product>) -> Page<ProviderProduct> {
    Page {
        data: list.data.into_iter().map(convert_product).collect(),
        has_more: list.has_more,
    }
}

fn customer_page(list: stripe::List<stripe::Customer>) -> Page<ProviderCustomer> {
    Page {
        data: list.data.into_iter().map(convert_customer).collect(),
        has_more: list.has_more,
    }
}

// ── Confirmation form ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct CardToken<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct PaymentMethodData<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    card: CardToken<'a>,
}

#[derive(Serialize, Default)]
struct ConfirmForm<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_method_data: Option<PaymentMethodData<'a>>,
}

impl<'a> From<&'a ConfirmWith> for ConfirmForm<'a> {
    fn from(with: &'a ConfirmWith) -> Self {
        match with {
            ConfirmWith::PaymentMethod { id, return_url } => Self {
                payment_method: Some(id.as_str()),
                return_url: return_url.as_deref(),
                ..Self::default()
            },
            ConfirmWith::CardToken(token) => Self {
                payment_method_data: Some(PaymentMethodData {
                    kind: "card",
                    card: CardToken {
                        token: token.as_str(),
                    },
                }),
                ..Self::default()
            },
        }
    }
}

// ── Capability ─────────────────────────────────────────────────────────────

impl BillingProvider for StripeProvider {
    fn search_products<'a>(
        &'a self,
        clause: &'a SearchClause,
    ) -> ProviderFuture<'a, Option<ProviderProduct>> {
        Box::pin(async move {
            let params = stripe::ProductSearchParams {
                query: render_query(clause),
                limit: Some(1),
                ..stripe::ProductSearchParams::new()
            };
            let found = self
                .call("search_products", stripe::Product::search(&self.client, params))
                .await?;
            Ok(found.data.into_iter().next().map(convert_product))
        })
    }

    fn list_products<'a>(
        &'a self,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<ProviderProduct>> {
        Box::pin(async move {
            let params = stripe::ListProducts {
                limit: Some(LIST_PAGE_SIZE),
                starting_after: starting_after
                    .map(|id| parse_id("list_products", id))
                    .transpose()?,
                ..stripe::ListProducts::new()
            };
            let page = self
                .call("list_products", stripe::Product::list(&self.client, &params))
                .await?;
            Ok(product_page(page))
        })
    }

    fn create_product<'a>(
        &'a self,
        product: &'a NewProviderProduct,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderProduct> {
        Box::pin(async move {
            let default_price_data = product
                .default_price
                .as_ref()
                .map(|money| {
                    Ok::<_, ProviderError>(stripe::CreateProductDefaultPriceData {
                        currency: to_stripe_currency("create_product", money.currency())?,
                        unit_amount: Some(money.amount().cents()),
                        ..Default::default()
                    })
                })
                .transpose()?;
            let params = stripe::CreateProduct {
                active: Some(product.active),
                description: product.description.as_deref(),
                metadata: to_stripe_metadata(&product.metadata),
                default_price_data,
                ..stripe::CreateProduct::new(&product.name)
            };
            let client = self.idempotent(key);
            let created = self
                .call("create_product", stripe::Product::create(&client, params))
                .await?;
            Ok(convert_product(created))
        })
    }

    fn retrieve_product<'a>(&'a self, product_id: &'a str) -> ProviderFuture<'a, ProviderProduct> {
        Box::pin(async move {
            let id: stripe::ProductId = parse_id("retrieve_product", product_id)?;
            let product = self
                .call("retrieve_product", stripe::Product::retrieve(&self.client, &id, &[]))
                .await?;
            Ok(convert_product(product))
        })
    }

    fn set_product_active<'a>(
        &'a self,
        product_id: &'a str,
        active: bool,
    ) -> ProviderFuture<'a, ProviderProduct> {
        Box::pin(async move {
            let id: stripe::ProductId = parse_id("set_product_active", product_id)?;
            let params = stripe::UpdateProduct {
                active: Some(active),
                ..stripe::UpdateProduct::new()
            };
            let updated = self
                .call("set_product_active", stripe::Product::update(&self.client, &id, params))
                .await?;
            Ok(convert_product(updated))
        })
    }

    fn set_default_price<'a>(
        &'a self,
        product_id: &'a str,
        price_id: &'a str,
    ) -> ProviderFuture<'a, ProviderProduct> {
        Box::pin(async move {
            let id: stripe::ProductId = parse_id("set_default_price", product_id)?;
            let params = stripe::UpdateProduct {
                default_price: Some(price_id),
                ..stripe::UpdateProduct::new()
            };
            let updated = self
                .call("set_default_price", stripe::Product::update(&self.client, &id, params))
                .await?;
            Ok(convert_product(updated))
        })
    }

    fn retrieve_price<'a>(&'a self, price_id: &'a str) -> ProviderFuture<'a, ProviderPrice> {
        Box::pin(async move {
            let id: stripe::PriceId = parse_id("retrieve_price", price_id)?;
            let price = self
                .call("retrieve_price", stripe::Price::retrieve(&self.client, &id, &[]))
                .await?;
            convert_price(price)
        })
    }

    fn list_active_prices<'a>(
        &'a self,
        product_id: &'a str,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<ProviderPrice>> {
        Box::pin(async move {
            let params = stripe::ListPrices {
                product: Some(stripe::IdOrCreate::Id(product_id)),
                active: Some(true),
                limit: Some(LIST_PAGE_SIZE),
                starting_after: starting_after
                    .map(|id| parse_id("list_active_prices", id))
                    .transpose()?,
                ..stripe::ListPrices::new()
            };
            let page = self
                .call("list_active_prices", stripe::Price::list(&self.client, &params))
                .await?;
            // prices without a unit amount can never be a default here
            let data = page
                .data
                .into_iter()
                .filter_map(|p| match convert_price(p) {
                    Ok(price) => Some(price),
                    Err(e) => {
                        tracing::warn!(product_id, error = %e, "skipping undecodable price");
                        None
                    }
                })
                .collect();
            Ok(Page {
                data,
                has_more: page.has_more,
            })
        })
    }

    fn create_price<'a>(
        &'a self,
        price: &'a NewProviderPrice,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderPrice> {
        Box::pin(async move {
            let currency = to_stripe_currency("create_price", price.price.currency())?;
            let params = stripe::CreatePrice {
                product: Some(stripe::IdOrCreate::Id(price.product_id.as_str())),
                unit_amount: Some(price.price.amount().cents()),
                ..stripe::CreatePrice::new(currency)
            };
            let client = self.idempotent(key);
            let created = self
                .call("create_price", stripe::Price::create(&client, params))
                .await?;
            convert_price(created)
        })
    }

    fn archive_price<'a>(&'a self, price_id: &'a str) -> ProviderFuture<'a, ProviderPrice> {
        Box::pin(async move {
            let id: stripe::PriceId = parse_id("archive_price", price_id)?;
            let params = stripe::UpdatePrice {
                active: Some(false),
                ..stripe::UpdatePrice::new()
            };
            let archived = self
                .call("archive_price", stripe::Price::update(&self.client, &id, params))
                .await?;
            convert_price(archived)
        })
    }

    fn search_customers<'a>(
        &'a self,
        clause: &'a SearchClause,
    ) -> ProviderFuture<'a, Option<ProviderCustomer>> {
        Box::pin(async move {
            let params = stripe::CustomerSearchParams {
                query: render_query(clause),
                limit: Some(1),
                ..stripe::CustomerSearchParams::new()
            };
            let found = self
                .call("search_customers", stripe::Customer::search(&self.client, params))
                .await?;
            Ok(found.data.into_iter().next().map(convert_customer))
        })
    }

    fn list_customers<'a>(
        &'a self,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<ProviderCustomer>> {
        Box::pin(async move {
            let params = stripe::ListCustomers {
                limit: Some(LIST_PAGE_SIZE),
                starting_after: starting_after
                    .map(|id| parse_id("list_customers", id))
                    .transpose()?,
                ..stripe::ListCustomers::new()
            };
            let page = self
                .call("list_customers", stripe::Customer::list(&self.client, &params))
                .await?;
            Ok(customer_page(page))
        })
    }

    fn create_customer<'a>(
        &'a self,
        customer: &'a CustomerFields,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderCustomer> {
        Box::pin(async move {
            let params = stripe::CreateCustomer {
                email: Some(customer.email.as_str()),
                name: Some(customer.name.as_str()),
                metadata: to_stripe_metadata(&customer.metadata),
                ..stripe::CreateCustomer::new()
            };
            let client = self.idempotent(key);
            let created = self
                .call("create_customer", stripe::Customer::create(&client, params))
                .await?;
            Ok(convert_customer(created))
        })
    }

    fn retrieve_customer<'a>(
        &'a self,
        customer_id: &'a str,
    ) -> ProviderFuture<'a, Option<ProviderCustomer>> {
        Box::pin(async move {
            let id: stripe::CustomerId = parse_id("retrieve_customer", customer_id)?;
            let customer = self
                .call("retrieve_customer", stripe::Customer::retrieve(&self.client, &id, &[]))
                .await?;
            // deleted customers still retrieve, flagged
            Ok((!customer.deleted).then(|| convert_customer(customer)))
        })
    }

    fn update_customer<'a>(
        &'a self,
        customer_id: &'a str,
        customer: &'a CustomerFields,
    ) -> ProviderFuture<'a, ProviderCustomer> {
        Box::pin(async move {
            let id: stripe::CustomerId = parse_id("update_customer", customer_id)?;
            let params = stripe::UpdateCustomer {
                email: Some(customer.email.as_str()),
                name: Some(customer.name.as_str()),
                metadata: to_stripe_metadata(&customer.metadata),
                ..stripe::UpdateCustomer::new()
            };
            let updated = self
                .call("update_customer", stripe::Customer::update(&self.client, &id, params))
                .await?;
            Ok(convert_customer(updated))
        })
    }

    fn delete_customer<'a>(&'a self, customer_id: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let id: stripe::CustomerId = parse_id("delete_customer", customer_id)?;
            let deleted = self
                .call("delete_customer", stripe::Customer::delete(&self.client, &id))
                .await?;
            if !deleted.deleted {
                return Err(ProviderError::validation(
                    "delete_customer",
                    format!("{customer_id} was not deleted"),
                ));
            }
            Ok(())
        })
    }

    fn create_payment_intent<'a>(
        &'a self,
        intent: &'a NewPaymentIntent,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderPaymentIntent> {
        Box::pin(async move {
            const OP: &str = "create_payment_intent";
            let params = stripe::CreatePaymentIntent {
                customer: Some(parse_id(OP, &intent.customer_id)?),
                capture_method: Some(stripe::PaymentIntentCaptureMethod::Manual),
                payment_method_types: Some(vec!["card".to_string()]),
                metadata: to_stripe_metadata(&intent.metadata),
                ..stripe::CreatePaymentIntent::new(
                    intent.amount.cents(),
                    to_stripe_currency(OP, &intent.currency)?,
                )
            };
            let client = self.idempotent(key);
            let created = self
                .call(OP, stripe::PaymentIntent::create(&client, params))
                .await?;
            convert_payment_intent(created)
        })
    }

    fn confirm_payment_intent<'a>(
        &'a self,
        intent_id: &'a str,
        with: &'a ConfirmWith,
    ) -> ProviderFuture<'a, ProviderPaymentIntent> {
        Box::pin(async move {
            let path = format!("/payment_intents/{intent_id}/confirm");
            let confirmed: stripe::PaymentIntent = self
                .call(
                    "confirm_payment_intent",
                    self.client.post_form(&path, ConfirmForm::from(with)),
                )
                .await?;
            convert_payment_intent(confirmed)
        })
    }

    fn capture_payment_intent<'a>(
        &'a self,
        intent_id: &'a str,
    ) -> ProviderFuture<'a, ProviderPaymentIntent> {
        Box::pin(async move {
            let captured = self
                .call(
                    "capture_payment_intent",
                    stripe::PaymentIntent::capture(
                        &self.client,
                        intent_id,
                        stripe::CapturePaymentIntent::default(),
                    ),
                )
                .await?;
            convert_payment_intent(captured)
        })
    }

    fn create_payment_link<'a>(
        &'a self,
        link: &'a NewPaymentLink,
        key: &'a IdempotencyKey,
    ) -> ProviderFuture<'a, ProviderPaymentLink> {
        Box::pin(async move {
            let line_items = link
                .lines
                .iter()
                .map(|line| stripe::CreatePaymentLinkLineItems {
                    price: line.price_id.clone(),
                    quantity: u64::from(line.quantity.get()),
                    ..Default::default()
                })
                .collect();
            let params = stripe::CreatePaymentLink {
                after_completion: Some(stripe::CreatePaymentLinkAfterCompletion {
                    type_: stripe::CreatePaymentLinkAfterCompletionType::Redirect,
                    redirect: Some(stripe::CreatePaymentLinkAfterCompletionRedirect {
                        url: link.redirect_url.clone(),
                    }),
                    ..Default::default()
                }),
                metadata: to_stripe_metadata(&link.metadata),
                ..stripe::CreatePaymentLink::new(line_items)
            };
            let client = self.idempotent(key);
            let created = self
                .call("create_payment_link", stripe::PaymentLink::create(&client, params))
                .await?;
            Ok(ProviderPaymentLink {
                id: created.id.to_string(),
                url: created.url,
            })
        })
    }

    fn retrieve_balance(&self) -> ProviderFuture<'_, ProviderBalance> {
        Box::pin(async move {
            let balance = self
                .call("retrieve_balance", stripe::Balance::retrieve(&self.client, None))
                .await?;
            let available = balance
                .available
                .into_iter()
                .map(|entry| {
                    Ok::<_, ProviderError>(BalanceEntry {
                        amount: entry.amount,
                        currency: convert_currency("retrieve_balance", entry.currency)?,
                    })
                })
                .collect::<Result<_, ProviderError>>()?;
            Ok(ProviderBalance { available })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_values_are_quoted_and_escaped() {
        assert_eq!(
            render_query(&SearchClause::Name(r#"Widget "Pro" \ 2"#.to_string())),
            r#"name:"Widget \"Pro\" \\ 2""#
        );
        assert_eq!(
            render_query(&SearchClause::Metadata {
                key: "user_id",
                value: "42".to_string(),
            }),
            r#"metadata["user_id"]:"42""#
        );
    }

    #[test]
    fn status_classification() {
        assert_eq!(kind_for_status(404), ProviderErrorKind::ResourceMissing);
        assert_eq!(kind_for_status(429), ProviderErrorKind::Unavailable);
        assert_eq!(kind_for_status(503), ProviderErrorKind::Unavailable);
        assert_eq!(kind_for_status(400), ProviderErrorKind::Validation);
        assert_eq!(kind_for_status(402), ProviderErrorKind::Validation);
    }

    #[test]
    fn currencies_convert_both_ways() {
        let eur = CurrencyCode::new("EUR").unwrap();
        assert_eq!(to_stripe_currency("test", &eur).unwrap(), stripe::Currency::EUR);
        assert_eq!(convert_currency("test", stripe::Currency::USD).unwrap().as_str(), "usd");
        let unknown = CurrencyCode::new("zzz").unwrap();
        let err = to_stripe_currency("test", &unknown).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Validation);
    }

    #[test]
    fn expanded_and_bare_product_refs_decode() {
        let bare: stripe::Price = serde_json::from_value(serde_json::json!({
            "id": "price_1", "active": true, "currency": "usd",
            "unit_amount": 500, "product": "prod_1"
        }))
        .unwrap();
        let expanded: stripe::Price = serde_json::from_value(serde_json::json!({
            "id": "price_2", "active": false, "currency": "eur",
            "unit_amount": 700, "product": { "id": "prod_2", "object": "product" }
        }))
        .unwrap();

        let bare = convert_price(bare).unwrap();
        assert_eq!(bare.product_id, "prod_1");
        assert_eq!(bare.unit_amount.cents(), 500);
        let expanded = convert_price(expanded).unwrap();
        assert_eq!(expanded.product_id, "prod_2");
        assert!(!expanded.active);
    }

    #[test]
    fn tiered_prices_are_rejected() {
        let tiered: stripe::Price = serde_json::from_value(serde_json::json!({
            "id": "price_3", "active": true, "currency": "usd", "product": "prod_1"
        }))
        .unwrap();
        assert_eq!(convert_price(tiered).unwrap_err().kind, ProviderErrorKind::Validation);
    }

    #[test]
    fn card_token_confirms_with_payment_method_data() {
        let token = ConfirmWith::CardToken("tok_visa".to_string());
        let form = serde_json::to_value(ConfirmForm::from(&token)).unwrap();
        assert_eq!(
            form,
            serde_json::json!({ "payment_method_data": { "type": "card", "card": { "token": "tok_visa" } } })
        );
    }
}

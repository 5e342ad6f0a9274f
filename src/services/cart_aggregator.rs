use {
    super::entity_resolver::EntityResolver,
    crate::domain::{
        cart::{AggregationOutcome, CartLine, ChargeLine, ChargeSpec},
        error::BillingError,
        money::{CurrencyCode, MoneyAmount},
    },
};

/// Why a cart line was left out of the charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SkipReason {
    #[display("product not found at provider")]
    UnknownProduct,
    #[display("product has no active price")]
    NoActivePrice,
    #[display("currency differs from the cart currency")]
    CurrencyMismatch,
    #[display("invalid product")]
    InvalidProduct,
    #[display("product is inactive")]
    InactiveProduct,
}

/// Turns cart lines into one charge. Lines that cannot be priced are skipped
/// rather than failing the checkout; only lines in the first priced line's
/// currency are kept.
#[derive(Clone)]
pub struct CartAggregator {
    resolver: EntityResolver,
}

impl CartAggregator {
    pub fn new(resolver: EntityResolver) -> Self {
        Self { resolver }
    }

    #[tracing::instrument(name = "aggregate_cart", skip_all, fields(lines = cart.len()))]
    pub async fn aggregate(
        &self,
        cart: &[CartLine],
        customer_id: &str,
    ) -> Result<AggregationOutcome, BillingError> {
        let mut currency: Option<CurrencyCode> = None;
        let mut total = MoneyAmount::ZERO;
        let mut lines = Vec::new();

        for (index, line) in cart.iter().enumerate() {
            let priced = match self.price_line(line).await? {
                Ok(priced) => priced,
                Err(reason) => {
                    tracing::warn!(index, local_id = line.product.id, %reason, "skipping cart line");
                    continue;
                }
            };

            match &currency {
                None => currency = Some(priced.1.clone()),
                Some(c) if *c != priced.1 => {
                    tracing::warn!(
                        index,
                        local_id = line.product.id,
                        reason = %SkipReason::CurrencyMismatch,
                        cart_currency = %c,
                        line_currency = %priced.1,
                        "skipping cart line"
                    );
                    continue;
                }
                Some(_) => {}
            }

            let (charge_line, _) = priced;
            total = charge_line
                .unit_amount
                .checked_mul(line.quantity.get())
                .and_then(|subtotal| total.checked_add(subtotal))
                .ok_or_else(|| {
                    BillingError::ValidationFailed("cart total overflows i64".to_string())
                })?;
            lines.push(charge_line);
        }

        let Some(currency) = currency else {
            return Ok(AggregationOutcome::Empty);
        };
        if lines.is_empty() {
            return Ok(AggregationOutcome::Empty);
        }

        Ok(AggregationOutcome::Charge(ChargeSpec {
            total,
            currency,
            lines,
            customer_id: customer_id.to_string(),
        }))
    }

    /// Outer error: provider failures that must abort the checkout.
    /// Inner error: the line is skipped.
    async fn price_line(
        &self,
        line: &CartLine,
    ) -> Result<Result<(ChargeLine, CurrencyCode), SkipReason>, BillingError> {
        let product = match self.resolver.find_product(&line.product).await {
            Ok(Some(product)) => product,
            Ok(None) => return Ok(Err(SkipReason::UnknownProduct)),
            Err(BillingError::ValidationFailed(_)) => return Ok(Err(SkipReason::InvalidProduct)),
            Err(BillingError::ResourceMissing(_)) => return Ok(Err(SkipReason::UnknownProduct)),
            Err(e) => return Err(e),
        };
        // removal deactivates the product but leaves its default price active
        if !product.active {
            return Ok(Err(SkipReason::InactiveProduct));
        }

        let price = match self.resolver.prices().current_default(&product).await {
            Ok(Some(price)) => price,
            Ok(None) | Err(BillingError::ResourceMissing(_)) => {
                return Ok(Err(SkipReason::NoActivePrice));
            }
            Err(e) => return Err(e),
        };

        let currency = price.currency.clone();
        Ok(Ok((
            ChargeLine {
                provider_product_id: product.id,
                provider_price_id: price.id,
                unit_amount: price.unit_amount,
                quantity: line.quantity,
            },
            currency,
        )))
    }
}

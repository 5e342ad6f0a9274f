use {
    crate::domain::{
        error::{BillingError, ProviderErrorKind},
        id::IdempotencyKey,
        money::{CurrencyCode, Money, MoneyAmount},
        provider::{BillingProvider, NewProviderPrice, ProviderPrice, ProviderProduct},
    },
    std::sync::Arc,
};

/// Owns default-price transitions. A transition always runs
/// create-new → repoint-default → archive-old, so the product passes through
/// a brief overlap of two active prices and never through a gap of zero.
#[derive(Clone)]
pub struct PriceReconciler {
    provider: Arc<dyn BillingProvider>,
}

impl PriceReconciler {
    pub fn new(provider: Arc<dyn BillingProvider>) -> Self {
        Self { provider }
    }

    /// Makes `amount`/`currency` the single active default price of the product.
    pub async fn reconcile_price(
        &self,
        product_id: &str,
        amount: MoneyAmount,
        currency: &CurrencyCode,
    ) -> Result<ProviderPrice, BillingError> {
        let product = self.provider.retrieve_product(product_id).await?;
        self.reconcile(&product, &Money::new(amount, currency.clone()))
            .await
    }

    #[tracing::instrument(
        name = "reconcile_price",
        skip_all,
        fields(product_id = %product.id, amount = %target.amount(), currency = %target.currency())
    )]
    pub async fn reconcile(
        &self,
        product: &ProviderProduct,
        target: &Money,
    ) -> Result<ProviderPrice, BillingError> {
        let current = self.current_default(product).await?;

        if let Some(current) = current.as_ref().filter(|p| p.matches(target)) {
            if product.default_price_id.as_deref() == Some(current.id.as_str()) {
                return Ok(current.clone());
            }
            // Matching price exists but is not the declared default yet.
            self.provider
                .set_default_price(&product.id, &current.id)
                .await?;
            self.archive_active_except(&product.id, Some(&current.id))
                .await;
            return Ok(current.clone());
        }

        let replaced = current.as_ref().map(|p| p.id.as_str()).unwrap_or("none");
        let key = IdempotencyKey::derive(
            "price",
            &[
                &product.id,
                replaced,
                &target.amount().to_string(),
                target.currency().as_str(),
            ],
        );
        let new_price = self
            .provider
            .create_price(
                &NewProviderPrice {
                    product_id: product.id.clone(),
                    price: target.clone(),
                },
                &key,
            )
            .await?;

        self.provider
            .set_default_price(&product.id, &new_price.id)
            .await?;

        self.archive_active_except(&product.id, Some(&new_price.id))
            .await;

        tracing::info!(
            price_id = %new_price.id,
            replaced = %replaced,
            "default price replaced"
        );
        Ok(new_price)
    }

    /// The price the product currently charges: the default-price pointer if
    /// it names an active price, otherwise the first active price listed.
    pub async fn current_default(
        &self,
        product: &ProviderProduct,
    ) -> Result<Option<ProviderPrice>, BillingError> {
        if let Some(price_id) = product.default_price_id.as_deref() {
            match self.provider.retrieve_price(price_id).await {
                Ok(price) if price.active => return Ok(Some(price)),
                Ok(_) => {}
                Err(e) if e.kind == ProviderErrorKind::ResourceMissing => {
                    tracing::warn!(product_id = %product.id, price_id, "default price pointer dangles");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let page = self.provider.list_active_prices(&product.id, None).await?;
        Ok(page.data.into_iter().find(|p| p.active))
    }

    /// Archives every active price of the product except `keep`. Best effort:
    /// failures are logged and swallowed, the default pointer is already right.
    pub async fn archive_active_except(&self, product_id: &str, keep: Option<&str>) -> usize {
        let stale = match self.active_price_ids(product_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(product_id, error = %e, "failed to list prices for archiving");
                return 0;
            }
        };

        let mut archived = 0;
        for price_id in stale.iter().filter(|id| Some(id.as_str()) != keep) {
            match self.provider.archive_price(price_id).await {
                Ok(_) => {
                    archived += 1;
                    tracing::info!(product_id, price_id = %price_id, "archived price");
                }
                Err(e) => {
                    tracing::warn!(product_id, price_id = %price_id, error = %e, "failed to archive price");
                }
            }
        }
        archived
    }

    async fn active_price_ids(&self, product_id: &str) -> Result<Vec<String>, BillingError> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .provider
                .list_active_prices(product_id, cursor.as_deref())
                .await?;
            let last = page.data.last().map(|p| p.id.clone());
            ids.extend(page.data.into_iter().filter(|p| p.active).map(|p| p.id));
            match last {
                Some(id) if page.has_more => cursor = Some(id),
                _ => return Ok(ids),
            }
        }
    }
}

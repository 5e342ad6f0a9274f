use {
    super::price_reconciler::PriceReconciler,
    crate::domain::{
        customer::DomainCustomer,
        error::{BillingError, ProviderError},
        id::IdempotencyKey,
        metadata,
        money::CurrencyCode,
        product::DomainProduct,
        provider::{
            BillingProvider, CustomerFields, NewProviderProduct, Page, ProviderCustomer,
            ProviderFuture, ProviderProduct, ProviderRecord, SearchClause,
        },
    },
    std::sync::Arc,
};

/// Upper bound on re-keyed creates when replays keep returning deleted
/// customers.
const MAX_STALE_REPLAYS: usize = 4;

/// Result of a natural-key search.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The search capability itself failed; callers fall back to listing.
    SearchUnavailable(ProviderError),
}

#[derive(Debug, Clone, Copy)]
pub enum DomainEntity<'a> {
    Product(&'a DomainProduct),
    Customer(&'a DomainCustomer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEntity {
    Product(ProviderProduct),
    Customer(ProviderCustomer),
}

/// Records that can be scanned page by page when search is down.
trait Listable: ProviderRecord + Sized + Send {
    fn list_page<'a>(
        provider: &'a dyn BillingProvider,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<Self>>;
}

impl Listable for ProviderProduct {
    fn list_page<'a>(
        provider: &'a dyn BillingProvider,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<Self>> {
        provider.list_products(starting_after)
    }
}

impl Listable for ProviderCustomer {
    fn list_page<'a>(
        provider: &'a dyn BillingProvider,
        starting_after: Option<&'a str>,
    ) -> ProviderFuture<'a, Page<Self>> {
        provider.list_customers(starting_after)
    }
}

/// Linear scan over every page until `matches` hits or pagination runs out.
async fn scan_pages<T, P>(
    provider: &dyn BillingProvider,
    matches: P,
) -> Result<Option<T>, ProviderError>
where
    T: Listable,
    P: Fn(&T) -> bool + Send,
{
    let mut cursor: Option<String> = None;
    loop {
        let page = T::list_page(provider, cursor.as_deref()).await?;
        let last = page.data.last().map(|r| r.provider_id().to_string());
        if let Some(hit) = page.data.into_iter().find(|r| matches(r)) {
            return Ok(Some(hit));
        }
        match last {
            Some(id) if page.has_more => cursor = Some(id),
            _ => return Ok(None),
        }
    }
}

/// Idempotent upsert of domain entities against the provider. The only
/// component allowed to create provider products and customers: it always
/// searches by natural key before creating, and every create carries a
/// deterministic idempotency key, so redelivered or concurrent messages
/// converge on one provider record.
#[derive(Clone)]
pub struct EntityResolver {
    provider: Arc<dyn BillingProvider>,
    prices: PriceReconciler,
    default_currency: CurrencyCode,
}

impl EntityResolver {
    pub fn new(provider: Arc<dyn BillingProvider>, default_currency: CurrencyCode) -> Self {
        Self {
            prices: PriceReconciler::new(provider.clone()),
            provider,
            default_currency,
        }
    }

    pub fn prices(&self) -> &PriceReconciler {
        &self.prices
    }

    pub fn default_currency(&self) -> &CurrencyCode {
        &self.default_currency
    }

    /// Resolves either kind of entity. `None` only for customers without a
    /// billing email.
    pub async fn resolve(
        &self,
        entity: DomainEntity<'_>,
    ) -> Result<Option<ProviderEntity>, BillingError> {
        match entity {
            DomainEntity::Product(product) => self
                .resolve_product(product)
                .await
                .map(|p| Some(ProviderEntity::Product(p))),
            DomainEntity::Customer(customer) => Ok(self
                .resolve_customer(customer)
                .await?
                .map(ProviderEntity::Customer)),
        }
    }

    // ── Products ───────────────────────────────────────────────────────────

    async fn lookup_product(&self, clause: SearchClause) -> Lookup<ProviderProduct> {
        match self.provider.search_products(&clause).await {
            Ok(Some(product)) => Lookup::Found(product),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::SearchUnavailable(e),
        }
    }

    /// Finds the provider mirror by name without creating anything.
    pub async fn find_product(
        &self,
        product: &DomainProduct,
    ) -> Result<Option<ProviderProduct>, BillingError> {
        let name = product.natural_key()?;
        match self.lookup_product(SearchClause::Name(name.to_string())).await {
            Lookup::Found(found) => Ok(Some(found)),
            Lookup::NotFound => Ok(None),
            Lookup::SearchUnavailable(e) => {
                tracing::warn!(product_name = name, error = %e, "product search unavailable, scanning listing");
                Ok(scan_pages(&*self.provider, |p: &ProviderProduct| p.name == name).await?)
            }
        }
    }

    #[tracing::instrument(name = "resolve_product", skip_all, fields(local_id = product.id))]
    pub async fn resolve_product(
        &self,
        product: &DomainProduct,
    ) -> Result<ProviderProduct, BillingError> {
        let name = product.natural_key()?;
        let declared = product.declared_price(&self.default_currency)?;

        if let Some(mut existing) = self.find_product(product).await? {
            tracing::info!(product_id = %existing.id, "product already synchronized");
            if product.active && !existing.active {
                tracing::info!(product_id = %existing.id, "reactivating removed product");
                existing = self.provider.set_product_active(&existing.id, true).await?;
            }
            if let Some(target) = &declared {
                // no-op when the current default already matches
                let price = self.prices.reconcile(&existing, target).await?;
                existing.default_price_id = Some(price.id);
            }
            return Ok(existing);
        }

        let local_id = product.id.to_string();
        let (amount, currency) = declared
            .as_ref()
            .map(|m| (m.amount().to_string(), m.currency().as_str().to_string()))
            .unwrap_or_default();
        let key = IdempotencyKey::derive("product", &[name, &local_id, &amount, &currency]);

        let created = self
            .provider
            .create_product(
                &NewProviderProduct {
                    name: name.to_string(),
                    description: product.description.clone(),
                    active: product.active,
                    metadata: product.provider_metadata(),
                    default_price: declared,
                },
                &key,
            )
            .await?;

        tracing::info!(product_id = %created.id, product_name = name, "product created");
        Ok(created)
    }

    /// Reverse lookup from the local primary key: metadata first, then the
    /// id as a name, then a full scan if search is down.
    pub async fn find_product_by_local_id(
        &self,
        local_id: i64,
    ) -> Result<Option<ProviderProduct>, BillingError> {
        let by_metadata = SearchClause::Metadata {
            key: metadata::PRODUCT_LOCAL_ID,
            value: local_id.to_string(),
        };
        match self.lookup_product(by_metadata).await {
            Lookup::Found(found) => return Ok(Some(found)),
            Lookup::NotFound => {}
            Lookup::SearchUnavailable(e) => {
                tracing::warn!(local_id, error = %e, "product search unavailable, scanning listing");
                return Ok(scan_pages(&*self.provider, |p: &ProviderProduct| {
                    p.local_id() == Some(local_id)
                })
                .await?);
            }
        }

        tracing::warn!(local_id, "no product with metadata id, trying name");
        match self.lookup_product(SearchClause::Name(local_id.to_string())).await {
            Lookup::Found(found) => Ok(Some(found)),
            Lookup::NotFound => Ok(None),
            Lookup::SearchUnavailable(e) => Err(e.into()),
        }
    }

    /// Deactivates the provider product and archives its non-default prices.
    /// Returns `false` when no provider product maps to `local_id`.
    #[tracing::instrument(name = "remove_product", skip(self))]
    pub async fn remove_product(&self, local_id: i64) -> Result<bool, BillingError> {
        let Some(product) = self.find_product_by_local_id(local_id).await? else {
            tracing::warn!("product not found");
            return Ok(false);
        };

        self.provider.set_product_active(&product.id, false).await?;
        // the provider refuses to archive a product's default price
        let archived = self
            .prices
            .archive_active_except(&product.id, product.default_price_id.as_deref())
            .await;

        tracing::info!(product_id = %product.id, archived, "product deactivated");
        Ok(true)
    }

    // ── Customers ──────────────────────────────────────────────────────────

    async fn lookup_customer(&self, clause: SearchClause) -> Lookup<ProviderCustomer> {
        match self.provider.search_customers(&clause).await {
            Ok(Some(customer)) => Lookup::Found(customer),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::SearchUnavailable(e),
        }
    }

    /// Finds the provider customer by email without creating anything.
    pub async fn find_customer(
        &self,
        customer: &DomainCustomer,
    ) -> Result<Option<ProviderCustomer>, BillingError> {
        let Some(email) = customer.billing_email() else {
            tracing::warn!(local_id = customer.id, "user has no email, skipping billing lookup");
            return Ok(None);
        };
        match self.lookup_customer(SearchClause::Email(email.to_string())).await {
            Lookup::Found(found) => Ok(Some(found)),
            Lookup::NotFound => Ok(None),
            Lookup::SearchUnavailable(e) => {
                tracing::warn!(email, error = %e, "customer search unavailable, scanning listing");
                Ok(scan_pages(&*self.provider, |c: &ProviderCustomer| {
                    c.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
                })
                .await?)
            }
        }
    }

    /// Existing customers are returned unchanged. `None` when the user has no
    /// billing email.
    #[tracing::instrument(name = "resolve_customer", skip_all, fields(local_id = customer.id))]
    pub async fn resolve_customer(
        &self,
        customer: &DomainCustomer,
    ) -> Result<Option<ProviderCustomer>, BillingError> {
        let Some(email) = customer.billing_email() else {
            return Ok(None);
        };

        if let Some(existing) = self.find_customer(customer).await? {
            tracing::info!(customer_id = %existing.id, "customer already synchronized");
            return Ok(Some(existing));
        }

        let local_id = customer.id.to_string();
        let fields = Self::customer_fields(customer, email);
        let mut key = IdempotencyKey::derive("customer", &[email, &local_id]);
        for _ in 0..MAX_STALE_REPLAYS {
            let created = self.provider.create_customer(&fields, &key).await?;
            if self.provider.retrieve_customer(&created.id).await?.is_some() {
                tracing::info!(customer_id = %created.id, "customer created");
                return Ok(Some(created));
            }
            // the key replayed a customer deleted since; chain the next key off it
            tracing::warn!(stale_id = %created.id, "idempotent create replayed a deleted customer");
            key = IdempotencyKey::derive("customer", &[email, &local_id, &created.id]);
        }
        Err(BillingError::ProviderUnavailable(format!(
            "customer create for {local_id} kept replaying deleted customers"
        )))
    }

    /// `resolve_customer`, then refreshes name and identity metadata if they
    /// drifted from the domain record.
    pub async fn sync_customer(
        &self,
        customer: &DomainCustomer,
    ) -> Result<Option<ProviderCustomer>, BillingError> {
        let Some(existing) = self.resolve_customer(customer).await? else {
            return Ok(None);
        };
        let Some(email) = customer.billing_email() else {
            return Ok(Some(existing));
        };
        if !Self::customer_drifted(&existing, customer, email) {
            return Ok(Some(existing));
        }

        tracing::info!(customer_id = %existing.id, "updating drifted customer");
        let updated = self
            .provider
            .update_customer(&existing.id, &Self::customer_fields(customer, email))
            .await?;
        Ok(Some(updated))
    }

    pub async fn find_customer_by_local_id(
        &self,
        local_id: i64,
    ) -> Result<Option<ProviderCustomer>, BillingError> {
        for key in [metadata::CUSTOMER_LOCAL_ID, metadata::CUSTOMER_INTERNAL_ID] {
            let clause = SearchClause::Metadata {
                key,
                value: local_id.to_string(),
            };
            match self.lookup_customer(clause).await {
                Lookup::Found(found) => return Ok(Some(found)),
                Lookup::NotFound => {}
                Lookup::SearchUnavailable(e) => {
                    tracing::warn!(local_id, error = %e, "customer search unavailable, scanning listing");
                    return Ok(scan_pages(&*self.provider, |c: &ProviderCustomer| {
                        c.local_id() == Some(local_id)
                    })
                    .await?);
                }
            }
        }
        Ok(None)
    }

    #[tracing::instrument(name = "remove_customer", skip(self))]
    pub async fn remove_customer(&self, local_id: i64) -> Result<bool, BillingError> {
        let Some(customer) = self.find_customer_by_local_id(local_id).await? else {
            tracing::warn!("customer not found");
            return Ok(false);
        };
        self.provider.delete_customer(&customer.id).await?;
        tracing::info!(customer_id = %customer.id, "customer deleted");
        Ok(true)
    }

    fn customer_fields(customer: &DomainCustomer, email: &str) -> CustomerFields {
        CustomerFields {
            email: email.to_string(),
            name: customer.display_name(),
            metadata: customer.provider_metadata(),
        }
    }

    fn customer_drifted(existing: &ProviderCustomer, customer: &DomainCustomer, email: &str) -> bool {
        if existing.name.as_deref().unwrap_or("") != customer.display_name() {
            return true;
        }
        if existing.email.as_deref() != Some(email) {
            return true;
        }
        let wanted = customer.provider_metadata();
        [
            metadata::CUSTOMER_LOCAL_ID,
            metadata::CUSTOMER_ROLE,
            metadata::CUSTOMER_GOOGLE_ID,
        ]
        .into_iter()
        .any(|key| existing.metadata.get(key) != wanted.get(key))
    }
}

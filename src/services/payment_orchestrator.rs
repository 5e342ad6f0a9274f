use {
    super::{cart_aggregator::CartAggregator, entity_resolver::EntityResolver},
    crate::domain::{
        cart::{AggregationOutcome, CartLine, ChargeSpec},
        customer::DomainCustomer,
        error::{BillingError, ProviderError},
        id::IdempotencyKey,
        metadata::{self, Metadata},
        money::{CurrencyCode, MoneyAmount},
        provider::{
            BillingProvider, ConfirmWith, IntentStatus, NewPaymentIntent, NewPaymentLink,
            PaymentLinkLine, ProviderCustomer, ProviderFuture, ProviderPaymentIntent,
        },
    },
    derive_more::Display,
    serde::Serialize,
    std::sync::Arc,
    uuid::Uuid,
};

/// Confirmation step of a direct charge. The deployed implementation is
/// simulated; a real checkout swaps this out and nothing else.
pub trait PaymentConfirmer: Send + Sync {
    /// First attempt. Returns the intent as left after confirm (and capture).
    fn primary<'a>(
        &'a self,
        intent: &'a ProviderPaymentIntent,
    ) -> ProviderFuture<'a, ProviderPaymentIntent>;

    /// Single retry with an alternate method after `primary` failed.
    fn fallback<'a>(
        &'a self,
        intent: &'a ProviderPaymentIntent,
    ) -> ProviderFuture<'a, ProviderPaymentIntent>;
}

/// Attaches a stand-in payment method, then captures. Falls back to a test
/// card token.
pub struct SimulatedConfirmer {
    provider: Arc<dyn BillingProvider>,
    payment_method: String,
    card_token: String,
    return_url: String,
}

impl SimulatedConfirmer {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        payment_method: impl Into<String>,
        card_token: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            payment_method: payment_method.into(),
            card_token: card_token.into(),
            return_url: return_url.into(),
        }
    }

    async fn confirm_and_capture(
        &self,
        intent_id: &str,
        with: ConfirmWith,
    ) -> Result<ProviderPaymentIntent, ProviderError> {
        let confirmed = self
            .provider
            .confirm_payment_intent(intent_id, &with)
            .await?;
        if confirmed.status == IntentStatus::RequiresCapture {
            return self.provider.capture_payment_intent(intent_id).await;
        }
        Ok(confirmed)
    }
}

impl PaymentConfirmer for SimulatedConfirmer {
    fn primary<'a>(
        &'a self,
        intent: &'a ProviderPaymentIntent,
    ) -> ProviderFuture<'a, ProviderPaymentIntent> {
        Box::pin(self.confirm_and_capture(
            &intent.id,
            ConfirmWith::PaymentMethod {
                id: self.payment_method.clone(),
                return_url: Some(self.return_url.clone()),
            },
        ))
    }

    fn fallback<'a>(
        &'a self,
        intent: &'a ProviderPaymentIntent,
    ) -> ProviderFuture<'a, ProviderPaymentIntent> {
        Box::pin(self.confirm_and_capture(&intent.id, ConfirmWith::CardToken(self.card_token.clone())))
    }
}

/// Direct-charge lifecycle. `Captured` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChargeState {
    #[display("created")]
    Created,
    #[display("confirmation_attempted")]
    ConfirmationAttempted,
    #[display("confirmation_failed")]
    ConfirmationFailed,
    #[display("captured")]
    Captured,
    #[display("failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChargeOutcome {
    Succeeded {
        payment_intent_id: String,
        customer_id: String,
        amount: MoneyAmount,
        currency: CurrencyCode,
        product_ids: Vec<String>,
    },
    Failed {
        code: String,
        message: String,
    },
}

impl ChargeOutcome {
    fn failed(err: &BillingError) -> Self {
        Self::Failed {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkOutcome {
    Created {
        id: String,
        url: String,
        customer_id: String,
    },
    Failed {
        code: String,
        message: String,
    },
}

impl LinkOutcome {
    fn failed(err: &BillingError) -> Self {
        Self::Failed {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Created { url, .. } => Some(url),
            Self::Failed { .. } => None,
        }
    }
}

/// Checkout entry point: a direct charge or a hosted payment link for a cart.
/// Never mutates local state and never retries a whole checkout; both are
/// left to the caller.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    provider: Arc<dyn BillingProvider>,
    resolver: EntityResolver,
    aggregator: CartAggregator,
    confirmer: Arc<dyn PaymentConfirmer>,
    success_url: String,
}

impl PaymentOrchestrator {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        resolver: EntityResolver,
        confirmer: Arc<dyn PaymentConfirmer>,
        success_url: impl Into<String>,
    ) -> Self {
        Self {
            aggregator: CartAggregator::new(resolver.clone()),
            provider,
            resolver,
            confirmer,
            success_url: success_url.into(),
        }
    }

    /// Charges the cart to the customer. Every error is folded into
    /// [`ChargeOutcome::Failed`].
    #[tracing::instrument(name = "charge", skip_all, fields(local_user_id = customer.id, lines = cart.len()))]
    pub async fn charge(
        &self,
        cart: &[CartLine],
        customer: &DomainCustomer,
        attempt_key: Option<&str>,
    ) -> ChargeOutcome {
        match self.try_charge(cart, customer, attempt_key).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "charge failed");
                ChargeOutcome::failed(&e)
            }
        }
    }

    async fn try_charge(
        &self,
        cart: &[CartLine],
        customer: &DomainCustomer,
        attempt_key: Option<&str>,
    ) -> Result<ChargeOutcome, BillingError> {
        let billing_customer = self.billing_customer(customer).await?;
        let spec = self.charge_spec(cart, &billing_customer.id).await?;

        let key = attempt_idempotency_key(
            "payment_intent",
            attempt_key,
            &[
                &spec.customer_id,
                &spec.total.to_string(),
                spec.currency.as_str(),
                &spec.line_price_ids().join(","),
            ],
        );
        let intent = self
            .provider
            .create_payment_intent(
                &NewPaymentIntent {
                    amount: spec.total,
                    currency: spec.currency.clone(),
                    customer_id: spec.customer_id.clone(),
                    metadata: checkout_metadata(&spec, customer, &billing_customer),
                },
                &key,
            )
            .await?;
        tracing::info!(
            payment_intent_id = %intent.id,
            amount = %spec.total,
            currency = %spec.currency,
            state = %ChargeState::Created,
            "payment intent created"
        );

        // Detached so a dropped caller cannot leave the intent half-confirmed.
        let provider = self.provider.clone();
        let confirmer = self.confirmer.clone();
        let captured = tokio::spawn(async move {
            drive_to_terminal(&*provider, &*confirmer, intent).await
        })
        .await
        .map_err(|e| BillingError::ConfirmationFailed(format!("confirmation task aborted: {e}")))??;

        Ok(ChargeOutcome::Succeeded {
            payment_intent_id: captured.id,
            customer_id: spec.customer_id.clone(),
            amount: spec.total,
            currency: spec.currency.clone(),
            product_ids: spec
                .lines
                .iter()
                .map(|l| l.provider_product_id.clone())
                .collect(),
        })
    }

    /// Creates a multi-line hosted payment link that redirects to the
    /// configured success URL.
    #[tracing::instrument(name = "create_payment_link", skip_all, fields(local_user_id = customer.id, lines = cart.len()))]
    pub async fn create_payment_link(
        &self,
        cart: &[CartLine],
        customer: &DomainCustomer,
        attempt_key: Option<&str>,
    ) -> LinkOutcome {
        match self.try_payment_link(cart, customer, attempt_key).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "payment link failed");
                LinkOutcome::failed(&e)
            }
        }
    }

    async fn try_payment_link(
        &self,
        cart: &[CartLine],
        customer: &DomainCustomer,
        attempt_key: Option<&str>,
    ) -> Result<LinkOutcome, BillingError> {
        let billing_customer = self.billing_customer(customer).await?;
        let spec = self.charge_spec(cart, &billing_customer.id).await?;

        let lines: Vec<PaymentLinkLine> = spec
            .lines
            .iter()
            .map(|l| PaymentLinkLine {
                price_id: l.provider_price_id.clone(),
                quantity: l.quantity,
            })
            .collect();
        let line_parts = lines
            .iter()
            .map(|l| format!("{}x{}", l.price_id, l.quantity))
            .collect::<Vec<_>>()
            .join(",");

        let mut link_metadata = checkout_metadata(&spec, customer, &billing_customer);
        link_metadata.insert(metadata::CUSTOMER_ID.to_string(), billing_customer.id.clone());

        let key = attempt_idempotency_key("payment_link", attempt_key, &[&spec.customer_id, &line_parts]);
        let link = self
            .provider
            .create_payment_link(
                &NewPaymentLink {
                    lines,
                    redirect_url: self.success_url.clone(),
                    metadata: link_metadata,
                },
                &key,
            )
            .await?;

        tracing::info!(payment_link_id = %link.id, "payment link created");
        Ok(LinkOutcome::Created {
            id: link.id,
            url: link.url,
            customer_id: billing_customer.id,
        })
    }

    async fn billing_customer(&self, customer: &DomainCustomer) -> Result<ProviderCustomer, BillingError> {
        self.resolver
            .resolve_customer(customer)
            .await?
            .ok_or_else(|| {
                BillingError::ValidationFailed(format!("user {} has no billing email", customer.id))
            })
    }

    async fn charge_spec(&self, cart: &[CartLine], customer_id: &str) -> Result<ChargeSpec, BillingError> {
        match self.aggregator.aggregate(cart, customer_id).await? {
            AggregationOutcome::Charge(spec) => Ok(spec),
            AggregationOutcome::Empty => Err(BillingError::AggregationEmpty),
        }
    }
}

/// Runs `Created → ConfirmationAttempted → {Captured | ConfirmationFailed}`,
/// with one fallback after `ConfirmationFailed`. An intent replayed by its
/// idempotency key may already be past confirmation; it is finished from
/// where it stands.
async fn drive_to_terminal(
    provider: &dyn BillingProvider,
    confirmer: &dyn PaymentConfirmer,
    intent: ProviderPaymentIntent,
) -> Result<ProviderPaymentIntent, BillingError> {
    match intent.status {
        IntentStatus::Succeeded => {
            tracing::info!(payment_intent_id = %intent.id, state = %ChargeState::Captured, "intent already captured");
            return Ok(intent);
        }
        IntentStatus::RequiresCapture => {
            let captured = provider.capture_payment_intent(&intent.id).await?;
            return captured_or_failed(captured);
        }
        _ => {}
    }

    tracing::info!(payment_intent_id = %intent.id, state = %ChargeState::ConfirmationAttempted, "confirming");
    let primary_error = match confirmer.primary(&intent).await {
        Ok(confirmed) if confirmed.status == IntentStatus::Succeeded => {
            tracing::info!(payment_intent_id = %intent.id, state = %ChargeState::Captured, "payment captured");
            return Ok(confirmed);
        }
        Ok(confirmed) => format!("intent left in status {:?}", confirmed.status),
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        payment_intent_id = %intent.id,
        state = %ChargeState::ConfirmationFailed,
        error = %primary_error,
        "primary confirmation failed, trying fallback"
    );

    match confirmer.fallback(&intent).await {
        Ok(confirmed) if confirmed.status == IntentStatus::Succeeded => {
            tracing::info!(payment_intent_id = %intent.id, state = %ChargeState::Captured, "payment captured via fallback");
            Ok(confirmed)
        }
        Ok(confirmed) => {
            tracing::error!(payment_intent_id = %intent.id, state = %ChargeState::Failed, status = ?confirmed.status, "fallback confirmation failed");
            Err(BillingError::ConfirmationFailed(format!(
                "{}: primary: {primary_error}; fallback: intent left in status {:?}",
                intent.id, confirmed.status
            )))
        }
        Err(e) => {
            tracing::error!(payment_intent_id = %intent.id, state = %ChargeState::Failed, error = %e, "fallback confirmation failed");
            Err(BillingError::ConfirmationFailed(format!(
                "{}: primary: {primary_error}; fallback: {e}",
                intent.id
            )))
        }
    }
}

fn captured_or_failed(intent: ProviderPaymentIntent) -> Result<ProviderPaymentIntent, BillingError> {
    if intent.status == IntentStatus::Succeeded {
        tracing::info!(payment_intent_id = %intent.id, state = %ChargeState::Captured, "payment captured");
        Ok(intent)
    } else {
        Err(BillingError::ConfirmationFailed(format!(
            "{}: capture left status {:?}",
            intent.id, intent.status
        )))
    }
}

fn checkout_metadata(spec: &ChargeSpec, customer: &DomainCustomer, billing: &ProviderCustomer) -> Metadata {
    Metadata::from([
        (metadata::PRODUCT_IDS.to_string(), spec.joined_product_ids()),
        (metadata::USER_ID.to_string(), customer.id.to_string()),
        (
            metadata::USER_EMAIL.to_string(),
            billing.email.clone().unwrap_or_default(),
        ),
        (metadata::SOURCE.to_string(), metadata::SOURCE_VALUE.to_string()),
    ])
}

/// Without an attempt id every call is a fresh attempt.
fn attempt_idempotency_key(scope: &str, attempt: Option<&str>, parts: &[&str]) -> IdempotencyKey {
    let fresh;
    let attempt = match attempt {
        Some(a) => a,
        None => {
            fresh = Uuid::now_v7().to_string();
            fresh.as_str()
        }
    };
    let mut all = Vec::with_capacity(parts.len() + 1);
    all.push(attempt);
    all.extend_from_slice(parts);
    IdempotencyKey::derive(scope, &all)
}

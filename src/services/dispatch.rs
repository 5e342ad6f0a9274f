use {
    super::{
        entity_resolver::EntityResolver,
        payment_orchestrator::{
            ChargeOutcome, LinkOutcome, PaymentConfirmer, PaymentOrchestrator, SimulatedConfirmer,
        },
    },
    crate::domain::{
        error::BillingError,
        message::Message,
        money::CurrencyCode,
        provider::BillingProvider,
    },
    serde::Serialize,
    serde_json::{Value, json},
    std::sync::Arc,
    uuid::Uuid,
};

/// Runtime knobs the billing components need from configuration.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    pub success_url: String,
    pub default_currency: CurrencyCode,
    pub test_payment_method: String,
    pub test_card_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceReply {
    pub amount: i64,
    pub currency: CurrencyCode,
}

/// Domain event produced by a successful checkout. Emitting it is the
/// caller's job; the queue worker records it in the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutEvent {
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_ref: String,
    pub detail: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub reply: Value,
    pub event: Option<CheckoutEvent>,
}

impl Handled {
    fn reply(reply: Value) -> Self {
        Self { reply, event: None }
    }
}

/// One handler per message pattern. Replies are plain JSON so the HTTP route
/// and the queue worker can return or store them unchanged.
#[derive(Clone)]
pub struct BillingService {
    provider: Arc<dyn BillingProvider>,
    resolver: EntityResolver,
    orchestrator: PaymentOrchestrator,
    default_currency: CurrencyCode,
}

impl BillingService {
    pub fn new(provider: Arc<dyn BillingProvider>, settings: BillingSettings) -> Self {
        let confirmer = Arc::new(SimulatedConfirmer::new(
            provider.clone(),
            settings.test_payment_method,
            settings.test_card_token,
            settings.success_url.clone(),
        ));
        Self::with_confirmer(provider, confirmer, settings.success_url, settings.default_currency)
    }

    /// Same wiring with a caller-supplied confirmation step.
    pub fn with_confirmer(
        provider: Arc<dyn BillingProvider>,
        confirmer: Arc<dyn PaymentConfirmer>,
        success_url: String,
        default_currency: CurrencyCode,
    ) -> Self {
        let resolver = EntityResolver::new(provider.clone(), default_currency.clone());
        Self {
            orchestrator: PaymentOrchestrator::new(
                provider.clone(),
                resolver.clone(),
                confirmer,
                success_url,
            ),
            provider,
            resolver,
            default_currency,
        }
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn orchestrator(&self) -> &PaymentOrchestrator {
        &self.orchestrator
    }

    /// `message_id` is the queue id when the message came through the queue;
    /// it doubles as the checkout attempt key so redelivery replays the
    /// original provider calls.
    #[tracing::instrument(name = "handle_message", skip_all, fields(pattern = %message.pattern(), message_id = ?message_id))]
    pub async fn handle(
        &self,
        message: Message,
        message_id: Option<Uuid>,
    ) -> Result<Handled, BillingError> {
        match message {
            Message::AddProduct(product) => {
                let synced = self.resolver.resolve_product(&product).await?;
                Ok(Handled::reply(serde_json::to_value(synced)?))
            }
            Message::RemoveProduct(local_id) => {
                let removed = self.resolver.remove_product(local_id).await?;
                Ok(Handled::reply(json!({ "removed": removed })))
            }
            Message::AddUser(user) => {
                let synced = self.resolver.sync_customer(&user).await?;
                Ok(Handled::reply(serde_json::to_value(synced)?))
            }
            Message::RemoveUser(local_id) => {
                let removed = self.resolver.remove_customer(local_id).await?;
                Ok(Handled::reply(json!({ "removed": removed })))
            }
            Message::DoPayment(request) => {
                let attempt = attempt_key(request.request_id.as_deref(), message_id);
                let outcome = self
                    .orchestrator
                    .charge(&request.products, &request.user, attempt.as_deref())
                    .await;
                let reply = serde_json::to_value(&outcome)?;
                let event = match &outcome {
                    ChargeOutcome::Succeeded {
                        payment_intent_id, ..
                    } => Some(CheckoutEvent {
                        action: "payment_succeeded",
                        entity_type: "payment_intent",
                        entity_ref: payment_intent_id.clone(),
                        detail: reply.clone(),
                    }),
                    ChargeOutcome::Failed { .. } => None,
                };
                Ok(Handled { reply, event })
            }
            Message::GetPaymentLink(request) => {
                let attempt = attempt_key(request.request_id.as_deref(), message_id);
                let outcome = self
                    .orchestrator
                    .create_payment_link(&request.products, &request.user, attempt.as_deref())
                    .await;
                let event = match &outcome {
                    LinkOutcome::Created { id, .. } => Some(CheckoutEvent {
                        action: "payment_link_created",
                        entity_type: "payment_link",
                        entity_ref: id.clone(),
                        detail: serde_json::to_value(&outcome)?,
                    }),
                    LinkOutcome::Failed { .. } => None,
                };
                // the reply is the bare URL, null on failure
                let reply = outcome
                    .url()
                    .map_or(Value::Null, |url| Value::String(url.to_string()));
                Ok(Handled { reply, event })
            }
            Message::GetBalance => Ok(Handled::reply(serde_json::to_value(self.balance().await?)?)),
        }
    }

    /// Sum of the available balance. Currency is the first entry's.
    pub async fn balance(&self) -> Result<BalanceReply, BillingError> {
        let balance = self.provider.retrieve_balance().await?;
        let amount = balance
            .available
            .iter()
            .try_fold(0i64, |acc, entry| acc.checked_add(entry.amount))
            .ok_or_else(|| BillingError::ValidationFailed("balance overflows i64".to_string()))?;
        let currency = balance
            .available
            .first()
            .map(|entry| entry.currency.clone())
            .unwrap_or_else(|| self.default_currency.clone());
        Ok(BalanceReply { amount, currency })
    }
}

fn attempt_key(request_id: Option<&str>, message_id: Option<Uuid>) -> Option<String> {
    request_id
        .map(str::to_string)
        .or_else(|| message_id.map(|id| id.to_string()))
}

pub mod cart_aggregator;
pub mod dispatch;
pub mod entity_resolver;
pub mod payment_orchestrator;
pub mod price_reconciler;
pub mod worker;

pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use services::dispatch::BillingService;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub billing: BillingService,
}

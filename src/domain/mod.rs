pub mod audit;
pub mod cart;
pub mod customer;
pub mod error;
pub mod id;
pub mod message;
pub mod metadata;
pub mod money;
pub mod product;
pub mod provider;

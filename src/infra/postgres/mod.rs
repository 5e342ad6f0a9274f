pub mod audit_repo;
pub mod message_repo;

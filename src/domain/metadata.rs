//! Metadata keys stored on provider objects.
//!
//! The provider metadata map is the only reverse-lookup channel from a
//! provider record back to the local row. The key names below are part of
//! the data contract: changing one orphans every record created before it.

use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, String>;

/// Local product primary key on a provider product.
pub const PRODUCT_LOCAL_ID: &str = "id";

/// Local user primary key on a provider customer.
pub const CUSTOMER_LOCAL_ID: &str = "user_id";
/// Legacy duplicate of [`CUSTOMER_LOCAL_ID`], still consulted on lookup.
pub const CUSTOMER_INTERNAL_ID: &str = "internal_user_id";
pub const CUSTOMER_ROLE: &str = "user_role";
pub const CUSTOMER_GOOGLE_ID: &str = "google_id";
pub const CUSTOMER_CREATED_AT: &str = "created_at";
pub const CUSTOMER_UPDATED_AT: &str = "updated_at";

/// Provenance tag marking records created by this service.
pub const SOURCE: &str = "source";
pub const SOURCE_VALUE: &str = "billing-sync";

pub const PRODUCT_IDS: &str = "product_ids";
pub const USER_ID: &str = "user_id";
pub const USER_EMAIL: &str = "user_email";
pub const CUSTOMER_ID: &str = "customer_id";

/// Reads a local integer id back out of a metadata map.
pub fn local_id(metadata: &Metadata, key: &str) -> Option<i64> {
    metadata.get(key).and_then(|v| v.parse().ok())
}

//! Id generation for new records

use crate::entity::Record;
use crate::mapping::BundleMapping;
use uuid::Uuid;

/// Prefix used when a bundle sets no `entity_id_base`
pub const DEFAULT_ID_BASE: &str = "urn:uuid:";

/// Mints subject URIs for records saved without an id
pub trait IdGenerator: Send + Sync {
    fn generate(&self, record: &Record, bundle: &BundleMapping) -> String;
}

/// `{entity_id_base}{uuid-v4}`
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self, _record: &Record, bundle: &BundleMapping) -> String {
        let base = bundle.entity_id_base.as_deref().unwrap_or(DEFAULT_ID_BASE);
        format!("{}{}", base, Uuid::new_v4())
    }
}

use crate::feast::types::{EntityKey, Value};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A named grouping of features sharing one physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureView {
    pub name: String,
}

impl FeatureView {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Carried through the schema-lifecycle signatures for contract symmetry;
/// entities have no physical footprint of their own in this store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One write-batch entry: all feature values of a single entity, stamped with
/// one event timestamp and optionally the materialization creation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBatch {
    pub entity_key: EntityKey,
    pub values: HashMap<String, Value>,
    pub event_ts: DateTime<Utc>,
    pub created_ts: Option<DateTime<Utc>>,
}

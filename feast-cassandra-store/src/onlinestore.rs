pub mod cassandra_onlinestore;
mod cql;

use crate::config::RepoConfig;
use crate::feast::types::{EntityKey, Value};
use crate::model::{Entity, FeatureBatch, FeatureView};
use crate::onlinestore::cassandra_onlinestore::CassandraOnlineStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Called with an increment after every fully written batch entry.
pub type ProgressHandler = dyn Fn(usize) + Send + Sync;

/// Reconstructed features of one entity: the representative event timestamp
/// and the feature map, or `(None, None)` when the store holds no rows for
/// the key.
pub type ReadRow = (Option<DateTime<Utc>>, Option<HashMap<String, Value>>);

/// The provider contract exposed to the feature store orchestration layer.
#[async_trait]
pub trait OnlineStore: Send + Sync + 'static {
    /// Write a batch of features of several entities to the store, one row
    /// upsert per (entity, feature) pair.
    async fn online_write_batch(
        &self,
        table: &FeatureView,
        data: &[FeatureBatch],
        progress: Option<&ProgressHandler>,
    ) -> Result<()>;

    /// Read feature values for the requested entity keys, one result per key,
    /// input order preserved.
    async fn online_read(
        &self,
        table: &FeatureView,
        entity_keys: &[EntityKey],
        requested_features: Option<&[String]>,
    ) -> Result<Vec<ReadRow>>;

    /// Reconcile the physical schema: create a table for every view to keep,
    /// drop the table of every view to delete.
    async fn update(
        &self,
        tables_to_delete: &[FeatureView],
        tables_to_keep: &[FeatureView],
        entities_to_delete: &[Entity],
        entities_to_keep: &[Entity],
        partial: bool,
    ) -> Result<()>;

    /// Drop the tables of all listed feature views.
    async fn teardown(&self, tables: &[FeatureView], entities: &[Entity]) -> Result<()>;
}

pub async fn get_online_store(repo_config: &RepoConfig) -> Result<Arc<dyn OnlineStore>> {
    match &repo_config.online_store {
        crate::config::OnlineStoreConfig::Cassandra(config) => {
            debug!(
                "Create Cassandra online store for keyspace: {}",
                config.keyspace
            );
            let store = CassandraOnlineStore::from_repo_config(repo_config)?;
            Ok(Arc::new(store) as Arc<dyn OnlineStore>)
        }
        other => Err(anyhow!("Unsupported online store type: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CassandraStoreConfig, OnlineStoreConfig};

    fn repo_config(online_store: OnlineStoreConfig) -> RepoConfig {
        RepoConfig {
            project: "driver_stats".to_string(),
            online_store,
            entity_key_serialization_version: Default::default(),
        }
    }

    #[tokio::test]
    async fn factory_builds_cassandra_store_without_connecting() -> Result<()> {
        let config = repo_config(OnlineStoreConfig::Cassandra(CassandraStoreConfig {
            hosts: Some(vec!["127.0.0.1".to_string()]),
            keyspace: "feast_keyspace".to_string(),
            ..Default::default()
        }));
        // the session is lazy, so no cluster is needed here
        let _store = get_online_store(&config).await?;
        Ok(())
    }

    #[tokio::test]
    async fn factory_rejects_other_store_types() {
        let config = repo_config(OnlineStoreConfig::Sqlite {
            path: "data/online_store.db".to_string(),
        });
        let err = match get_online_store(&config).await {
            Ok(_) => panic!("expected get_online_store to fail"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Unsupported online store type"));
    }
}

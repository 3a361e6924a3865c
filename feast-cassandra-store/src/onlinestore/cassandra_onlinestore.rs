use crate::config::{
    CassandraStoreConfig, EntityKeySerializationVersion, OnlineStoreConfig, RepoConfig,
};
use crate::error::CassandraConfigError;
use crate::feast::types::{EntityKey, Value};
use crate::key_serialization::serialize_key_hex;
use crate::model::{Entity, FeatureBatch, FeatureView};
use crate::onlinestore::cql::{CqlOperation, READ_PROJECTION, StatementKey, fq_table_name};
use crate::onlinestore::{OnlineStore, ProgressHandler, ReadRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prost::Message;
use rustc_hash::FxHashMap;
use scylla::prepared_statement::PreparedStatement;
use scylla::{Session, SessionBuilder};
use std::collections::HashMap;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

/// Cassandra/Astra DB online store.
///
/// Holds the validated connection settings, the lazily created session and
/// the cache of prepared statements. One instance owns exactly one session;
/// every operation reuses it.
pub struct CassandraOnlineStore {
    project: String,
    config: CassandraStoreConfig,
    serialization_version: EntityKeySerializationVersion,
    session: OnceCell<Session>,
    prepared_statements: RwLock<FxHashMap<StatementKey, PreparedStatement>>,
}

impl CassandraOnlineStore {
    /// Build the store from the repository configuration, rejecting any
    /// online store section that is not the Cassandra variant.
    pub fn from_repo_config(repo_config: &RepoConfig) -> Result<Self, CassandraConfigError> {
        let OnlineStoreConfig::Cassandra(config) = &repo_config.online_store else {
            return Err(CassandraConfigError::UnexpectedConfigurationObject);
        };
        Self::from_config(
            repo_config.project.clone(),
            config.clone(),
            repo_config.entity_key_serialization_version,
        )
    }

    /// Validate the configuration and build the store. Fails fast on a broken
    /// configuration; the session itself is only opened on first use.
    pub fn from_config(
        project: String,
        config: CassandraStoreConfig,
        serialization_version: EntityKeySerializationVersion,
    ) -> Result<Self, CassandraConfigError> {
        config.validate()?;
        debug!(
            "Create Cassandra online store for project '{}' on keyspace '{}'",
            project, config.keyspace
        );
        Ok(Self {
            project,
            config,
            serialization_version,
            session: OnceCell::new(),
            prepared_statements: RwLock::new(FxHashMap::default()),
        })
    }

    /// The single session of this store instance, created on first call.
    /// Concurrent first callers block until the one connection attempt
    /// resolves.
    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| connect_session(&self.config))
            .await
    }

    /// Resolve a DML operation into an executable prepared statement, going
    /// through the per-instance cache. Entries live as long as the store and
    /// are never evicted; the key space is bounded by operations x tables.
    async fn cql_statement(
        &self,
        operation: CqlOperation,
        fqtable: &str,
        columns: Option<&[&str]>,
    ) -> Result<PreparedStatement> {
        debug_assert!(operation.is_prepared());
        let key = StatementKey::new(operation, fqtable, columns);
        {
            let cache = self.prepared_statements.read().await;
            if let Some(statement) = cache.get(&key) {
                return Ok(statement.clone());
            }
        }
        // Concurrent first uses of one key may prepare redundantly; they all
        // converge on whichever handle lands in the cache first.
        let session = self.session().await?;
        let cql = operation.render(fqtable, columns);
        info!("Preparing a {} statement on {}.", operation.name(), fqtable);
        let prepared = session
            .prepare(cql)
            .await
            .with_context(|| format!("Failed to prepare {} statement on {}", operation.name(), fqtable))?;
        let mut cache = self.prepared_statements.write().await;
        Ok(cache.entry(key).or_insert(prepared).clone())
    }

    /// Upsert every feature of one batch entry, one row per feature.
    ///
    /// Entries without `created_ts` use the 4-column insert: binding an
    /// explicit null would create a tombstone for the column.
    async fn write_rows(
        &self,
        fqtable: &str,
        entity_key_hex: &str,
        batch: &FeatureBatch,
    ) -> Result<()> {
        let session = self.session().await?;
        let insert_op = CqlOperation::insert_variant(batch.created_ts.is_some());
        let insert_cql = self.cql_statement(insert_op, fqtable, None).await?;
        for (feature_name, value) in &batch.values {
            let value_bytes = value.encode_to_vec();
            let write = match batch.created_ts {
                Some(created_ts) => {
                    session
                        .execute_unpaged(
                            &insert_cql,
                            (
                                feature_name.as_str(),
                                value_bytes,
                                entity_key_hex,
                                batch.event_ts,
                                created_ts,
                            ),
                        )
                        .await
                }
                None => {
                    session
                        .execute_unpaged(
                            &insert_cql,
                            (
                                feature_name.as_str(),
                                value_bytes,
                                entity_key_hex,
                                batch.event_ts,
                            ),
                        )
                        .await
                }
            };
            write.with_context(|| {
                format!("Failed to write feature '{}' to {}", feature_name, fqtable)
            })?;
        }
        Ok(())
    }

    /// Read all rows of one partition and rebuild the feature map.
    ///
    /// The representative timestamp is the event_ts of the last matching row
    /// in return order.
    async fn read_rows_by_entity_key(
        &self,
        fqtable: &str,
        entity_key_hex: &str,
        requested_features: Option<&[String]>,
    ) -> Result<ReadRow> {
        let session = self.session().await?;
        let select_cql = self
            .cql_statement(CqlOperation::Select, fqtable, Some(READ_PROJECTION))
            .await?;
        let rows_result = session
            .execute_unpaged(&select_cql, (entity_key_hex,))
            .await
            .with_context(|| format!("Failed to read rows from {}", fqtable))?
            .into_rows_result()
            .with_context(|| format!("Unexpected response reading from {}", fqtable))?;

        let mut values: HashMap<String, Value> = HashMap::new();
        let mut event_ts: Option<DateTime<Utc>> = None;
        for row in rows_result.rows::<(String, Vec<u8>, DateTime<Utc>)>()? {
            let (feature_name, value_bytes, row_ts) = row?;
            let requested = requested_features
                .is_none_or(|features| features.iter().any(|name| name == &feature_name));
            if requested {
                let value = Value::decode(value_bytes.as_slice()).with_context(|| {
                    format!(
                        "Failed to decode value for feature '{}' from {}",
                        feature_name, fqtable
                    )
                })?;
                values.insert(feature_name, value);
                event_ts = Some(row_ts);
            }
        }
        if values.is_empty() {
            Ok((None, None))
        } else {
            Ok((event_ts, Some(values)))
        }
    }

    async fn create_table(&self, table: &FeatureView) -> Result<()> {
        let session = self.session().await?;
        let fqtable = fq_table_name(&self.config.keyspace, &self.project, table);
        let create_cql = CqlOperation::Create.render(&fqtable, None);
        info!("Creating table {}.", fqtable);
        session
            .query_unpaged(create_cql, ())
            .await
            .with_context(|| format!("Failed to create table {}", fqtable))?;
        Ok(())
    }

    async fn drop_table(&self, table: &FeatureView) -> Result<()> {
        let session = self.session().await?;
        let fqtable = fq_table_name(&self.config.keyspace, &self.project, table);
        let drop_cql = CqlOperation::Drop.render(&fqtable, None);
        info!("Deleting table {}.", fqtable);
        session
            .query_unpaged(drop_cql, ())
            .await
            .with_context(|| format!("Failed to drop table {}", fqtable))?;
        Ok(())
    }
}

#[async_trait]
impl OnlineStore for CassandraOnlineStore {
    async fn online_write_batch(
        &self,
        table: &FeatureView,
        data: &[FeatureBatch],
        progress: Option<&ProgressHandler>,
    ) -> Result<()> {
        let fqtable = fq_table_name(&self.config.keyspace, &self.project, table);
        for batch in data {
            let entity_key_hex =
                serialize_key_hex(&batch.entity_key, self.serialization_version)?;
            self.write_rows(&fqtable, &entity_key_hex, batch).await?;
            if let Some(progress) = progress {
                progress(1);
            }
        }
        Ok(())
    }

    async fn online_read(
        &self,
        table: &FeatureView,
        entity_keys: &[EntityKey],
        requested_features: Option<&[String]>,
    ) -> Result<Vec<ReadRow>> {
        let fqtable = fq_table_name(&self.config.keyspace, &self.project, table);
        let mut result = Vec::with_capacity(entity_keys.len());
        for entity_key in entity_keys {
            let entity_key_hex = serialize_key_hex(entity_key, self.serialization_version)?;
            let row = self
                .read_rows_by_entity_key(&fqtable, &entity_key_hex, requested_features)
                .await?;
            result.push(row);
        }
        Ok(result)
    }

    async fn update(
        &self,
        tables_to_delete: &[FeatureView],
        tables_to_keep: &[FeatureView],
        _entities_to_delete: &[Entity],
        _entities_to_keep: &[Entity],
        _partial: bool,
    ) -> Result<()> {
        for table in tables_to_keep {
            self.create_table(table).await?;
        }
        for table in tables_to_delete {
            self.drop_table(table).await?;
        }
        Ok(())
    }

    async fn teardown(&self, tables: &[FeatureView], _entities: &[Entity]) -> Result<()> {
        for table in tables {
            self.drop_table(table).await?;
        }
        Ok(())
    }
}

/// Open the one session this store will use, against either the host list or
/// the secure connect bundle.
async fn connect_session(config: &CassandraStoreConfig) -> Result<Session> {
    match &config.hosts {
        Some(hosts) => {
            let port = config.port();
            let nodes: Vec<String> = hosts.iter().map(|host| format!("{host}:{port}")).collect();
            let mut builder = SessionBuilder::new()
                .known_nodes(&nodes)
                .use_keyspace(config.keyspace.as_str(), true);
            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder = builder.user(username.as_str(), password.as_str());
            }
            builder.build().await.with_context(|| {
                format!(
                    "Cannot establish Cassandra connection to keyspace '{}'",
                    config.keyspace
                )
            })
        }
        None => connect_bundle_session(config).await,
    }
}

#[cfg(feature = "astra")]
async fn connect_bundle_session(config: &CassandraStoreConfig) -> Result<Session> {
    use scylla::CloudSessionBuilder;
    use std::path::Path;

    let bundle_path = config.secure_bundle_path.as_deref().unwrap_or_default();
    let mut builder = CloudSessionBuilder::new(Path::new(bundle_path))
        .with_context(|| format!("Cannot read secure connect bundle '{}'", bundle_path))?
        .use_keyspace(config.keyspace.as_str(), true);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.user(username.as_str(), password.as_str());
    }
    builder.build().await.with_context(|| {
        format!(
            "Cannot establish Astra DB connection to keyspace '{}'",
            config.keyspace
        )
    })
}

#[cfg(not(feature = "astra"))]
async fn connect_bundle_session(config: &CassandraStoreConfig) -> Result<Session> {
    anyhow::bail!(
        "This build does not support 'secure_bundle_path' connections to keyspace '{}': \
         enable the 'astra' crate feature",
        config.keyspace
    )
}

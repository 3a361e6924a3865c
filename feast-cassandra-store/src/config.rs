use crate::error::CassandraConfigError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CASSANDRA_PORT: u16 = 9042;

/// Connection settings for a Cassandra cluster or an Astra DB instance.
///
/// Exactly one of `hosts` and `secure_bundle_path` must be provided; which one
/// decides whether the session is opened against a regular cluster or from a
/// secure connect bundle. `username`/`password` must be given both or neither
/// (for Astra they are the Client ID and Client Secret of the database token).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CassandraStoreConfig {
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    #[serde(default)]
    pub secure_bundle_path: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub keyspace: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CassandraStoreConfig {
    /// Consistency checks, in order. All of them run locally, so a broken
    /// configuration fails before any network attempt.
    pub fn validate(&self) -> Result<(), CassandraConfigError> {
        if !(self.has_hosts() || self.has_secure_bundle()) || self.keyspace.is_empty() {
            return Err(CassandraConfigError::NotConfigured);
        }
        if self.has_hosts() && self.has_secure_bundle() {
            return Err(CassandraConfigError::Misconfigured);
        }
        if self.username.is_some() ^ self.password.is_some() {
            return Err(CassandraConfigError::InconsistentAuth);
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_CASSANDRA_PORT)
    }

    fn has_hosts(&self) -> bool {
        self.hosts.as_ref().is_some_and(|hosts| !hosts.is_empty())
    }

    fn has_secure_bundle(&self) -> bool {
        self.secure_bundle_path
            .as_ref()
            .is_some_and(|path| !path.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnlineStoreConfig {
    Sqlite { path: String },
    Cassandra(CassandraStoreConfig),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum EntityKeySerializationVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl From<EntityKeySerializationVersion> for u64 {
    fn from(value: EntityKeySerializationVersion) -> Self {
        match value {
            EntityKeySerializationVersion::V1 => 1,
            EntityKeySerializationVersion::V2 => 2,
            EntityKeySerializationVersion::V3 => 3,
        }
    }
}

impl TryFrom<u64> for EntityKeySerializationVersion {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EntityKeySerializationVersion::V1),
            2 => Ok(EntityKeySerializationVersion::V2),
            3 => Ok(EntityKeySerializationVersion::V3),
            _ => Err(format!(
                "unsupported entity_key_serialization_version {}",
                value
            )),
        }
    }
}

/// The per-repository configuration handed over by the orchestration layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoConfig {
    pub project: String,
    pub online_store: OnlineStoreConfig,
    #[serde(default)]
    pub entity_key_serialization_version: EntityKeySerializationVersion,
}

impl RepoConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Err(anyhow!("Empty configuration file"));
        }
        let config: RepoConfig = serde_saphyr::from_str(yaml).map_err(|err| anyhow!(err))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn parse_config_cassandra_hosts() -> Result<()> {
        let project_dir = env!("CARGO_MANIFEST_DIR");
        let config_path = format!("{}/test_data/cassandra_hosts.yaml", project_dir);
        let yaml_str = fs::read_to_string(config_path)?;
        let repo_config = RepoConfig::from_yaml_str(&yaml_str)?;
        assert_eq!(repo_config.project, "driver_stats");
        let expected_online_store = OnlineStoreConfig::Cassandra(CassandraStoreConfig {
            hosts: Some(vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]),
            secure_bundle_path: None,
            port: Some(9042),
            keyspace: "feast_keyspace".to_string(),
            username: Some("feast_rw".to_string()),
            password: Some("feast_rw_secret".to_string()),
        });
        assert_eq!(repo_config.online_store, expected_online_store);
        assert_eq!(
            repo_config.entity_key_serialization_version,
            EntityKeySerializationVersion::V3
        );
        Ok(())
    }

    #[test]
    fn parse_config_astra_bundle() -> Result<()> {
        let project_dir = env!("CARGO_MANIFEST_DIR");
        let config_path = format!("{}/test_data/astra_bundle.yaml", project_dir);
        let yaml_str = fs::read_to_string(config_path)?;
        let repo_config = RepoConfig::from_yaml_str(&yaml_str)?;
        assert_eq!(repo_config.project, "driver_stats");
        let OnlineStoreConfig::Cassandra(cassandra_config) = &repo_config.online_store else {
            panic!("expected a cassandra online store config");
        };
        assert_eq!(
            cassandra_config.secure_bundle_path.as_deref(),
            Some("/secrets/secure-connect-feast.zip")
        );
        assert_eq!(cassandra_config.hosts, None);
        assert_eq!(cassandra_config.keyspace, "feast_keyspace");
        cassandra_config.validate()?;
        Ok(())
    }

    #[test]
    fn validate_requires_contact_points_and_keyspace() {
        let config = CassandraStoreConfig::default();
        assert_eq!(config.validate(), Err(CassandraConfigError::NotConfigured));

        // an empty host list is as good as no hosts at all
        let config = CassandraStoreConfig {
            hosts: Some(vec![]),
            keyspace: "feast_keyspace".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(CassandraConfigError::NotConfigured));

        let config = CassandraStoreConfig {
            hosts: Some(vec!["10.0.0.1".to_string()]),
            keyspace: String::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(CassandraConfigError::NotConfigured));
    }

    #[test]
    fn validate_rejects_hosts_and_bundle_together() {
        let config = CassandraStoreConfig {
            hosts: Some(vec!["10.0.0.1".to_string()]),
            secure_bundle_path: Some("/secrets/bundle.zip".to_string()),
            keyspace: "feast_keyspace".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(CassandraConfigError::Misconfigured));
    }

    #[test]
    fn validate_rejects_partial_auth() {
        let config = CassandraStoreConfig {
            hosts: Some(vec!["10.0.0.1".to_string()]),
            keyspace: "feast_keyspace".to_string(),
            username: Some("feast_rw".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(CassandraConfigError::InconsistentAuth)
        );
    }

    #[test]
    fn validate_accepts_hosts_without_auth() {
        let config = CassandraStoreConfig {
            hosts: Some(vec!["10.0.0.1".to_string()]),
            keyspace: "feast_keyspace".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.port(), DEFAULT_CASSANDRA_PORT);
    }
}

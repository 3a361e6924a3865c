use std::fmt::{self, Display, Formatter};

/// Configuration failures detected before any connection attempt.
///
/// These are never retried: the store refuses to construct until the
/// configuration is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CassandraConfigError {
    UnexpectedConfigurationObject,
    NotConfigured,
    Misconfigured,
    InconsistentAuth,
}

impl Display for CassandraConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedConfigurationObject => write!(
                f,
                "Unexpected configuration object (not a Cassandra online store configuration)"
            ),
            Self::NotConfigured => write!(
                f,
                "Inconsistent Cassandra configuration: provide exactly one between \
                 'hosts' and 'secure_bundle_path' and a 'keyspace'"
            ),
            Self::Misconfigured => write!(
                f,
                "Inconsistent Cassandra configuration: provide either 'hosts' or \
                 'secure_bundle_path', not both"
            ),
            Self::InconsistentAuth => write!(
                f,
                "Username and password for Cassandra must be provided either both or none"
            ),
        }
    }
}

impl std::error::Error for CassandraConfigError {}

//! CQL text for the fixed set of statements the store issues, plus the cache
//! key under which the prepared ones are memoized.

use crate::model::FeatureView;

/// Columns the read path projects, in bind order.
pub const READ_PROJECTION: &[&str] = &["feature_name", "value", "event_ts"];

/// Fully-qualified, quoted table name for a feature view.
///
/// Quoting keeps keyspace and project/view names with reserved characters or
/// mixed case from breaking the statement text.
pub fn fq_table_name(keyspace: &str, project: &str, table: &FeatureView) -> String {
    format!("\"{}\".\"{}_{}\"", keyspace, project, table.name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CqlOperation {
    /// Row upsert without `created_ts`.
    Insert4,
    /// Row upsert including `created_ts`.
    Insert5,
    Select,
    Create,
    Drop,
}

impl CqlOperation {
    /// Insert variant for a batch entry. Entries without a creation timestamp
    /// take the 4-column statement so that no explicit null `created_ts` is
    /// ever written: a null write would leave a tombstone behind.
    pub fn insert_variant(with_created_ts: bool) -> Self {
        if with_created_ts {
            CqlOperation::Insert5
        } else {
            CqlOperation::Insert4
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CqlOperation::Insert4 => "insert4",
            CqlOperation::Insert5 => "insert5",
            CqlOperation::Select => "select",
            CqlOperation::Create => "create",
            CqlOperation::Drop => "drop",
        }
    }

    /// DML statements are prepared and cached; DDL is rare enough that
    /// preparing it gains nothing.
    pub fn is_prepared(&self) -> bool {
        matches!(
            self,
            CqlOperation::Insert4 | CqlOperation::Insert5 | CqlOperation::Select
        )
    }

    /// Render the statement text for a table. `columns` only applies to
    /// `Select` and falls back to `*` when absent.
    pub fn render(&self, fqtable: &str, columns: Option<&[&str]>) -> String {
        match self {
            CqlOperation::Insert4 => format!(
                "INSERT INTO {fqtable} (feature_name, value, entity_key, event_ts) \
                 VALUES (?, ?, ?, ?)"
            ),
            CqlOperation::Insert5 => format!(
                "INSERT INTO {fqtable} (feature_name, value, entity_key, event_ts, created_ts) \
                 VALUES (?, ?, ?, ?, ?)"
            ),
            CqlOperation::Select => {
                let columns = columns
                    .filter(|cols| !cols.is_empty())
                    .map(|cols| cols.join(", "))
                    .unwrap_or_else(|| "*".to_string());
                format!("SELECT {columns} FROM {fqtable} WHERE entity_key = ?")
            }
            CqlOperation::Create => format!(
                "CREATE TABLE IF NOT EXISTS {fqtable} \
                 (entity_key TEXT, feature_name TEXT, value BLOB, \
                 event_ts TIMESTAMP, created_ts TIMESTAMP, \
                 PRIMARY KEY ((entity_key), feature_name)) \
                 WITH CLUSTERING ORDER BY (feature_name ASC)"
            ),
            CqlOperation::Drop => format!("DROP TABLE IF EXISTS {fqtable}"),
        }
    }
}

/// Cache key for prepared statements: operation, table, and the sorted
/// ancillary parameters of the rendered text (for selects, the projection).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
    operation: CqlOperation,
    fqtable: String,
    params: Vec<String>,
}

impl StatementKey {
    pub fn new(operation: CqlOperation, fqtable: &str, columns: Option<&[&str]>) -> Self {
        let mut params: Vec<String> = columns
            .map(|cols| vec![cols.join(", ")])
            .unwrap_or_default();
        params.sort();
        Self {
            operation,
            fqtable: fqtable.to_string(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fq_table_name_quotes_keyspace_and_table() {
        let table = FeatureView::new("driver_hourly_stats");
        assert_eq!(
            fq_table_name("feast_keyspace", "driver_stats", &table),
            "\"feast_keyspace\".\"driver_stats_driver_hourly_stats\""
        );
    }

    #[test]
    fn insert_variant_follows_created_ts_presence() {
        assert_eq!(CqlOperation::insert_variant(false), CqlOperation::Insert4);
        assert_eq!(CqlOperation::insert_variant(true), CqlOperation::Insert5);
    }

    #[test]
    fn only_dml_is_prepared() {
        assert!(CqlOperation::Insert4.is_prepared());
        assert!(CqlOperation::Insert5.is_prepared());
        assert!(CqlOperation::Select.is_prepared());
        assert!(!CqlOperation::Create.is_prepared());
        assert!(!CqlOperation::Drop.is_prepared());
    }

    #[test]
    fn render_insert_statements() {
        let fqtable = "\"ks\".\"p_fv\"";
        assert_eq!(
            CqlOperation::Insert4.render(fqtable, None),
            "INSERT INTO \"ks\".\"p_fv\" (feature_name, value, entity_key, event_ts) \
             VALUES (?, ?, ?, ?)"
        );
        assert_eq!(
            CqlOperation::Insert5.render(fqtable, None),
            "INSERT INTO \"ks\".\"p_fv\" \
             (feature_name, value, entity_key, event_ts, created_ts) \
             VALUES (?, ?, ?, ?, ?)"
        );
    }

    #[test]
    fn render_select_with_and_without_projection() {
        let fqtable = "\"ks\".\"p_fv\"";
        assert_eq!(
            CqlOperation::Select.render(fqtable, Some(READ_PROJECTION)),
            "SELECT feature_name, value, event_ts FROM \"ks\".\"p_fv\" WHERE entity_key = ?"
        );
        assert_eq!(
            CqlOperation::Select.render(fqtable, None),
            "SELECT * FROM \"ks\".\"p_fv\" WHERE entity_key = ?"
        );
    }

    #[test]
    fn render_ddl_statements_are_idempotent() {
        let fqtable = "\"ks\".\"p_fv\"";
        assert!(
            CqlOperation::Create
                .render(fqtable, None)
                .starts_with("CREATE TABLE IF NOT EXISTS")
        );
        assert!(
            CqlOperation::Create
                .render(fqtable, None)
                .ends_with("WITH CLUSTERING ORDER BY (feature_name ASC)")
        );
        assert_eq!(
            CqlOperation::Drop.render(fqtable, None),
            "DROP TABLE IF EXISTS \"ks\".\"p_fv\""
        );
    }

    #[test]
    fn statement_keys_discriminate_operation_table_and_projection() {
        let base = StatementKey::new(CqlOperation::Select, "\"ks\".\"p_fv\"", Some(READ_PROJECTION));
        let same = StatementKey::new(CqlOperation::Select, "\"ks\".\"p_fv\"", Some(READ_PROJECTION));
        assert_eq!(base, same);

        let other_table =
            StatementKey::new(CqlOperation::Select, "\"ks\".\"p_other\"", Some(READ_PROJECTION));
        assert_ne!(base, other_table);

        let other_projection =
            StatementKey::new(CqlOperation::Select, "\"ks\".\"p_fv\"", Some(&["value"]));
        assert_ne!(base, other_projection);

        let other_operation = StatementKey::new(CqlOperation::Insert4, "\"ks\".\"p_fv\"", None);
        assert_ne!(base, other_operation);
    }
}

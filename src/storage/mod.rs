use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, Row};
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::error::StoreError;
use crate::records::{Category, Record, RecordFields, RecordId};
use crate::search::{Predicate, RecordQuery, SortDirection};

mod schema;

#[cfg(test)]
pub mod testing;

const DELETE_CHUNK: usize = 500;

/// Narrow interface the record views and CLI need from a backing store.
pub trait RecordStore: Send + Sync {
    fn list(&self, category: Category, query: &RecordQuery) -> Result<Vec<Record>, StoreError>;

    fn insert(&self, fields: &RecordFields) -> Result<Record, StoreError>;

    fn update(&self, id: &RecordId, fields: &RecordFields) -> Result<(), StoreError>;

    /// Removes every id in one transaction; returns the number of rows removed.
    fn delete_many(&self, category: Category, ids: &[RecordId]) -> Result<usize, StoreError>;
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.connect()?;
        f(&mut conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn insert_at(
        &self,
        fields: &RecordFields,
        created_at: OffsetDateTime,
    ) -> Result<Record, StoreError> {
        let category = fields.category();
        let id = RecordId::generate();
        let columns = category
            .fields()
            .iter()
            .map(|spec| spec.column)
            .collect::<Vec<_>>();
        let placeholders = (0..columns.len() + 2)
            .map(|idx| format!("?{}", idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} (id, created_at, {columns}) VALUES ({placeholders})",
            table = category.table(),
            columns = columns.join(", "),
        );
        let mut values = vec![
            Value::Text(id.as_str().to_string()),
            Value::Integer(to_millis(created_at)),
        ];
        values.extend(
            fields
                .values()
                .into_iter()
                .map(|value| Value::Text(value.to_string())),
        );
        self.with_connection(|conn| {
            conn.execute(&sql, params_from_iter(values))?;
            Ok(())
        })?;
        tracing::debug!(category = %category, id = %id, "record inserted");
        Ok(Record {
            id,
            created_at: from_millis(to_millis(created_at)).unwrap_or(created_at),
            fields: fields.clone(),
        })
    }
}

impl RecordStore for StorageHandle {
    fn list(&self, category: Category, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        let (sql, values) = build_select(category, query)?;
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params_from_iter(values), |row| map_record(category, row))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    fn insert(&self, fields: &RecordFields) -> Result<Record, StoreError> {
        self.insert_at(fields, OffsetDateTime::now_utc())
    }

    fn update(&self, id: &RecordId, fields: &RecordFields) -> Result<(), StoreError> {
        let category = fields.category();
        let assignments = category
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, spec)| format!("{} = ?{}", spec.column, idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} SET {assignments} WHERE id = ?{id_param}",
            table = category.table(),
            id_param = category.fields().len() + 1,
        );
        let mut values = fields
            .values()
            .into_iter()
            .map(|value| Value::Text(value.to_string()))
            .collect::<Vec<_>>();
        values.push(Value::Text(id.as_str().to_string()));
        let updated = self.with_connection(|conn| Ok(conn.execute(&sql, params_from_iter(values))?))?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn delete_many(&self, category: Category, ids: &[RecordId]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0usize;
            for chunk in ids.chunks(DELETE_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "DELETE FROM {table} WHERE id IN ({placeholders})",
                    table = category.table()
                );
                removed += tx.execute(&sql, params_from_iter(chunk.iter().map(RecordId::as_str)))?;
            }
            tx.commit()?;
            Ok(removed)
        })
    }
}

fn build_select(category: Category, query: &RecordQuery) -> Result<(String, Vec<Value>), StoreError> {
    let columns = category
        .fields()
        .iter()
        .map(|spec| spec.column)
        .collect::<Vec<_>>()
        .join(", ");
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    for predicate in &query.predicates {
        match predicate {
            Predicate::Contains { column, needle } => {
                let Some(spec) = category.field(column) else {
                    return Err(StoreError::InvalidQuery(format!(
                        "unknown column '{column}' for {category} records"
                    )));
                };
                clauses.push(format!("fold({}) LIKE fold(?) ESCAPE '\\'", spec.column));
                values.push(Value::Text(format!("%{}%", escape_like(needle))));
            }
            Predicate::CreatedWithin(range) => {
                if let Some(from) = range.from {
                    clauses.push("created_at >= ?".to_string());
                    values.push(Value::Integer(to_millis(from)));
                }
                if let Some(to) = range.to {
                    clauses.push("created_at < ?".to_string());
                    values.push(Value::Integer(to_millis(to)));
                }
            }
        }
    }
    let direction = match query.order {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    };
    let mut sql = format!(
        "SELECT id, created_at, {columns} FROM {table}",
        table = category.table()
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY created_at {direction}, rowid {direction}"
    ));
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }
    Ok((sql, values))
}

fn map_record(category: Category, row: &Row<'_>) -> rusqlite::Result<Record> {
    let id: String = row.get(0)?;
    let created_ms: i64 = row.get(1)?;
    let created_at = from_millis(created_ms).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(err))
    })?;
    let mut values = Vec::with_capacity(category.fields().len());
    for idx in 0..category.fields().len() {
        values.push(row.get::<_, String>(idx + 2)?);
    }
    Ok(Record {
        id: RecordId::from(id),
        created_at,
        fields: RecordFields::from_values(category, values),
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn to_millis(instant: OffsetDateTime) -> i64 {
    (instant.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage).context("configuring database connection")?;
    schema::apply(&conn).context("applying schema migrations")?;
    tracing::info!(path = %db_path.display(), "record store ready");
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<(), StoreError> {
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    // SQLite's lower() and LIKE only fold ASCII letters.
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|value| value.to_lowercase())),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::temp_paths;
    use crate::search::{build_query, FilterState, RangeFilter};
    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use time::macros::{date, datetime};
    use time::Month;

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let storage = init(&paths, &StorageOptions::default())?;
        Ok((temp, storage))
    }

    fn nhis(opd: &str, nhis: &str, ccc: &str) -> RecordFields {
        RecordFields::from_values(Category::Nhis, [opd, nhis, ccc])
    }

    #[test]
    fn newest_private_record_is_listed_first_when_browsing() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.insert_at(
            &RecordFields::from_values(Category::Private, ["Old", "M1", "Co", "OPD-0", "0"]),
            datetime!(2023-01-01 8:00 UTC),
        )?;
        let jane = storage.insert(&RecordFields::from_values(
            Category::Private,
            ["Jane Doe", "M123", "Acme", "OPD-1", "0550000000"],
        ))?;

        let query = build_query(Category::Private, &FilterState::default(), 100);
        let records = storage.list(Category::Private, &query)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, jane.id);
        assert_eq!(records[0].fields.get("name"), Some("Jane Doe"));
        Ok(())
    }

    #[test]
    fn browsing_caps_results_and_breaks_timestamp_ties_by_insertion() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let at = datetime!(2024-06-01 9:00 UTC);
        let mut last = None;
        for i in 0..5 {
            last = Some(storage.insert_at(&nhis(&format!("OPD-{i}"), "N", "C"), at)?);
        }
        let records = storage.list(Category::Nhis, &RecordQuery::recent(3))?;
        assert_eq!(records.len(), 3);
        assert_eq!(Some(&records[0].id), last.as_ref().map(|r| &r.id));
        Ok(())
    }

    #[test]
    fn text_filters_are_case_insensitive_and_literal() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.insert(&nhis("OPD-100", "NH-7", "C1"))?;
        storage.insert(&nhis("opd-200", "NH-8", "C2"))?;
        storage.insert(&nhis("X%Y", "NH-9", "C3"))?;

        let mut filter = FilterState::default();
        filter.terms[0] = "OpD".into();
        let hits = storage.list(Category::Nhis, &build_query(Category::Nhis, &filter, 100))?;
        assert_eq!(hits.len(), 2);

        filter.terms[0] = "%".into();
        let hits = storage.list(Category::Nhis, &build_query(Category::Nhis, &filter, 100))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.get("opd_number"), Some("X%Y"));

        filter.terms[0] = "opd".into();
        filter.terms[1] = "nh-8".into();
        let hits = storage.list(Category::Nhis, &build_query(Category::Nhis, &filter, 100))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.get("ccc"), Some("C2"));
        Ok(())
    }

    #[test]
    fn text_filters_fold_non_ascii_letters() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.insert(&RecordFields::from_values(
            Category::Private,
            ["ÉLODIE Ásante", "M-9", "Acme", "OPD-9", "0240000000"],
        ))?;
        storage.insert(&RecordFields::from_values(
            Category::Private,
            ["Elodie Mensah", "M-10", "Acme", "OPD-10", "0240000001"],
        ))?;

        let mut filter = FilterState::default();
        filter.terms[1] = "élodie".into();
        let hits = storage.list(Category::Private, &build_query(Category::Private, &filter, 100))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.get("name"), Some("ÉLODIE Ásante"));

        filter.terms[1] = "ÉLODIE ÁSANTE".into();
        let hits = storage.list(Category::Private, &build_query(Category::Private, &filter, 100))?;
        assert_eq!(hits.len(), 1);

        filter.terms[1] = "ásante".into();
        let hits = storage.list(Category::Private, &build_query(Category::Private, &filter, 100))?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[test]
    fn date_filters_use_half_open_bounds() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        storage.insert_at(&nhis("feb", "N", "C"), datetime!(2024-02-29 23:59:59 UTC))?;
        storage.insert_at(&nhis("mar-start", "N", "C"), datetime!(2024-03-01 0:00 UTC))?;
        storage.insert_at(&nhis("mar-end", "N", "C"), datetime!(2024-03-31 23:59:59 UTC))?;
        storage.insert_at(&nhis("apr", "N", "C"), datetime!(2024-04-01 0:00 UTC))?;
        storage.insert_at(&nhis("dec-31", "N", "C"), datetime!(2024-12-31 18:00 UTC))?;

        let march = FilterState {
            year: Some(2024),
            month: Some(Month::March),
            ..FilterState::default()
        };
        let hits = storage.list(Category::Nhis, &build_query(Category::Nhis, &march, 100))?;
        let opds: Vec<_> = hits.iter().filter_map(|r| r.fields.get("opd_number")).collect();
        assert_eq!(opds, vec!["mar-end", "mar-start"]);

        let year = FilterState {
            year: Some(2024),
            ..FilterState::default()
        };
        let hits = storage.list(Category::Nhis, &build_query(Category::Nhis, &year, 100))?;
        assert_eq!(hits.len(), 5);

        let day = FilterState {
            date: Some(date!(2024 - 03 - 31)),
            ..FilterState::default()
        };
        let hits = storage.list(Category::Nhis, &build_query(Category::Nhis, &day, 100))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.get("opd_number"), Some("mar-end"));
        Ok(())
    }

    #[test]
    fn update_replaces_fields_and_reports_missing_rows() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let record = storage.insert(&nhis("OPD-1", "N-1", "C-1"))?;
        storage.update(&record.id, &nhis("OPD-1b", "N-1b", "C-1b"))?;
        let listed = storage.list(Category::Nhis, &RecordQuery::recent(10))?;
        assert_eq!(listed[0].fields, nhis("OPD-1b", "N-1b", "C-1b"));
        assert_eq!(listed[0].created_at, record.created_at);

        let missing = storage.update(&RecordId::from("nope"), &nhis("a", "b", "c"));
        assert_matches!(missing, Err(StoreError::NotFound(id)) if id.as_str() == "nope");
        Ok(())
    }

    #[test]
    fn delete_many_removes_only_requested_ids() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let a = storage.insert(&nhis("a", "1", "x"))?;
        let b = storage.insert(&nhis("b", "2", "x"))?;
        let c = storage.insert(&nhis("c", "3", "x"))?;
        let removed = storage.delete_many(Category::Nhis, &[a.id.clone(), c.id.clone()])?;
        assert_eq!(removed, 2);
        let left = storage.list(Category::Nhis, &RecordQuery::recent(10))?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, b.id);
        assert_eq!(storage.delete_many(Category::Nhis, &[])?, 0);
        Ok(())
    }

    #[test]
    fn unknown_columns_are_rejected() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let query = RecordQuery {
            predicates: vec![Predicate::Contains {
                column: "name",
                needle: "x".into(),
            }],
            order: SortDirection::Descending,
            limit: None,
        };
        assert_matches!(
            storage.list(Category::Nhis, &query),
            Err(StoreError::InvalidQuery(_))
        );
        let empty = RecordQuery {
            predicates: vec![Predicate::CreatedWithin(RangeFilter::default())],
            ..RecordQuery::recent(5)
        };
        assert!(storage.list(Category::Nhis, &empty)?.is_empty());
        Ok(())
    }
}

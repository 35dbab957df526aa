//! Document store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/save/find/count/destroy over documents of any model.
//! - Maintain `createdAt`/`updatedAt` and the revision counter.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every read filters on `deleted_at` according to `DeletedFilter`.
//! - With optimistic concurrency, `save` only succeeds against the
//!   revision the caller loaded.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::document::{now_epoch_ms, Document, DocumentId};
use crate::registry::Model;
use crate::store::migrations::{current_user_version, latest_version};
use crate::store::DbError;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    model,
    body,
    version,
    created_at,
    updated_at,
    deleted_at
FROM documents";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "model",
    "body",
    "version",
    "created_at",
    "updated_at",
    "deleted_at",
];

static FILTER_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid filter field regex"));

pub type StoreResult<T> = Result<T, StoreError>;

/// Store error for document persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Json(serde_json::Error),
    NotFound(DocumentId),
    Duplicate(DocumentId),
    /// Revision on disk differs from the one the caller loaded.
    VersionConflict {
        id: DocumentId,
        expected: u64,
    },
    ModelMismatch {
        expected: String,
        actual: String,
    },
    InvalidQuery(String),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "document body encoding failed: {err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::Duplicate(id) => write!(f, "document already exists: {id}"),
            Self::VersionConflict { id, expected } => write!(
                f,
                "document {id} was modified concurrently (expected version {expected})"
            ),
            Self::ModelMismatch { expected, actual } => write!(
                f,
                "document belongs to model `{actual}`, not `{expected}`"
            ),
            Self::InvalidQuery(message) => write!(f, "invalid document query: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column missing: {table}.{column}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Soft-delete visibility of a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedFilter {
    /// Active documents only.
    #[default]
    Exclude,
    /// Soft-deleted documents only.
    Only,
    /// Both active and soft-deleted documents.
    Include,
}

impl DeletedFilter {
    fn sql(self) -> &'static str {
        match self {
            Self::Exclude => " AND deleted_at IS NULL",
            Self::Only => " AND deleted_at IS NOT NULL",
            Self::Include => "",
        }
    }
}

/// Query options for listing and counting documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub deleted: DeletedFilter,
    /// Equality filters on top-level scalar fields.
    pub filters: Vec<(String, Value)>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deleted(mut self, deleted: DeletedFilter) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn paginate(mut self, limit: Option<u32>, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Persistence contract consumed by the schema layer.
pub trait DocumentStore {
    /// Inserts a new document, stamping timestamps when enabled.
    fn insert(&self, model: &Model, document: &mut Document) -> StoreResult<DocumentId>;
    /// Persists field and lifecycle changes of an existing document.
    fn save(&self, model: &Model, document: &mut Document) -> StoreResult<()>;
    fn find_by_id(
        &self,
        model: &Model,
        id: DocumentId,
        deleted: DeletedFilter,
    ) -> StoreResult<Option<Document>>;
    fn find(&self, model: &Model, query: &DocumentQuery) -> StoreResult<Vec<Document>>;
    fn count(&self, model: &Model, query: &DocumentQuery) -> StoreResult<u64>;
    /// Physically removes a document.
    fn destroy(&self, model: &Model, id: DocumentId) -> StoreResult<()>;
}

/// SQLite-backed document store.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Wraps a connection opened through `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        let columns = table_columns(conn, "documents")?;
        if columns.is_empty() {
            return Err(StoreError::MissingRequiredTable("documents"));
        }
        if let Some(column) = REQUIRED_COLUMNS
            .iter()
            .find(|column| !columns.iter().any(|existing| existing.as_str() == **column))
        {
            return Err(StoreError::MissingRequiredColumn {
                table: "documents",
                column: *column,
            });
        }

        Ok(Self { conn })
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn insert(&self, model: &Model, document: &mut Document) -> StoreResult<DocumentId> {
        ensure_model(model, document)?;

        let stamp = model.schema().timestamps().then(now_epoch_ms);
        let body = serde_json::to_string(&document.fields)?;
        let result = self.conn.execute(
            "INSERT INTO documents (
                id,
                model,
                body,
                version,
                created_at,
                updated_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?4, ?5);",
            params![
                document.id.to_string(),
                model.name(),
                body,
                stamp,
                document.deleted_at,
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Duplicate(document.id));
            }
            Err(err) => return Err(err.into()),
        }

        document.version = 0;
        document.created_at = stamp;
        document.updated_at = stamp;
        debug!(
            "event=document_insert module=store status=ok model={} id={}",
            model.name(),
            document.id
        );
        Ok(document.id)
    }

    fn save(&self, model: &Model, document: &mut Document) -> StoreResult<()> {
        ensure_model(model, document)?;

        let next_version = document.version + 1;
        let updated_at = if model.schema().timestamps() {
            Some(now_epoch_ms())
        } else {
            document.updated_at
        };
        let body = serde_json::to_string(&document.fields)?;
        let occ = model.schema().options().optimistic_concurrency;

        let mut sql = String::from(
            "UPDATE documents
             SET
                body = ?1,
                version = ?2,
                updated_at = ?3,
                deleted_at = ?4
             WHERE id = ?5 AND model = ?6",
        );
        let mut bind_values = vec![
            SqlValue::Text(body),
            SqlValue::Integer(to_sql_version(next_version)?),
            updated_at.map_or(SqlValue::Null, SqlValue::Integer),
            document.deleted_at.map_or(SqlValue::Null, SqlValue::Integer),
            SqlValue::Text(document.id.to_string()),
            SqlValue::Text(model.name().to_string()),
        ];
        if occ {
            sql.push_str(" AND version = ?7");
            bind_values.push(SqlValue::Integer(to_sql_version(document.version)?));
        }

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            let exists = self.exists(model, document.id)?;
            return Err(if occ && exists {
                StoreError::VersionConflict {
                    id: document.id,
                    expected: document.version,
                }
            } else {
                StoreError::NotFound(document.id)
            });
        }

        document.version = next_version;
        document.updated_at = updated_at;
        debug!(
            "event=document_save module=store status=ok model={} id={} version={}",
            model.name(),
            document.id,
            next_version
        );
        Ok(())
    }

    fn find_by_id(
        &self,
        model: &Model,
        id: DocumentId,
        deleted: DeletedFilter,
    ) -> StoreResult<Option<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL} WHERE id = ?1 AND model = ?2{};",
            deleted.sql()
        ))?;

        let mut rows = stmt.query(params![id.to_string(), model.name()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_document_row(row)?));
        }

        Ok(None)
    }

    fn find(&self, model: &Model, query: &DocumentQuery) -> StoreResult<Vec<Document>> {
        let (where_sql, mut bind_values) = build_where(model, query)?;
        let mut sql = format!("{DOCUMENT_SELECT_SQL}{where_sql} ORDER BY rowid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(SqlValue::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(SqlValue::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(SqlValue::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }

        Ok(documents)
    }

    fn count(&self, model: &Model, query: &DocumentQuery) -> StoreResult<u64> {
        let (where_sql, bind_values) = build_where(model, query)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM documents{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| StoreError::InvalidData(format!("negative count {count}")))
    }

    fn destroy(&self, model: &Model, id: DocumentId) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE id = ?1 AND model = ?2;",
            params![id.to_string(), model.name()],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        info!(
            "event=document_destroy module=store status=ok model={} id={}",
            model.name(),
            id
        );
        Ok(())
    }
}

impl SqliteDocumentStore<'_> {
    fn exists(&self, model: &Model, id: DocumentId) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1 AND model = ?2;",
                params![id.to_string(), model.name()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn ensure_model(model: &Model, document: &Document) -> StoreResult<()> {
    if document.model != model.name() {
        return Err(StoreError::ModelMismatch {
            expected: model.name().to_string(),
            actual: document.model.clone(),
        });
    }
    Ok(())
}

fn build_where(model: &Model, query: &DocumentQuery) -> StoreResult<(String, Vec<SqlValue>)> {
    let mut sql = String::from(" WHERE model = ?");
    let mut bind_values = vec![SqlValue::Text(model.name().to_string())];
    sql.push_str(query.deleted.sql());

    for (field, value) in &query.filters {
        if !FILTER_FIELD_RE.is_match(field) {
            return Err(StoreError::InvalidQuery(format!(
                "filter field `{field}` is not a plain top-level name"
            )));
        }
        let path = SqlValue::Text(format!("$.{field}"));
        let bound = match value {
            Value::Null => {
                sql.push_str(" AND json_extract(body, ?) IS NULL");
                bind_values.push(path);
                continue;
            }
            Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => SqlValue::Integer(integer),
                None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => SqlValue::Text(text.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(StoreError::InvalidQuery(format!(
                    "filter on `{field}` must compare a scalar value"
                )));
            }
        };
        sql.push_str(" AND json_extract(body, ?) = ?");
        bind_values.push(path);
        bind_values.push(bound);
    }

    Ok((sql, bind_values))
}

fn parse_document_row(row: &Row<'_>) -> StoreResult<Document> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid id value `{id_text}` in documents.id"))
    })?;

    let body: String = row.get("body")?;
    let fields = match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            return Err(StoreError::InvalidData(format!(
                "documents.body of `{id}` is not a JSON object"
            )));
        }
    };

    let version: i64 = row.get("version")?;
    let version = u64::try_from(version).map_err(|_| {
        StoreError::InvalidData(format!("invalid version `{version}` in documents.version"))
    })?;

    Ok(Document {
        id,
        model: row.get("model")?,
        fields,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
        version,
    })
}

fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn to_sql_version(version: u64) -> StoreResult<i64> {
    i64::try_from(version)
        .map_err(|_| StoreError::InvalidData(format!("version {version} exceeds storage range")))
}

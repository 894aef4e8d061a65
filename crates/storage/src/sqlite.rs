//! SQLite Storage - Persistent record store using SQLite
//!
//! Features:
//! - r2d2 connection pool, one pooled connection per operation
//! - UNIQUE constraint on `number` as the source of truth for key collisions
//! - Automatic schema creation
//! - Async-friendly using spawn_blocking

use async_trait::async_trait;
use dex_core::{Filter, Record, RecordDraft, RecordPatch, RecordQuery};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::trait_::{RecordStore, SharedRecordStore, StoreError, StoreResult, UpsertOutcome};

type SqlitePool = Pool<SqliteConnectionManager>;

const SELECT_COLUMNS: &str = "id, number, name, category_primary, category_secondary, \
     total, hp, attack, defense, sp_atk, sp_def, speed, generation, legendary";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(message.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// SQLite record store
#[derive(Clone)]
pub struct SqliteRecordStore {
    /// Database file path
    path: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path` with a pool of `pool_size`
    /// connections and initialize the schema
    pub async fn new(
        path: PathBuf,
        pool_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let path_clone = path.clone();
        let pool = tokio::task::spawn_blocking(move || {
            let manager = SqliteConnectionManager::file(&path_clone).with_init(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                // journal_mode answers with the mode it settled on
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            });
            let pool = Pool::builder()
                .max_size(pool_size.max(1))
                .build(manager)
                .map_err(|e| StoreError::Pool(e.to_string()))?;

            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            Self::init_schema(&conn)?;
            Ok::<_, StoreError>(pool)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        info!("SQLite record store initialized at: {:?}", path);

        Ok(Self { path, pool })
    }

    /// Initialize database schema
    fn init_schema(conn: &rusqlite::Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                category_primary TEXT,
                category_secondary TEXT,
                total INTEGER NOT NULL DEFAULT 0,
                hp INTEGER NOT NULL DEFAULT 0,
                attack INTEGER NOT NULL DEFAULT 0,
                defense INTEGER NOT NULL DEFAULT 0,
                sp_atk INTEGER NOT NULL DEFAULT 0,
                sp_def INTEGER NOT NULL DEFAULT 0,
                speed INTEGER NOT NULL DEFAULT 0,
                generation INTEGER NOT NULL DEFAULT 0,
                legendary INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_records_name ON records(name);
            "#,
        )
        .map_err(|e| StoreError::Migration(e.to_string()))
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking closure on a pooled connection
    ///
    /// The connection goes back to the pool when the closure returns, on
    /// success and on error alike.
    async fn run_sqlite<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        number: row.get(1)?,
        name: row.get(2)?,
        category_primary: row.get(3)?,
        category_secondary: row.get(4)?,
        total: row.get(5)?,
        hp: row.get(6)?,
        attack: row.get(7)?,
        defense: row.get(8)?,
        sp_atk: row.get(9)?,
        sp_def: row.get(10)?,
        speed: row.get(11)?,
        generation: row.get(12)?,
        legendary: row.get(13)?,
    })
}

fn select_by_number(conn: &rusqlite::Connection, number: i64) -> StoreResult<Option<Record>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM records WHERE number = ?");
    Ok(conn
        .query_row(&sql, [number], row_to_record)
        .optional()?)
}

fn insert_row(conn: &rusqlite::Connection, draft: &RecordDraft) -> StoreResult<Record> {
    conn.execute(
        r#"
        INSERT INTO records (
            number, name, category_primary, category_secondary, total, hp,
            attack, defense, sp_atk, sp_def, speed, generation, legendary
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        rusqlite::params![
            draft.number,
            draft.name,
            draft.category_primary,
            draft.category_secondary,
            draft.total,
            draft.hp,
            draft.attack,
            draft.defense,
            draft.sp_atk,
            draft.sp_def,
            draft.speed,
            draft.generation,
            draft.legendary,
        ],
    )?;
    Ok(Record::from_draft(conn.last_insert_rowid(), draft.clone()))
}

fn write_row(conn: &rusqlite::Connection, record: &Record) -> StoreResult<()> {
    conn.execute(
        r#"
        UPDATE records SET
            name = ?, category_primary = ?, category_secondary = ?, total = ?,
            hp = ?, attack = ?, defense = ?, sp_atk = ?, sp_def = ?, speed = ?,
            generation = ?, legendary = ?
        WHERE id = ?
        "#,
        rusqlite::params![
            record.name,
            record.category_primary,
            record.category_secondary,
            record.total,
            record.hp,
            record.attack,
            record.defense,
            record.sp_atk,
            record.sp_def,
            record.speed,
            record.generation,
            record.legendary,
            record.id,
        ],
    )?;
    Ok(())
}

/// Build the SELECT for a validated query. Column names come from the static
/// column mapping; the keyword, limit and offset are bound parameters.
fn build_query_sql(query: &RecordQuery) -> StoreResult<(String, Vec<Value>)> {
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM records");
    let mut params = Vec::new();

    match &query.filter {
        Some(Filter::IntegerEquals(column, value)) => {
            sql.push_str(&format!(" WHERE {} = ?", column.sql_name()));
            params.push(Value::Integer(*value));
        }
        Some(Filter::BooleanEquals(column, value)) => {
            sql.push_str(&format!(" WHERE {} = ?", column.sql_name()));
            params.push(Value::Integer(i64::from(*value)));
        }
        Some(Filter::TextContains(column, keyword)) => {
            // instr() keeps '%' and '_' in the keyword literal
            sql.push_str(&format!(
                " WHERE instr(lower({}), lower(?)) > 0",
                column.sql_name()
            ));
            params.push(Value::Text(keyword.clone()));
        }
        None => {}
    }

    sql.push_str(&format!(
        " ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
        query.sort.column.sql_name(),
        query.sort.direction.sql_keyword()
    ));
    let offset = i64::try_from(query.pagination.offset())
        .map_err(|_| StoreError::Database("offset out of range".to_string()))?;
    params.push(Value::Integer(i64::from(query.pagination.limit())));
    params.push(Value::Integer(offset));

    Ok((sql, params))
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, number: i64) -> StoreResult<Option<Record>> {
        self.run_sqlite(move |conn| select_by_number(conn, number)).await
    }

    async fn find_by_number_and_name(
        &self,
        number: i64,
        name: &str,
    ) -> StoreResult<Option<Record>> {
        let name = name.to_string();
        self.run_sqlite(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM records WHERE number = ? AND name = ?");
            Ok(conn
                .query_row(&sql, rusqlite::params![number, name], row_to_record)
                .optional()?)
        })
        .await
    }

    async fn insert(&self, draft: &RecordDraft) -> StoreResult<Record> {
        let draft = draft.clone();
        self.run_sqlite(move |conn| insert_row(conn, &draft)).await
    }

    async fn update(&self, number: i64, patch: &RecordPatch) -> StoreResult<Option<Record>> {
        let patch = patch.clone();
        self.run_sqlite(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut record) = select_by_number(&tx, number)? else {
                return Ok(None);
            };
            record.apply(&patch);
            write_row(&tx, &record)?;
            tx.commit()?;
            Ok(Some(record))
        })
        .await
    }

    async fn delete(&self, number: i64) -> StoreResult<bool> {
        self.run_sqlite(move |conn| {
            let removed = conn.execute("DELETE FROM records WHERE number = ?", [number])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let (sql, params) = build_query_sql(query)?;
        debug!(sql = %sql, "Running record query");

        self.run_sqlite(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), row_to_record)?;

            let mut result = Vec::new();
            for record in rows {
                result.push(record?);
            }
            Ok(result)
        })
        .await
    }

    async fn numbers(&self) -> StoreResult<HashSet<i64>> {
        self.run_sqlite(|conn| {
            let mut stmt = conn.prepare("SELECT number FROM records")?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

            let mut numbers = HashSet::new();
            for number in rows {
                numbers.insert(number?);
            }
            Ok(numbers)
        })
        .await
    }

    async fn upsert(&self, draft: &RecordDraft) -> StoreResult<UpsertOutcome> {
        let draft = draft.clone();
        self.run_sqlite(move |conn| {
            let tx = conn.transaction()?;
            let outcome = match select_by_number(&tx, draft.number)? {
                Some(mut record) => {
                    record.apply(&draft.as_full_patch());
                    write_row(&tx, &record)?;
                    UpsertOutcome::Updated(record)
                }
                None => UpsertOutcome::Inserted(insert_row(&tx, &draft)?),
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn insert_batch(&self, drafts: &[RecordDraft]) -> StoreResult<usize> {
        let drafts = drafts.to_vec();
        self.run_sqlite(move |conn| {
            // Dropping the transaction without commit rolls the batch back
            let tx = conn.transaction()?;
            for draft in &drafts {
                insert_row(&tx, draft)?;
            }
            tx.commit()?;
            Ok(drafts.len())
        })
        .await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.run_sqlite(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

/// Create a new shared SQLite record store
pub async fn create_sqlite_store(
    path: PathBuf,
    pool_size: u32,
    busy_timeout: Duration,
) -> Result<SharedRecordStore, StoreError> {
    let store = SqliteRecordStore::new(path, pool_size, busy_timeout).await?;
    Ok(Arc::new(store))
}

use super::category::Category;
use super::context::Snapshot;
use super::state::MachineState;
use crate::config::StoreConfig;
use crate::error::StoreError;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Category-erased snapshot row.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSnapshot {
    pub category: String,
    pub state: MachineState,
    pub request_id: Option<String>,
    pub context: serde_json::Value,
    pub revision: u64,
    pub updated_at: String,
}

impl PersistedSnapshot {
    pub fn encode<C: Category>(snapshot: &Snapshot<C>) -> std::result::Result<Self, StoreError> {
        Ok(Self {
            category: C::NAME.to_string(),
            state: snapshot.state,
            request_id: snapshot
                .context
                .request_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
            context: serde_json::to_value(&snapshot.context)?,
            revision: snapshot.revision,
            updated_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn decode<C: Category>(&self) -> std::result::Result<Snapshot<C>, StoreError> {
        let context =
            serde_json::from_value(self.context.clone()).map_err(|source| StoreError::Decode {
                category: self.category.clone(),
                source,
            })?;
        Ok(Snapshot {
            state: self.state,
            context,
            revision: self.revision,
        })
    }
}

/// Where State Stores keep their latest snapshot, one row per category.
pub trait SnapshotStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn load<'a>(
        &'a self,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PersistedSnapshot>>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        snapshot: &'a PersistedSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn list<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<PersistedSnapshot>>> + Send + 'a>>;
}

// ── In-memory ───────────────────────────────────────────────────────────────

/// Keeps snapshots for the life of the process only.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<BTreeMap<String, PersistedSnapshot>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load<'a>(
        &'a self,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PersistedSnapshot>>> + Send + 'a>> {
        Box::pin(async move {
            let rows = self
                .rows
                .lock()
                .map_err(|_| anyhow::anyhow!("memory snapshot store lock poisoned"))?;
            Ok(rows.get(category).cloned())
        })
    }

    fn save<'a>(
        &'a self,
        snapshot: &'a PersistedSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut rows = self
                .rows
                .lock()
                .map_err(|_| anyhow::anyhow!("memory snapshot store lock poisoned"))?;
            rows.insert(snapshot.category.clone(), snapshot.clone());
            Ok(())
        })
    }

    fn list<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<PersistedSnapshot>>> + Send + 'a>> {
        Box::pin(async move {
            let rows = self
                .rows
                .lock()
                .map_err(|_| anyhow::anyhow!("memory snapshot store lock poisoned"))?;
            Ok(rows.values().cloned().collect())
        })
    }
}

// ── SQLite ──────────────────────────────────────────────────────────────────

const SNAPSHOT_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS snapshot_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SNAPSHOT_SCHEMA_VERSION_KEY: &str = "snapshot_schema_version";
const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

async fn ensure_snapshot_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SNAPSHOT_SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .map_err(StoreError::Database)
        .context("create snapshot_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM snapshot_schema_meta WHERE key = $1")
            .bind(SNAPSHOT_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::Database)
            .context("load snapshot schema version")?;

    match stored_version {
        Some((value,)) => {
            let parsed = value
                .parse::<u32>()
                .with_context(|| format!("invalid snapshot schema version value: {value}"))?;
            anyhow::ensure!(
                parsed == SNAPSHOT_SCHEMA_VERSION,
                "incompatible snapshot schema version: stored={parsed}, expected={SNAPSHOT_SCHEMA_VERSION}. \
remove the snapshot database and restart."
            );
        }
        None => {
            sqlx::query("INSERT INTO snapshot_schema_meta (key, value) VALUES ($1, $2)")
                .bind(SNAPSHOT_SCHEMA_VERSION_KEY)
                .bind(SNAPSHOT_SCHEMA_VERSION.to_string())
                .execute(pool)
                .await
                .map_err(StoreError::Database)
                .context("persist snapshot schema version")?;
        }
    }

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS machine_snapshots (
             category   TEXT PRIMARY KEY,
             state      TEXT NOT NULL,
             request_id TEXT,
             context    TEXT NOT NULL,
             revision   INTEGER NOT NULL,
             updated_at TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await
    .map_err(StoreError::Database)
    .context("create machine_snapshots table")?;

    Ok(())
}

/// One row per category, overwritten on every transition.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Wrap an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        ensure_snapshot_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create snapshot directory: {}", parent.display())
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .map_err(StoreError::Database)
            .with_context(|| format!("Failed to open snapshot DB: {}", path.display()))?;

        Self::new(pool).await
    }
}

fn map_snapshot_row(row: &SqliteRow) -> Result<PersistedSnapshot, StoreError> {
    let category: String = row.try_get("category")?;
    let state_raw: String = row.try_get("state")?;
    let context_raw: String = row.try_get("context")?;
    let revision: i64 = row.try_get("revision")?;

    let Ok(state) = MachineState::from_str(&state_raw) else {
        return Err(StoreError::UnknownState {
            category,
            state: state_raw,
        });
    };
    let context = serde_json::from_str(&context_raw).map_err(|source| StoreError::Decode {
        category: category.clone(),
        source,
    })?;

    Ok(PersistedSnapshot {
        category,
        state,
        request_id: row.try_get("request_id")?,
        context,
        #[allow(clippy::cast_sign_loss)]
        revision: revision as u64,
        updated_at: row.try_get("updated_at")?,
    })
}

impl SnapshotStore for SqliteSnapshotStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load<'a>(
        &'a self,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PersistedSnapshot>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT category, state, request_id, context, revision, updated_at
                 FROM machine_snapshots
                 WHERE category = $1",
            )
            .bind(category)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)
            .context("query snapshot by category")?;

            Ok(row.map(|r| map_snapshot_row(&r)).transpose()?)
        })
    }

    fn save<'a>(
        &'a self,
        snapshot: &'a PersistedSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)]
            let revision = snapshot.revision as i64;
            sqlx::query(
                "INSERT INTO machine_snapshots (category, state, request_id, context, revision, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT(category) DO UPDATE SET
                     state = excluded.state,
                     request_id = excluded.request_id,
                     context = excluded.context,
                     revision = excluded.revision,
                     updated_at = excluded.updated_at",
            )
            .bind(&snapshot.category)
            .bind(snapshot.state.to_string())
            .bind(&snapshot.request_id)
            .bind(snapshot.context.to_string())
            .bind(revision)
            .bind(&snapshot.updated_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)
            .with_context(|| format!("save {} snapshot", snapshot.category))?;
            Ok(())
        })
    }

    fn list<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<PersistedSnapshot>>> + Send + 'a>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT category, state, request_id, context, revision, updated_at
                 FROM machine_snapshots
                 ORDER BY category",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Database)
            .context("list snapshots")?;

            Ok(rows
                .iter()
                .map(map_snapshot_row)
                .collect::<Result<Vec<_>, StoreError>>()?)
        })
    }
}

/// Build the snapshot store named by `[store]` in config.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SnapshotStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemorySnapshotStore::new())),
        "sqlite" => {
            let path = config.resolved_path();
            let store = SqliteSnapshotStore::open(&path).await?;
            tracing::debug!(path = %path.display(), "opened sqlite snapshot store");
            Ok(Arc::new(store))
        }
        other => Err(StoreError::UnknownBackend(other.to_string()).into()),
    }
}

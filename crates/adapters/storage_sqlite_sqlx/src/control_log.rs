//! `SQLite` implementation of [`ControlLog`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use coolhub_app::ports::ControlLog;
use coolhub_domain::error::CoolHubError;
use coolhub_domain::event::{ControlEvent, EventKind, TimeRange};
use coolhub_domain::id::EventId;

use crate::error::StorageError;

struct Wrapper(ControlEvent);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ControlEvent> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let kind: String = row.try_get("kind")?;
        let timestamp: String = row.try_get("timestamp")?;
        let payload: String = row.try_get("payload")?;

        let kind: EventKind = kind
            .parse()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let timestamp = coolhub_domain::time::parse(&timestamp).ok_or_else(|| {
            sqlx::Error::Decode(format!("invalid timestamp {timestamp:?}").into())
        })?;
        let payload: serde_json::Value =
            serde_json::from_str(&payload).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(ControlEvent {
            id: EventId::from_uuid(id),
            kind,
            timestamp,
            payload,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO control_events (id, kind, timestamp, payload)
    VALUES (?, ?, ?, ?)
";

const SELECT_RANGE: &str = r"
    SELECT id, kind, timestamp, payload FROM control_events
    WHERE timestamp >= ? AND timestamp <= ?
    ORDER BY seq ASC
";
const SELECT_RECENT: &str =
    "SELECT id, kind, timestamp, payload FROM control_events ORDER BY seq DESC LIMIT ?";
const SELECT_LAST_OF_KIND: &str = "SELECT id, kind, timestamp, payload FROM control_events WHERE kind = ? ORDER BY seq DESC LIMIT 1";

/// `SQLite`-backed append-only control log.
///
/// Timestamps are stored as fixed-width RFC 3339 text so that lexical order
/// equals chronological order; `seq` keeps append order.
pub struct SqliteControlLog {
    pool: SqlitePool,
}

impl SqliteControlLog {
    /// Create a new control log using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ControlLog for SqliteControlLog {
    async fn append(&self, event: ControlEvent) -> Result<ControlEvent, CoolHubError> {
        let payload = serde_json::to_string(&event.payload).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(event.id.as_uuid())
            .bind(event.kind.as_str())
            .bind(coolhub_domain::time::format(event.timestamp))
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(event)
    }

    async fn query(&self, range: TimeRange) -> Result<Vec<ControlEvent>, CoolHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RANGE)
            .bind(coolhub_domain::time::format(range.start))
            .bind(coolhub_domain::time::format(range.end))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ControlEvent>, CoolHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn last_of_kind(&self, kind: EventKind) -> Result<Option<ControlEvent>, CoolHubError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_LAST_OF_KIND)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }
}

use crate::store::SessionRecord;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Row of the sessions table; timestamps are unsigned Unix seconds.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub data: Vec<u8>,
    pub created: u32,
    pub modified: u32,
    pub expires: u32,
}

pub(crate) fn to_unix(ts: DateTime<Utc>) -> u32 {
    u32::try_from(ts.timestamp().max(0)).unwrap_or(u32::MAX)
}

fn from_unix(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
}

impl From<&SessionRecord> for SessionRow {
    fn from(r: &SessionRecord) -> Self {
        Self {
            id: r.id.clone(),
            data: r.data.clone(),
            created: to_unix(r.created),
            modified: to_unix(r.modified),
            expires: to_unix(r.expires),
        }
    }
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            id: row.id,
            data: row.data,
            created: from_unix(row.created),
            modified: from_unix(row.modified),
            expires: from_unix(row.expires),
        }
    }
}

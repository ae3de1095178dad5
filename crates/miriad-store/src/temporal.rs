//! Temporal memory: the append-only log of conversation events plus the
//! summaries that compact it.
//!
//! Compaction never deletes. A summary *covers* an inclusive id range;
//! readers skip covered messages and see the summary instead. The
//! [`temporal_view`] function is the single source of truth for that
//! computation — the token estimator, the prompt assembler and the
//! compaction agent all consume it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use miriad_core::ids::{MessageId, SummaryId};

use crate::database::Database;
use crate::error::StoreError;

/// A raw conversation event. Never mutated, never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemporalMessage {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: String,
    pub tokens: i64,
    pub created_at: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::ToolResult => write!(f, "tool_result"),
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool_call" => Ok(Self::ToolCall),
            "tool_result" => Ok(Self::ToolResult),
            other => Err(format!("unknown message kind: {other}")),
        }
    }
}

/// A summary covering an inclusive range of temporal ids. Immutable once
/// written. Order 1 summarizes raw messages; order n+1 summarizes at least
/// one order-n summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemporalSummary {
    pub id: SummaryId,
    pub order: i64,
    pub start_id: String,
    pub end_id: String,
    pub narrative: String,
    pub observations: Vec<String>,
    pub tags: Vec<String>,
    pub tokens: i64,
    pub created_at: String,
}

impl TemporalSummary {
    /// Whether this summary's range lies inside `other`'s range.
    pub fn inside(&self, other: &TemporalSummary) -> bool {
        other.start_id.as_str() <= self.start_id.as_str()
            && self.end_id.as_str() <= other.end_id.as_str()
    }
}

/// The reader's view of temporal memory: the active (non-subsumed)
/// summaries plus the messages not covered by any of them.
#[derive(Debug)]
pub struct TemporalView<'a> {
    pub summaries: Vec<&'a TemporalSummary>,
    pub messages: Vec<&'a TemporalMessage>,
}

impl TemporalView<'_> {
    /// Total token estimate of everything visible — the tokens the next
    /// prompt would carry.
    pub fn tokens(&self) -> i64 {
        self.summaries.iter().map(|s| s.tokens).sum::<i64>()
            + self.messages.iter().map(|m| m.tokens).sum::<i64>()
    }
}

/// Compute the reader's view. A summary is active unless a higher-order
/// summary's range contains it; a message is visible unless an active
/// summary's range covers its id.
pub fn temporal_view<'a>(
    messages: &'a [TemporalMessage],
    summaries: &'a [TemporalSummary],
) -> TemporalView<'a> {
    let active: Vec<&TemporalSummary> = summaries
        .iter()
        .filter(|s| {
            !summaries
                .iter()
                .any(|t| t.order > s.order && s.inside(t))
        })
        .collect();

    let visible: Vec<&TemporalMessage> = messages
        .iter()
        .filter(|m| {
            !active.iter().any(|s| {
                s.start_id.as_str() <= m.id.as_str() && m.id.as_str() <= s.end_id.as_str()
            })
        })
        .collect();

    TemporalView {
        summaries: active,
        messages: visible,
    }
}

#[derive(Clone)]
pub struct TemporalRepo {
    db: Database,
}

impl TemporalRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a message. The id is minted by the caller's id service.
    pub fn append_message(
        &self,
        id: MessageId,
        kind: MessageKind,
        content: &str,
        tokens: i64,
    ) -> Result<TemporalMessage, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO temporal_messages (id, kind, content, tokens, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.as_str(), kind.to_string(), content, tokens, now],
            )?;
            Ok(TemporalMessage {
                id: id.clone(),
                kind,
                content: content.to_string(),
                tokens,
                created_at: now.clone(),
            })
        })
    }

    /// Insert a summary. Immutable once written.
    pub fn create_summary(
        &self,
        id: SummaryId,
        order: i64,
        start_id: &str,
        end_id: &str,
        narrative: &str,
        observations: &[String],
        tags: &[String],
        tokens: i64,
    ) -> Result<TemporalSummary, StoreError> {
        let now = Utc::now().to_rfc3339();
        let observations_json = serde_json::to_string(observations)?;
        let tags_json = serde_json::to_string(tags)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO temporal_summaries
                 (id, ord, start_id, end_id, narrative, observations, tags, tokens, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.as_str(),
                    order,
                    start_id,
                    end_id,
                    narrative,
                    observations_json,
                    tags_json,
                    tokens,
                    now
                ],
            )?;
            Ok(TemporalSummary {
                id: id.clone(),
                order,
                start_id: start_id.to_string(),
                end_id: end_id.to_string(),
                narrative: narrative.to_string(),
                observations: observations.to_vec(),
                tags: tags.to_vec(),
                tokens,
                created_at: now.clone(),
            })
        })
    }

    /// All raw messages, ascending by id.
    pub fn get_messages(&self) -> Result<Vec<TemporalMessage>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, content, tokens, created_at
                 FROM temporal_messages ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All summaries, ascending by id.
    pub fn get_summaries(&self) -> Result<Vec<TemporalSummary>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ord, start_id, end_id, narrative, observations, tags, tokens, created_at
                 FROM temporal_summaries ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], summary_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Tokens the next prompt would carry: visible messages plus active
    /// summaries.
    pub fn estimate_uncompacted_tokens(&self) -> Result<i64, StoreError> {
        let messages = self.get_messages()?;
        let summaries = self.get_summaries()?;
        Ok(temporal_view(&messages, &summaries).tokens())
    }

    /// Full-text search over message content.
    pub fn search(&self, query: &str, limit: u32) -> Result<Vec<TemporalMessage>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.kind, m.content, m.tokens, m.created_at
                 FROM temporal_messages m
                 JOIN temporal_messages_fts ON temporal_messages_fts.rowid = m.rowid
                 WHERE temporal_messages_fts MATCH ?1
                 ORDER BY temporal_messages_fts.rank
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![query, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemporalMessage> {
    let kind: String = row.get(1)?;
    Ok(TemporalMessage {
        id: MessageId::from_raw(row.get::<_, String>(0)?),
        kind: kind.parse().unwrap_or(MessageKind::User),
        content: row.get(2)?,
        tokens: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemporalSummary> {
    let observations: String = row.get(5)?;
    let tags: String = row.get(6)?;
    Ok(TemporalSummary {
        id: SummaryId::from_raw(row.get::<_, String>(0)?),
        order: row.get(1)?,
        start_id: row.get(2)?,
        end_id: row.get(3)?,
        narrative: row.get(4)?,
        observations: serde_json::from_str(&observations).unwrap_or_default(),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        tokens: row.get(7)?,
        created_at: row.get(8)?,
    })
}

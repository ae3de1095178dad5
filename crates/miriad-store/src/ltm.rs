//! Long-term memory: hierarchical, versioned knowledge entries keyed by
//! slug and addressable by materialized path.
//!
//! Every mutation is a compare-and-swap on `(slug, version)`. The loser of
//! a race receives `Conflict{expected, actual}` and is expected to re-read
//! and retry. Archived entries are hidden from every read path.

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::StoreError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LtmEntry {
    pub slug: String,
    pub parent_slug: Option<String>,
    pub path: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub version: i64,
    pub created_by: Actor,
    pub updated_by: Actor,
    pub archived_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Which part of the system wrote an entry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Actor {
    Main,
    LtmConsolidate,
    LtmReflect,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::LtmConsolidate => write!(f, "ltm-consolidate"),
            Self::LtmReflect => write!(f, "ltm-reflect"),
        }
    }
}

impl std::str::FromStr for Actor {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "ltm-consolidate" => Ok(Self::LtmConsolidate),
            "ltm-reflect" => Ok(Self::LtmReflect),
            other => Err(format!("unknown actor: {other}")),
        }
    }
}

/// A search hit: entry plus its score (2 per title match, 1 per body match).
#[derive(Clone, Debug)]
pub struct LtmSearchHit {
    pub entry: LtmEntry,
    pub score: i64,
}

#[derive(Clone)]
pub struct LtmRepo {
    db: Database,
}

impl LtmRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an entry. The path is derived from the parent's path at
    /// creation time and never edited afterwards. Duplicate slugs are
    /// rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        slug: &str,
        parent_slug: Option<&str>,
        title: &str,
        body: &str,
        tags: &[String],
        links: &[String],
        created_by: Actor,
    ) -> Result<LtmEntry, StoreError> {
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(tags)?;
        let links_json = serde_json::to_string(links)?;

        self.db.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM ltm_entries WHERE slug = ?1",
                    [slug],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(StoreError::AlreadyExists(format!("entry {slug}")));
            }

            let path = match parent_slug {
                Some(parent) => {
                    let parent_path: Option<String> = conn
                        .query_row(
                            "SELECT path FROM ltm_entries WHERE slug = ?1 AND archived_at IS NULL",
                            [parent],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match parent_path {
                        Some(p) => format!("{p}/{slug}"),
                        None => return Err(StoreError::NotFound(format!("parent {parent}"))),
                    }
                }
                None => format!("/{slug}"),
            };

            conn.execute(
                "INSERT INTO ltm_entries
                 (slug, parent_slug, path, title, body, tags, links, version,
                  created_by, updated_by, archived_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8, NULL, ?9, ?9)",
                rusqlite::params![
                    slug,
                    parent_slug,
                    path,
                    title,
                    body,
                    tags_json,
                    links_json,
                    created_by.to_string(),
                    now
                ],
            )?;

            Ok(LtmEntry {
                slug: slug.to_string(),
                parent_slug: parent_slug.map(String::from),
                path,
                title: title.to_string(),
                body: body.to_string(),
                tags: tags.to_vec(),
                links: links.to_vec(),
                version: 1,
                created_by,
                updated_by: created_by,
                archived_at: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            })
        })
    }

    /// Read an entry. Returns None when missing or archived.
    pub fn read(&self, slug: &str) -> Result<Option<LtmEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let entry = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE slug = ?1 AND archived_at IS NULL"),
                    [slug],
                    entry_from_row,
                )
                .optional()?;
            Ok(entry)
        })
    }

    /// CAS body update.
    pub fn update(
        &self,
        slug: &str,
        body: &str,
        expected_version: i64,
        updated_by: Actor,
    ) -> Result<LtmEntry, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE ltm_entries
                 SET body = ?1, version = version + 1, updated_at = ?2, updated_by = ?3
                 WHERE slug = ?4 AND version = ?5 AND archived_at IS NULL",
                rusqlite::params![body, now, updated_by.to_string(), slug, expected_version],
            )?;
            if rows == 0 {
                return Err(diagnose_cas_failure(conn, slug, expected_version)?);
            }
            read_raw(conn, slug)
        })
    }

    /// CAS tag-list update.
    pub fn update_tags(
        &self,
        slug: &str,
        tags: &[String],
        expected_version: i64,
        updated_by: Actor,
    ) -> Result<LtmEntry, StoreError> {
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(tags)?;
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE ltm_entries
                 SET tags = ?1, version = version + 1, updated_at = ?2, updated_by = ?3
                 WHERE slug = ?4 AND version = ?5 AND archived_at IS NULL",
                rusqlite::params![tags_json, now, updated_by.to_string(), slug, expected_version],
            )?;
            if rows == 0 {
                return Err(diagnose_cas_failure(conn, slug, expected_version)?);
            }
            read_raw(conn, slug)
        })
    }

    /// CAS archive. Archived entries disappear from every read path.
    pub fn archive(&self, slug: &str, expected_version: i64) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE ltm_entries
                 SET archived_at = ?1, version = version + 1, updated_at = ?1
                 WHERE slug = ?2 AND version = ?3 AND archived_at IS NULL",
                rusqlite::params![now, slug, expected_version],
            )?;
            if rows == 0 {
                return Err(diagnose_cas_failure(conn, slug, expected_version)?);
            }
            Ok(())
        })
    }

    /// Children of a parent (root entries when None), archived excluded,
    /// sorted by slug.
    pub fn get_children(&self, parent_slug: Option<&str>) -> Result<Vec<LtmEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let (sql, param): (String, Option<&str>) = match parent_slug {
                Some(parent) => (
                    format!(
                        "{SELECT_COLUMNS} WHERE parent_slug = ?1 AND archived_at IS NULL ORDER BY slug"
                    ),
                    Some(parent),
                ),
                None => (
                    format!(
                        "{SELECT_COLUMNS} WHERE parent_slug IS NULL AND archived_at IS NULL ORDER BY slug"
                    ),
                    None,
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = match param {
                Some(p) => stmt
                    .query_map([p], entry_from_row)?
                    .collect::<Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map([], entry_from_row)?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })
    }

    /// Glob over materialized paths. `*` and `**` both match any path
    /// characters (single-level matching is not distinguished); `?` matches
    /// one character. `max_depth` drops entries whose path separator count
    /// exceeds it.
    pub fn glob(
        &self,
        pattern: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<LtmEntry>, StoreError> {
        let like = glob_to_like(pattern);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE path LIKE ?1 ESCAPE '\\' AND archived_at IS NULL ORDER BY path"
            ))?;
            let rows = stmt
                .query_map([like], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match max_depth {
                Some(depth) => rows
                    .into_iter()
                    .filter(|e| e.path.matches('/').count() <= depth)
                    .collect(),
                None => rows,
            })
        })
    }

    /// Case-insensitive substring search over title and body.
    /// Score = 2·title match + 1·body match, descending.
    pub fn search(
        &self,
        query: &str,
        path_prefix: Option<&str>,
    ) -> Result<Vec<LtmSearchHit>, StoreError> {
        let needle = query.to_lowercase();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE archived_at IS NULL ORDER BY path"
            ))?;
            let entries = stmt
                .query_map([], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut hits: Vec<LtmSearchHit> = entries
                .into_iter()
                .filter(|e| match path_prefix {
                    Some(prefix) => e.path.starts_with(prefix),
                    None => true,
                })
                .filter_map(|entry| {
                    let title_match = entry.title.to_lowercase().contains(&needle);
                    let body_match = entry.body.to_lowercase().contains(&needle);
                    let score = 2 * i64::from(title_match) + i64::from(body_match);
                    (score > 0).then_some(LtmSearchHit { entry, score })
                })
                .collect();

            hits.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| a.entry.path.cmp(&b.entry.path))
            });
            Ok(hits)
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT slug, parent_slug, path, title, body, tags, links, version, \
     created_by, updated_by, archived_at, created_at, updated_at FROM ltm_entries";

/// After a zero-row CAS update, read the current row to report a precise
/// error kind.
fn diagnose_cas_failure(
    conn: &rusqlite::Connection,
    slug: &str,
    expected: i64,
) -> Result<StoreError, StoreError> {
    let row: Option<(i64, Option<String>)> = conn
        .query_row(
            "SELECT version, archived_at FROM ltm_entries WHERE slug = ?1",
            [slug],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(match row {
        None => StoreError::NotFound(format!("entry {slug}")),
        Some((_, Some(_))) => StoreError::Archived(format!("entry {slug}")),
        Some((actual, None)) => StoreError::Conflict { expected, actual },
    })
}

fn read_raw(conn: &rusqlite::Connection, slug: &str) -> Result<LtmEntry, StoreError> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE slug = ?1"),
        [slug],
        entry_from_row,
    )
    .map_err(|_| StoreError::NotFound(format!("entry {slug}")))
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LtmEntry> {
    let tags: String = row.get(5)?;
    let links: String = row.get(6)?;
    let created_by: String = row.get(8)?;
    let updated_by: String = row.get(9)?;
    Ok(LtmEntry {
        slug: row.get(0)?,
        parent_slug: row.get(1)?,
        path: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        links: serde_json::from_str(&links).unwrap_or_default(),
        version: row.get(7)?,
        created_by: created_by.parse().unwrap_or(Actor::Main),
        updated_by: updated_by.parse().unwrap_or(Actor::Main),
        archived_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Translate a glob pattern to a LIKE pattern, escaping LIKE wildcards.
fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // Collapse ** into a single %.
                if chars.peek() == Some(&'*') {
                    chars.next();
                }
                out.push('%');
            }
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

// SPDX-License-Identifier: Apache-2.0
//! WHERE/ORDER BY assembly shared by the per-resource repositories.

use crate::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use spoolman_model::{Page, SortKey, NO_REFERENCE_ID};
use std::collections::BTreeMap;

/// Accumulates AND-joined WHERE clauses with positional parameters.
pub(crate) struct Where {
    clauses: Vec<String>,
    pub(crate) params: Vec<SqlValue>,
}

impl Where {
    pub(crate) fn new() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    fn placeholders(&mut self, count: usize) -> String {
        let first = self.params.len() - count + 1;
        (first..first + count)
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Plain `column IN (...)` over primary ids.
    pub(crate) fn id_list(&mut self, column: &str, ids: &[i64]) {
        self.params.extend(ids.iter().map(|id| SqlValue::from(*id)));
        let list = self.placeholders(ids.len());
        self.clauses.push(format!("{column} IN ({list})"));
    }

    /// Reference-id filter where the sentinel -1 matches NULL.
    pub(crate) fn reference_ids(&mut self, column: &str, ids: &[i64]) {
        let concrete: Vec<i64> = ids.iter().copied().filter(|id| *id != NO_REFERENCE_ID).collect();
        let wants_null = concrete.len() != ids.len();
        match (concrete.is_empty(), wants_null) {
            (true, true) => self.clauses.push(format!("{column} IS NULL")),
            (false, false) => self.id_list(column, &concrete),
            (false, true) => {
                self.params
                    .extend(concrete.iter().map(|id| SqlValue::from(*id)));
                let list = self.placeholders(concrete.len());
                self.clauses
                    .push(format!("({column} IN ({list}) OR {column} IS NULL)"));
            }
            (true, false) => {}
        }
    }

    /// Case-insensitive partial match over comma-split search terms. An
    /// empty term matches rows where the column is NULL.
    pub(crate) fn terms(&mut self, column: &str, terms: &[String]) {
        let mut alternatives = Vec::new();
        for term in terms {
            if term.is_empty() {
                alternatives.push(format!("{column} IS NULL"));
            } else {
                self.params
                    .push(SqlValue::from(format!("%{}%", escape_like(term))));
                let n = self.params.len();
                alternatives.push(format!("{column} LIKE ?{n} ESCAPE '\\'"));
            }
        }
        if !alternatives.is_empty() {
            self.clauses.push(format!("({})", alternatives.join(" OR ")));
        }
    }

    pub(crate) fn raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    pub(crate) fn clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Maps request sort fields to SQL columns through a whitelist; unknown
/// fields are rejected rather than interpolated.
pub(crate) fn order_clause(
    keys: &[SortKey],
    columns: &[(&str, &str)],
    default: &str,
) -> Result<String, StoreError> {
    if keys.is_empty() {
        return Ok(format!(" ORDER BY {default}"));
    }
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let column = columns
            .iter()
            .find(|(name, _)| *name == key.field)
            .map(|(_, column)| *column)
            .ok_or_else(|| StoreError::InvalidSort(format!("unknown sort field: {}", key.field)))?;
        parts.push(format!("{column} {}", key.order.as_sql()));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

pub(crate) fn limit_clause(page: Page) -> String {
    match page.limit {
        Some(limit) => format!(" LIMIT {limit} OFFSET {}", page.offset),
        None if page.offset > 0 => format!(" LIMIT -1 OFFSET {}", page.offset),
        None => String::new(),
    }
}

pub(crate) fn datetime(field: &'static str, secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        StoreError::Internal(format!("column {field} holds an out-of-range timestamp"))
    })
}

pub(crate) fn opt_datetime(
    field: &'static str,
    secs: Option<i64>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    secs.map(|s| datetime(field, s)).transpose()
}

pub(crate) fn load_extra(
    conn: &Connection,
    table: &str,
    owner: &str,
    id: i64,
) -> Result<BTreeMap<String, String>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT key, value FROM {table} WHERE {owner} = ?1 ORDER BY key"
    ))?;
    let rows = stmt.query_map([id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut extra = BTreeMap::new();
    for row in rows {
        let (key, value) = row?;
        extra.insert(key, value);
    }
    Ok(extra)
}

pub(crate) fn replace_extra(
    conn: &Connection,
    table: &str,
    owner: &str,
    id: i64,
    extra: &BTreeMap<String, String>,
) -> Result<(), StoreError> {
    conn.execute(&format!("DELETE FROM {table} WHERE {owner} = ?1"), [id])?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} ({owner}, key, value) VALUES (?1, ?2, ?3)"
    ))?;
    for (key, value) in extra {
        stmt.execute(rusqlite::params![id, key, value])?;
    }
    Ok(())
}

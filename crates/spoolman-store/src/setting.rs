// SPDX-License-Identifier: Apache-2.0
//! Key/value settings. Values are opaque JSON documents stored as text;
//! the API layer decides what they mean.

use crate::sql;
use crate::{Store, StoreError};
use rusqlite::{params, OptionalExtension};
use spoolman_model::{utc_now_seconds, Setting};

impl Store {
    pub async fn set_setting(&self, key: String, value: String) -> Result<Setting, StoreError> {
        self.with_conn(move |conn| {
            let last_updated = utc_now_seconds();
            conn.execute(
                "INSERT INTO setting (key, value, last_updated) VALUES (?1, ?2, ?3) \
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value, \
                 last_updated = excluded.last_updated",
                params![key, value, last_updated.timestamp()],
            )?;
            Ok(Setting {
                key,
                value,
                last_updated,
            })
        })
        .await
    }

    pub async fn get_setting(&self, key: String) -> Result<Setting, StoreError> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT value, last_updated FROM setting WHERE key = ?1",
                    [&key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            let (value, last_updated) = row.ok_or_else(|| StoreError::NotFound {
                kind: "setting",
                ident: key.clone(),
            })?;
            Ok(Setting {
                key,
                value,
                last_updated: sql::datetime("setting.last_updated", last_updated)?,
            })
        })
        .await
    }

    pub async fn unset_setting(&self, key: String) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM setting WHERE key = ?1", [&key])?;
            if removed == 0 {
                return Err(StoreError::NotFound {
                    kind: "setting",
                    ident: key,
                });
            }
            Ok(())
        })
        .await
    }

    pub async fn list_settings(&self) -> Result<Vec<Setting>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT key, value, last_updated FROM setting ORDER BY key")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            let mut settings = Vec::new();
            for row in rows {
                let (key, value, last_updated) = row?;
                settings.push(Setting {
                    key,
                    value,
                    last_updated: sql::datetime("setting.last_updated", last_updated)?,
                });
            }
            Ok(settings)
        })
        .await
    }
}

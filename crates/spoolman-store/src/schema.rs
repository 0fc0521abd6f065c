// SPDX-License-Identifier: Apache-2.0
//! Schema migrations keyed off `PRAGMA user_version`.

use crate::StoreError;
use rusqlite::Connection;

pub(crate) const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE vendor (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  registered INTEGER NOT NULL,
  name TEXT NOT NULL,
  comment TEXT
);
CREATE TABLE filament (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  registered INTEGER NOT NULL,
  name TEXT,
  vendor_id INTEGER REFERENCES vendor (id),
  material TEXT,
  price REAL,
  density REAL NOT NULL,
  diameter REAL NOT NULL,
  weight REAL,
  spool_weight REAL,
  article_number TEXT,
  comment TEXT,
  settings_extruder_temp INTEGER,
  settings_bed_temp INTEGER,
  color_hex TEXT
);
CREATE TABLE spool (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  registered INTEGER NOT NULL,
  first_used INTEGER,
  last_used INTEGER,
  filament_id INTEGER NOT NULL REFERENCES filament (id),
  price REAL,
  used_weight REAL NOT NULL,
  location TEXT,
  lot_nr TEXT,
  comment TEXT,
  archived INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE coil (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  registered INTEGER NOT NULL,
  name TEXT,
  vendor_id INTEGER REFERENCES vendor (id),
  weight REAL NOT NULL,
  comment TEXT
);
CREATE TABLE vendor_field (
  vendor_id INTEGER NOT NULL REFERENCES vendor (id) ON DELETE CASCADE,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (vendor_id, key)
) WITHOUT ROWID;
CREATE TABLE filament_field (
  filament_id INTEGER NOT NULL REFERENCES filament (id) ON DELETE CASCADE,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (filament_id, key)
) WITHOUT ROWID;
CREATE TABLE spool_field (
  spool_id INTEGER NOT NULL REFERENCES spool (id) ON DELETE CASCADE,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (spool_id, key)
) WITHOUT ROWID;
CREATE TABLE coil_field (
  coil_id INTEGER NOT NULL REFERENCES coil (id) ON DELETE CASCADE,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (coil_id, key)
) WITHOUT ROWID;
CREATE TABLE setting (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  last_updated INTEGER NOT NULL
) WITHOUT ROWID;
CREATE INDEX idx_filament_vendor ON filament (vendor_id);
CREATE INDEX idx_spool_filament ON spool (filament_id);
CREATE INDEX idx_coil_vendor ON coil (vendor_id);
";

pub(crate) fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::Internal(format!(
            "database schema version {version} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    if version < 1 {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA_V1)?;
        tx.execute_batch("PRAGMA user_version=1;")?;
        tx.commit()?;
        tracing::info!(version = SCHEMA_VERSION, "applied inventory schema");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn).expect("first run");
        migrate(&mut conn).expect("second run");
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn migrate_rejects_future_schema() {
        let mut conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("PRAGMA user_version=99;").expect("set");
        assert!(migrate(&mut conn).is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0

use crate::sql::{self, Where};
use crate::{Store, StoreError};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use spoolman_model::{utc_now_seconds, Page, SortKey, Vendor, VendorFilter, VendorUpdate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct NewVendor {
    pub name: String,
    pub comment: Option<String>,
    pub extra: BTreeMap<String, String>,
}

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "v.id"),
    ("registered", "v.registered"),
    ("name", "v.name"),
    ("comment", "v.comment"),
];

impl Store {
    pub async fn create_vendor(&self, new: NewVendor) -> Result<Vendor, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let registered = utc_now_seconds();
            tx.execute(
                "INSERT INTO vendor (registered, name, comment) VALUES (?1, ?2, ?3)",
                params![registered.timestamp(), new.name, new.comment],
            )?;
            let id = tx.last_insert_rowid();
            sql::replace_extra(&tx, "vendor_field", "vendor_id", id, &new.extra)?;
            let vendor = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(vendor)
        })
        .await
    }

    pub async fn get_vendor(&self, id: i64) -> Result<Vendor, StoreError> {
        self.with_conn(move |conn| get_sync(conn, id)).await
    }

    pub async fn find_vendors(
        &self,
        filter: VendorFilter,
        sort: Vec<SortKey>,
        page: Page,
    ) -> Result<(Vec<Vendor>, u64), StoreError> {
        self.with_conn(move |conn| find_sync(conn, &filter, &sort, page))
            .await
    }

    pub async fn update_vendor(&self, id: i64, update: VendorUpdate) -> Result<Vendor, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut vendor = get_sync(&tx, id)?;
            if let Some(name) = update.name {
                vendor.name = name;
            }
            update.comment.apply(&mut vendor.comment);
            if let Some(extra) = update.extra {
                vendor.extra = extra;
            }
            tx.execute(
                "UPDATE vendor SET name = ?1, comment = ?2 WHERE id = ?3",
                params![vendor.name, vendor.comment, id],
            )?;
            sql::replace_extra(&tx, "vendor_field", "vendor_id", id, &vendor.extra)?;
            tx.commit()?;
            Ok(vendor)
        })
        .await
    }

    /// Fails with a conflict while any filament or coil references the
    /// vendor.
    pub async fn delete_vendor(&self, id: i64) -> Result<Vendor, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let vendor = get_sync(&tx, id)?;
            tx.execute("DELETE FROM vendor WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(vendor)
        })
        .await
    }
}

pub(crate) fn get_sync(conn: &Connection, id: i64) -> Result<Vendor, StoreError> {
    let row = conn
        .query_row(
            "SELECT v.id, v.registered, v.name, v.comment FROM vendor v WHERE v.id = ?1",
            [id],
            map_row,
        )
        .optional()?;
    let raw = row.ok_or(StoreError::NotFound {
        kind: "vendor",
        ident: id.to_string(),
    })?;
    from_raw(conn, raw)
}

pub(crate) fn ensure_exists(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM vendor WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    found.map(|_| ()).ok_or(StoreError::NotFound {
        kind: "vendor",
        ident: id.to_string(),
    })
}

type RawVendor = (i64, i64, String, Option<String>);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVendor> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn from_raw(conn: &Connection, raw: RawVendor) -> Result<Vendor, StoreError> {
    let (id, registered, name, comment) = raw;
    Ok(Vendor {
        id,
        registered: sql::datetime("vendor.registered", registered)?,
        name,
        comment,
        extra: sql::load_extra(conn, "vendor_field", "vendor_id", id)?,
    })
}

fn find_sync(
    conn: &Connection,
    filter: &VendorFilter,
    sort: &[SortKey],
    page: Page,
) -> Result<(Vec<Vendor>, u64), StoreError> {
    let mut w = Where::new();
    if let Some(ids) = &filter.ids {
        w.id_list("v.id", ids);
    }
    if let Some(terms) = &filter.name {
        w.terms("v.name", terms);
    }
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM vendor v{}", w.clause()),
        params_from_iter(w.params.iter()),
        |row| row.get(0),
    )?;
    let order = sql::order_clause(sort, SORT_COLUMNS, "v.id ASC")?;
    let mut stmt = conn.prepare(&format!(
        "SELECT v.id, v.registered, v.name, v.comment FROM vendor v{}{}{}",
        w.clause(),
        order,
        sql::limit_clause(page),
    ))?;
    let rows = stmt.query_map(params_from_iter(w.params.iter()), map_row)?;
    let mut vendors = Vec::new();
    for row in rows {
        vendors.push(from_raw(conn, row?)?);
    }
    Ok((vendors, total as u64))
}

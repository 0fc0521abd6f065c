// SPDX-License-Identifier: Apache-2.0

use crate::sql::{self, Where};
use crate::{vendor, Store, StoreError};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use spoolman_model::{utc_now_seconds, Coil, CoilFilter, CoilUpdate, Page, Patch, SortKey, Vendor};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct NewCoil {
    pub name: Option<String>,
    pub vendor_id: Option<i64>,
    pub weight: f64,
    pub comment: Option<String>,
    pub extra: BTreeMap<String, String>,
}

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "c.id"),
    ("registered", "c.registered"),
    ("name", "c.name"),
    ("vendor.id", "c.vendor_id"),
    ("vendor.name", "v.name"),
    ("weight", "c.weight"),
    ("comment", "c.comment"),
];

const SELECT: &str = "SELECT c.id, c.registered, c.name, c.vendor_id, c.weight, c.comment, \
     v.registered, v.name, v.comment \
     FROM coil c LEFT JOIN vendor v ON v.id = c.vendor_id";

impl Store {
    pub async fn create_coil(&self, new: NewCoil) -> Result<Coil, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if let Some(vendor_id) = new.vendor_id {
                vendor::ensure_exists(&tx, vendor_id)?;
            }
            let registered = utc_now_seconds();
            tx.execute(
                "INSERT INTO coil (registered, name, vendor_id, weight, comment) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    registered.timestamp(),
                    new.name,
                    new.vendor_id,
                    new.weight,
                    new.comment,
                ],
            )?;
            let id = tx.last_insert_rowid();
            sql::replace_extra(&tx, "coil_field", "coil_id", id, &new.extra)?;
            let coil = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(coil)
        })
        .await
    }

    pub async fn get_coil(&self, id: i64) -> Result<Coil, StoreError> {
        self.with_conn(move |conn| get_sync(conn, id)).await
    }

    pub async fn find_coils(
        &self,
        filter: CoilFilter,
        sort: Vec<SortKey>,
        page: Page,
    ) -> Result<(Vec<Coil>, u64), StoreError> {
        self.with_conn(move |conn| find_sync(conn, &filter, &sort, page))
            .await
    }

    pub async fn update_coil(&self, id: i64, update: CoilUpdate) -> Result<Coil, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let current = get_sync(&tx, id)?;
            let mut vendor_id = current.vendor.as_ref().map(|v| v.id);
            match update.vendor_id {
                Patch::Keep => {}
                Patch::Clear => vendor_id = None,
                Patch::Set(vid) => {
                    vendor::ensure_exists(&tx, vid)?;
                    vendor_id = Some(vid);
                }
            }
            let mut name = current.name;
            update.name.apply(&mut name);
            let mut comment = current.comment;
            update.comment.apply(&mut comment);
            tx.execute(
                "UPDATE coil SET name = ?1, vendor_id = ?2, weight = ?3, comment = ?4 \
                 WHERE id = ?5",
                params![
                    name,
                    vendor_id,
                    update.weight.unwrap_or(current.weight),
                    comment,
                    id,
                ],
            )?;
            if let Some(extra) = update.extra {
                sql::replace_extra(&tx, "coil_field", "coil_id", id, &extra)?;
            }
            let coil = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(coil)
        })
        .await
    }

    pub async fn delete_coil(&self, id: i64) -> Result<Coil, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let coil = get_sync(&tx, id)?;
            tx.execute("DELETE FROM coil WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(coil)
        })
        .await
    }
}

type RawCoil = (
    i64,
    i64,
    Option<String>,
    Option<i64>,
    f64,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCoil> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn from_raw(conn: &Connection, raw: RawCoil) -> Result<Coil, StoreError> {
    let (id, registered, name, vendor_id, weight, comment, v_registered, v_name, v_comment) = raw;
    let vendor = match vendor_id {
        None => None,
        Some(vid) => {
            let v_registered = v_registered.ok_or_else(|| {
                StoreError::Internal(format!("vendor {vid} row missing registered"))
            })?;
            let v_name = v_name
                .ok_or_else(|| StoreError::Internal(format!("vendor {vid} row missing name")))?;
            Some(Vendor {
                id: vid,
                registered: sql::datetime("vendor.registered", v_registered)?,
                name: v_name,
                comment: v_comment,
                extra: sql::load_extra(conn, "vendor_field", "vendor_id", vid)?,
            })
        }
    };
    Ok(Coil {
        id,
        registered: sql::datetime("coil.registered", registered)?,
        name,
        vendor,
        weight,
        comment,
        extra: sql::load_extra(conn, "coil_field", "coil_id", id)?,
    })
}

fn get_sync(conn: &Connection, id: i64) -> Result<Coil, StoreError> {
    let row = conn
        .query_row(&format!("{SELECT} WHERE c.id = ?1"), [id], map_row)
        .optional()?;
    let raw = row.ok_or(StoreError::NotFound {
        kind: "coil",
        ident: id.to_string(),
    })?;
    from_raw(conn, raw)
}

fn find_sync(
    conn: &Connection,
    filter: &CoilFilter,
    sort: &[SortKey],
    page: Page,
) -> Result<(Vec<Coil>, u64), StoreError> {
    let mut w = Where::new();
    if let Some(ids) = &filter.ids {
        w.id_list("c.id", ids);
    }
    if let Some(terms) = &filter.name {
        w.terms("c.name", terms);
    }
    if let Some(ids) = &filter.vendor_ids {
        w.reference_ids("c.vendor_id", ids);
    }
    if let Some(terms) = &filter.vendor_name {
        w.terms("v.name", terms);
    }
    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM coil c LEFT JOIN vendor v ON v.id = c.vendor_id{}",
            w.clause()
        ),
        params_from_iter(w.params.iter()),
        |row| row.get(0),
    )?;
    let order = sql::order_clause(sort, SORT_COLUMNS, "c.id ASC")?;
    let mut stmt = conn.prepare(&format!(
        "{SELECT}{}{}{}",
        w.clause(),
        order,
        sql::limit_clause(page)
    ))?;
    let rows = stmt.query_map(params_from_iter(w.params.iter()), map_row)?;
    let mut coils = Vec::new();
    for row in rows {
        coils.push(from_raw(conn, row?)?);
    }
    Ok((coils, total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewVendor;

    async fn seeded_store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store
            .create_vendor(NewVendor {
                name: "Prusament".to_string(),
                ..NewVendor::default()
            })
            .await
            .expect("vendor");
        store
            .create_coil(NewCoil {
                name: Some("Cardboard 1kg".to_string()),
                vendor_id: Some(1),
                weight: 210.0,
                ..NewCoil::default()
            })
            .await
            .expect("coil");
        store
            .create_coil(NewCoil {
                name: Some("Unknown metal".to_string()),
                weight: 240.0,
                ..NewCoil::default()
            })
            .await
            .expect("coil");
        store
    }

    #[tokio::test]
    async fn find_by_vendor_id_and_sentinel() {
        let store = seeded_store().await;
        let filter = CoilFilter {
            vendor_ids: Some(vec![1]),
            ..CoilFilter::default()
        };
        let (coils, _) = store
            .find_coils(filter, Vec::new(), Page::default())
            .await
            .expect("find");
        assert_eq!(coils.len(), 1);
        assert_eq!(coils[0].name.as_deref(), Some("Cardboard 1kg"));

        let filter = CoilFilter {
            vendor_ids: Some(vec![-1]),
            ..CoilFilter::default()
        };
        let (coils, _) = store
            .find_coils(filter, Vec::new(), Page::default())
            .await
            .expect("find");
        assert_eq!(coils.len(), 1);
        assert!(coils[0].vendor.is_none());
    }

    #[tokio::test]
    async fn update_weight_keeps_other_fields() {
        let store = seeded_store().await;
        let update = CoilUpdate {
            weight: Some(215.5),
            ..CoilUpdate::default()
        };
        let coil = store.update_coil(1, update).await.expect("update");
        assert_eq!(coil.weight, 215.5);
        assert_eq!(coil.name.as_deref(), Some("Cardboard 1kg"));
        assert!(coil.vendor.is_some());
    }

    #[tokio::test]
    async fn delete_returns_the_removed_coil() {
        let store = seeded_store().await;
        let coil = store.delete_coil(2).await.expect("delete");
        assert_eq!(coil.id, 2);
        assert!(matches!(
            store.get_coil(2).await,
            Err(StoreError::NotFound { kind: "coil", .. })
        ));
    }
}

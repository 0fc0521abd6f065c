// SPDX-License-Identifier: Apache-2.0

use crate::sql::{self, Where};
use crate::{filament, Store, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use spoolman_model::{utc_now_seconds, Page, SortKey, Spool, SpoolFilter, SpoolUpdate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct NewSpool {
    pub filament_id: i64,
    pub price: Option<f64>,
    pub used_weight: f64,
    pub first_used: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub lot_nr: Option<String>,
    pub comment: Option<String>,
    pub archived: bool,
    pub extra: BTreeMap<String, String>,
}

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "s.id"),
    ("registered", "s.registered"),
    ("first_used", "s.first_used"),
    ("last_used", "s.last_used"),
    ("price", "s.price"),
    ("used_weight", "s.used_weight"),
    ("remaining_weight", "(f.weight - s.used_weight)"),
    ("location", "s.location"),
    ("lot_nr", "s.lot_nr"),
    ("comment", "s.comment"),
    ("archived", "s.archived"),
    ("filament.id", "s.filament_id"),
    ("filament.name", "f.name"),
    ("filament.material", "f.material"),
    ("filament.vendor.id", "f.vendor_id"),
    ("filament.vendor.name", "v.name"),
];

const SELECT: &str = "SELECT s.id, s.registered, s.first_used, s.last_used, s.filament_id, \
     s.price, s.used_weight, s.location, s.lot_nr, s.comment, s.archived \
     FROM spool s JOIN filament f ON f.id = s.filament_id \
     LEFT JOIN vendor v ON v.id = f.vendor_id";

impl Store {
    pub async fn create_spool(&self, new: NewSpool) -> Result<Spool, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            filament::ensure_exists(&tx, new.filament_id)?;
            let registered = utc_now_seconds();
            tx.execute(
                "INSERT INTO spool (registered, first_used, last_used, filament_id, price, \
                 used_weight, location, lot_nr, comment, archived) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    registered.timestamp(),
                    new.first_used.map(|dt| dt.timestamp()),
                    new.last_used.map(|dt| dt.timestamp()),
                    new.filament_id,
                    new.price,
                    new.used_weight,
                    new.location,
                    new.lot_nr,
                    new.comment,
                    new.archived,
                ],
            )?;
            let id = tx.last_insert_rowid();
            sql::replace_extra(&tx, "spool_field", "spool_id", id, &new.extra)?;
            let spool = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(spool)
        })
        .await
    }

    pub async fn get_spool(&self, id: i64) -> Result<Spool, StoreError> {
        self.with_conn(move |conn| get_sync(conn, id)).await
    }

    pub async fn find_spools(
        &self,
        filter: SpoolFilter,
        sort: Vec<SortKey>,
        page: Page,
    ) -> Result<(Vec<Spool>, u64), StoreError> {
        self.with_conn(move |conn| find_sync(conn, &filter, &sort, page))
            .await
    }

    pub async fn update_spool(&self, id: i64, update: SpoolUpdate) -> Result<Spool, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let current = get_sync(&tx, id)?;
            let filament_id = match update.filament_id {
                Some(fid) => {
                    filament::ensure_exists(&tx, fid)?;
                    fid
                }
                None => current.filament.id,
            };
            let mut first_used = current.first_used;
            update.first_used.apply(&mut first_used);
            let mut last_used = current.last_used;
            update.last_used.apply(&mut last_used);
            let mut price = current.price;
            update.price.apply(&mut price);
            let mut location = current.location;
            update.location.apply(&mut location);
            let mut lot_nr = current.lot_nr;
            update.lot_nr.apply(&mut lot_nr);
            let mut comment = current.comment;
            update.comment.apply(&mut comment);
            tx.execute(
                "UPDATE spool SET first_used = ?1, last_used = ?2, filament_id = ?3, \
                 price = ?4, used_weight = ?5, location = ?6, lot_nr = ?7, comment = ?8, \
                 archived = ?9 WHERE id = ?10",
                params![
                    first_used.map(|dt| dt.timestamp()),
                    last_used.map(|dt| dt.timestamp()),
                    filament_id,
                    price,
                    update.used_weight.unwrap_or(current.used_weight),
                    location,
                    lot_nr,
                    comment,
                    update.archived.unwrap_or(current.archived),
                    id,
                ],
            )?;
            if let Some(extra) = update.extra {
                sql::replace_extra(&tx, "spool_field", "spool_id", id, &extra)?;
            }
            let spool = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(spool)
        })
        .await
    }

    pub async fn delete_spool(&self, id: i64) -> Result<Spool, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let spool = get_sync(&tx, id)?;
            tx.execute("DELETE FROM spool WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(spool)
        })
        .await
    }

    /// Records a consumption of `use_weight` grams, stamping first/last
    /// use. Negative amounts put filament back; the counter never goes
    /// below zero.
    pub async fn use_spool_weight(&self, id: i64, use_weight: f64) -> Result<Spool, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let spool = get_sync(&tx, id)?;
            let used = (spool.used_weight + use_weight).max(0.0);
            let spool = stamp_usage(&tx, id, used)?;
            tx.commit()?;
            Ok(spool)
        })
        .await
    }

    /// Records a fresh gross weight measurement of the spool. Requires the
    /// filament's net weight and empty-spool weight to convert the
    /// measurement into a consumption counter.
    pub async fn measure_spool(&self, id: i64, weight: f64) -> Result<Spool, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let spool = get_sync(&tx, id)?;
            let net = spool.filament.weight.ok_or_else(|| {
                StoreError::Invalid("filament has no weight set, cannot measure".to_string())
            })?;
            let tare = spool.filament.spool_weight.ok_or_else(|| {
                StoreError::Invalid("filament has no spool_weight set, cannot measure".to_string())
            })?;
            let used = ((net + tare) - weight).max(0.0);
            let spool = stamp_usage(&tx, id, used)?;
            tx.commit()?;
            Ok(spool)
        })
        .await
    }
}

fn stamp_usage(conn: &Connection, id: i64, used_weight: f64) -> Result<Spool, StoreError> {
    let now = utc_now_seconds().timestamp();
    conn.execute(
        "UPDATE spool SET used_weight = ?1, \
         first_used = COALESCE(first_used, ?2), last_used = ?2 WHERE id = ?3",
        params![used_weight, now, id],
    )?;
    get_sync(conn, id)
}

struct RawSpool {
    id: i64,
    registered: i64,
    first_used: Option<i64>,
    last_used: Option<i64>,
    filament_id: i64,
    price: Option<f64>,
    used_weight: f64,
    location: Option<String>,
    lot_nr: Option<String>,
    comment: Option<String>,
    archived: bool,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSpool> {
    Ok(RawSpool {
        id: row.get(0)?,
        registered: row.get(1)?,
        first_used: row.get(2)?,
        last_used: row.get(3)?,
        filament_id: row.get(4)?,
        price: row.get(5)?,
        used_weight: row.get(6)?,
        location: row.get(7)?,
        lot_nr: row.get(8)?,
        comment: row.get(9)?,
        archived: row.get(10)?,
    })
}

fn from_raw(conn: &Connection, raw: RawSpool) -> Result<Spool, StoreError> {
    Ok(Spool {
        id: raw.id,
        registered: sql::datetime("spool.registered", raw.registered)?,
        first_used: sql::opt_datetime("spool.first_used", raw.first_used)?,
        last_used: sql::opt_datetime("spool.last_used", raw.last_used)?,
        price: raw.price,
        filament: filament::get_sync(conn, raw.filament_id)?,
        used_weight: raw.used_weight,
        location: raw.location,
        lot_nr: raw.lot_nr,
        comment: raw.comment,
        archived: raw.archived,
        extra: sql::load_extra(conn, "spool_field", "spool_id", raw.id)?,
    })
}

fn get_sync(conn: &Connection, id: i64) -> Result<Spool, StoreError> {
    let row = conn
        .query_row(&format!("{SELECT} WHERE s.id = ?1"), [id], map_row)
        .optional()?;
    let raw = row.ok_or(StoreError::NotFound {
        kind: "spool",
        ident: id.to_string(),
    })?;
    from_raw(conn, raw)
}

fn find_sync(
    conn: &Connection,
    filter: &SpoolFilter,
    sort: &[SortKey],
    page: Page,
) -> Result<(Vec<Spool>, u64), StoreError> {
    let mut w = Where::new();
    if !filter.allow_archived {
        w.raw("s.archived = 0");
    }
    if let Some(ids) = &filter.ids {
        w.id_list("s.id", ids);
    }
    if let Some(ids) = &filter.filament_ids {
        w.id_list("s.filament_id", ids);
    }
    if let Some(terms) = &filter.filament_name {
        w.terms("f.name", terms);
    }
    if let Some(terms) = &filter.filament_material {
        w.terms("f.material", terms);
    }
    if let Some(ids) = &filter.vendor_ids {
        w.reference_ids("f.vendor_id", ids);
    }
    if let Some(terms) = &filter.vendor_name {
        w.terms("v.name", terms);
    }
    if let Some(terms) = &filter.location {
        w.terms("s.location", terms);
    }
    if let Some(terms) = &filter.lot_nr {
        w.terms("s.lot_nr", terms);
    }
    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM spool s JOIN filament f ON f.id = s.filament_id \
             LEFT JOIN vendor v ON v.id = f.vendor_id{}",
            w.clause()
        ),
        params_from_iter(w.params.iter()),
        |row| row.get(0),
    )?;
    let order = sql::order_clause(sort, SORT_COLUMNS, "s.id ASC")?;
    let mut stmt = conn.prepare(&format!(
        "{SELECT}{}{}{}",
        w.clause(),
        order,
        sql::limit_clause(page)
    ))?;
    let rows = stmt.query_map(params_from_iter(w.params.iter()), map_row)?;
    let mut spools = Vec::new();
    for row in rows {
        spools.push(from_raw(conn, row?)?);
    }
    Ok((spools, total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewFilament, NewVendor};

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
            .create_filament(NewFilament {
                name: Some("Galaxy Black".to_string()),
                vendor_id: Some(1),
                material: Some("PLA".to_string()),
                density: 1.24,
                diameter: 1.75,
                weight: Some(1000.0),
                spool_weight: Some(200.0),
                ..NewFilament::default()
            })
            .await
            .expect("filament");
        store
            .create_spool(NewSpool {
                filament_id: 1,
                location: Some("Shelf A".to_string()),
                ..NewSpool::default()
            })
            .await
            .expect("spool");
        store
    }

    #[tokio::test]
    async fn use_weight_accumulates_and_stamps_usage() {
        let store = seeded_store().await;
        let spool = store.use_spool_weight(1, 150.0).await.expect("use");
        assert_eq!(spool.used_weight, 150.0);
        assert!(spool.first_used.is_some());
        assert_eq!(spool.first_used, spool.last_used);
        let spool = store.use_spool_weight(1, 50.0).await.expect("use");
        assert_eq!(spool.used_weight, 200.0);
    }

    #[tokio::test]
    async fn use_weight_never_goes_negative() {
        let store = seeded_store().await;
        let spool = store.use_spool_weight(1, -25.0).await.expect("use");
        assert_eq!(spool.used_weight, 0.0);
    }

    #[tokio::test]
    async fn measure_converts_gross_weight_to_consumption() {
        let store = seeded_store().await;
        // 1000 g net + 200 g tare, scale reads 950 g -> 250 g consumed.
        let spool = store.measure_spool(1, 950.0).await.expect("measure");
        assert_eq!(spool.used_weight, 250.0);
        assert_eq!(spool.remaining_weight(), Some(750.0));
    }

    #[tokio::test]
    async fn measure_without_filament_weights_is_invalid() {
        let store = Store::open_in_memory().expect("open");
        store
            .create_filament(NewFilament {
                density: 1.24,
                diameter: 1.75,
                ..NewFilament::default()
            })
            .await
            .expect("filament");
        store
            .create_spool(NewSpool {
                filament_id: 1,
                ..NewSpool::default()
            })
            .await
            .expect("spool");
        assert!(matches!(
            store.measure_spool(1, 900.0).await,
            Err(StoreError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn find_hides_archived_spools_by_default() {
        let store = seeded_store().await;
        store
            .create_spool(NewSpool {
                filament_id: 1,
                archived: true,
                ..NewSpool::default()
            })
            .await
            .expect("spool");
        let (spools, total) = store
            .find_spools(SpoolFilter::default(), Vec::new(), Page::default())
            .await
            .expect("find");
        assert_eq!(total, 1);
        assert_eq!(spools.len(), 1);
        let filter = SpoolFilter {
            allow_archived: true,
            ..SpoolFilter::default()
        };
        let (_, total) = store
            .find_spools(filter, Vec::new(), Page::default())
            .await
            .expect("find");
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn deleting_referenced_filament_conflicts() {
        let store = seeded_store().await;
        assert!(matches!(
            store.delete_filament(1).await,
            Err(StoreError::Conflict(_))
        ));
        store.delete_spool(1).await.expect("delete spool");
        store.delete_filament(1).await.expect("delete filament");
    }
}

// SPDX-License-Identifier: Apache-2.0

use crate::sql::{self, Where};
use crate::{vendor, Store, StoreError};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use spoolman_model::{
    utc_now_seconds, Filament, FilamentFilter, FilamentUpdate, Page, Patch, SortKey, Vendor,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct NewFilament {
    pub name: Option<String>,
    pub vendor_id: Option<i64>,
    pub material: Option<String>,
    pub price: Option<f64>,
    pub density: f64,
    pub diameter: f64,
    pub weight: Option<f64>,
    pub spool_weight: Option<f64>,
    pub article_number: Option<String>,
    pub comment: Option<String>,
    pub settings_extruder_temp: Option<i64>,
    pub settings_bed_temp: Option<i64>,
    pub color_hex: Option<String>,
    pub extra: BTreeMap<String, String>,
}

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "f.id"),
    ("registered", "f.registered"),
    ("name", "f.name"),
    ("vendor.id", "f.vendor_id"),
    ("vendor.name", "v.name"),
    ("material", "f.material"),
    ("price", "f.price"),
    ("density", "f.density"),
    ("diameter", "f.diameter"),
    ("weight", "f.weight"),
    ("spool_weight", "f.spool_weight"),
    ("article_number", "f.article_number"),
    ("comment", "f.comment"),
    ("settings_extruder_temp", "f.settings_extruder_temp"),
    ("settings_bed_temp", "f.settings_bed_temp"),
    ("color_hex", "f.color_hex"),
];

const SELECT: &str = "SELECT f.id, f.registered, f.name, f.vendor_id, f.material, f.price, \
     f.density, f.diameter, f.weight, f.spool_weight, f.article_number, f.comment, \
     f.settings_extruder_temp, f.settings_bed_temp, f.color_hex, \
     v.registered, v.name, v.comment \
     FROM filament f LEFT JOIN vendor v ON v.id = f.vendor_id";

impl Store {
    pub async fn create_filament(&self, new: NewFilament) -> Result<Filament, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if let Some(vendor_id) = new.vendor_id {
                vendor::ensure_exists(&tx, vendor_id)?;
            }
            let registered = utc_now_seconds();
            tx.execute(
                "INSERT INTO filament (registered, name, vendor_id, material, price, density, \
                 diameter, weight, spool_weight, article_number, comment, \
                 settings_extruder_temp, settings_bed_temp, color_hex) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    registered.timestamp(),
                    new.name,
                    new.vendor_id,
                    new.material,
                    new.price,
                    new.density,
                    new.diameter,
                    new.weight,
                    new.spool_weight,
                    new.article_number,
                    new.comment,
                    new.settings_extruder_temp,
                    new.settings_bed_temp,
                    new.color_hex,
                ],
            )?;
            let id = tx.last_insert_rowid();
            sql::replace_extra(&tx, "filament_field", "filament_id", id, &new.extra)?;
            let filament = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(filament)
        })
        .await
    }

    pub async fn get_filament(&self, id: i64) -> Result<Filament, StoreError> {
        self.with_conn(move |conn| get_sync(conn, id)).await
    }

    pub async fn find_filaments(
        &self,
        filter: FilamentFilter,
        sort: Vec<SortKey>,
        page: Page,
    ) -> Result<(Vec<Filament>, u64), StoreError> {
        self.with_conn(move |conn| find_sync(conn, &filter, &sort, page))
            .await
    }

    pub async fn update_filament(
        &self,
        id: i64,
        update: FilamentUpdate,
    ) -> Result<Filament, StoreError> {
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
            let mut material = current.material;
            update.material.apply(&mut material);
            let mut price = current.price;
            update.price.apply(&mut price);
            let mut weight = current.weight;
            update.weight.apply(&mut weight);
            let mut spool_weight = current.spool_weight;
            update.spool_weight.apply(&mut spool_weight);
            let mut article_number = current.article_number;
            update.article_number.apply(&mut article_number);
            let mut comment = current.comment;
            update.comment.apply(&mut comment);
            let mut settings_extruder_temp = current.settings_extruder_temp;
            update
                .settings_extruder_temp
                .apply(&mut settings_extruder_temp);
            let mut settings_bed_temp = current.settings_bed_temp;
            update.settings_bed_temp.apply(&mut settings_bed_temp);
            let mut color_hex = current.color_hex;
            update.color_hex.apply(&mut color_hex);
            tx.execute(
                "UPDATE filament SET name = ?1, vendor_id = ?2, material = ?3, price = ?4, \
                 density = ?5, diameter = ?6, weight = ?7, spool_weight = ?8, \
                 article_number = ?9, comment = ?10, settings_extruder_temp = ?11, \
                 settings_bed_temp = ?12, color_hex = ?13 WHERE id = ?14",
                params![
                    name,
                    vendor_id,
                    material,
                    price,
                    update.density.unwrap_or(current.density),
                    update.diameter.unwrap_or(current.diameter),
                    weight,
                    spool_weight,
                    article_number,
                    comment,
                    settings_extruder_temp,
                    settings_bed_temp,
                    color_hex,
                    id,
                ],
            )?;
            if let Some(extra) = update.extra {
                sql::replace_extra(&tx, "filament_field", "filament_id", id, &extra)?;
            }
            let filament = get_sync(&tx, id)?;
            tx.commit()?;
            Ok(filament)
        })
        .await
    }

    /// Fails with a conflict while any spool references the filament.
    pub async fn delete_filament(&self, id: i64) -> Result<Filament, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let filament = get_sync(&tx, id)?;
            tx.execute("DELETE FROM filament WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(filament)
        })
        .await
    }
}

struct RawFilament {
    id: i64,
    registered: i64,
    name: Option<String>,
    vendor_id: Option<i64>,
    material: Option<String>,
    price: Option<f64>,
    density: f64,
    diameter: f64,
    weight: Option<f64>,
    spool_weight: Option<f64>,
    article_number: Option<String>,
    comment: Option<String>,
    settings_extruder_temp: Option<i64>,
    settings_bed_temp: Option<i64>,
    color_hex: Option<String>,
    vendor_registered: Option<i64>,
    vendor_name: Option<String>,
    vendor_comment: Option<String>,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFilament> {
    Ok(RawFilament {
        id: row.get(0)?,
        registered: row.get(1)?,
        name: row.get(2)?,
        vendor_id: row.get(3)?,
        material: row.get(4)?,
        price: row.get(5)?,
        density: row.get(6)?,
        diameter: row.get(7)?,
        weight: row.get(8)?,
        spool_weight: row.get(9)?,
        article_number: row.get(10)?,
        comment: row.get(11)?,
        settings_extruder_temp: row.get(12)?,
        settings_bed_temp: row.get(13)?,
        color_hex: row.get(14)?,
        vendor_registered: row.get(15)?,
        vendor_name: row.get(16)?,
        vendor_comment: row.get(17)?,
    })
}

fn from_raw(conn: &Connection, raw: RawFilament) -> Result<Filament, StoreError> {
    let vendor = match raw.vendor_id {
        None => None,
        Some(vendor_id) => {
            let registered = raw.vendor_registered.ok_or_else(|| {
                StoreError::Internal(format!("vendor {vendor_id} row missing registered"))
            })?;
            let name = raw
                .vendor_name
                .ok_or_else(|| StoreError::Internal(format!("vendor {vendor_id} row missing name")))?;
            Some(Vendor {
                id: vendor_id,
                registered: sql::datetime("vendor.registered", registered)?,
                name,
                comment: raw.vendor_comment,
                extra: sql::load_extra(conn, "vendor_field", "vendor_id", vendor_id)?,
            })
        }
    };
    Ok(Filament {
        id: raw.id,
        registered: sql::datetime("filament.registered", raw.registered)?,
        name: raw.name,
        vendor,
        material: raw.material,
        price: raw.price,
        density: raw.density,
        diameter: raw.diameter,
        weight: raw.weight,
        spool_weight: raw.spool_weight,
        article_number: raw.article_number,
        comment: raw.comment,
        settings_extruder_temp: raw.settings_extruder_temp,
        settings_bed_temp: raw.settings_bed_temp,
        color_hex: raw.color_hex,
        extra: sql::load_extra(conn, "filament_field", "filament_id", raw.id)?,
    })
}

pub(crate) fn get_sync(conn: &Connection, id: i64) -> Result<Filament, StoreError> {
    let row = conn
        .query_row(&format!("{SELECT} WHERE f.id = ?1"), [id], map_row)
        .optional()?;
    let raw = row.ok_or(StoreError::NotFound {
        kind: "filament",
        ident: id.to_string(),
    })?;
    from_raw(conn, raw)
}

pub(crate) fn ensure_exists(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM filament WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    found.map(|_| ()).ok_or(StoreError::NotFound {
        kind: "filament",
        ident: id.to_string(),
    })
}

fn find_sync(
    conn: &Connection,
    filter: &FilamentFilter,
    sort: &[SortKey],
    page: Page,
) -> Result<(Vec<Filament>, u64), StoreError> {
    let mut w = Where::new();
    if let Some(ids) = &filter.ids {
        w.id_list("f.id", ids);
    }
    if let Some(terms) = &filter.name {
        w.terms("f.name", terms);
    }
    if let Some(terms) = &filter.material {
        w.terms("f.material", terms);
    }
    if let Some(terms) = &filter.article_number {
        w.terms("f.article_number", terms);
    }
    if let Some(ids) = &filter.vendor_ids {
        w.reference_ids("f.vendor_id", ids);
    }
    if let Some(terms) = &filter.vendor_name {
        w.terms("v.name", terms);
    }
    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM filament f LEFT JOIN vendor v ON v.id = f.vendor_id{}",
            w.clause()
        ),
        params_from_iter(w.params.iter()),
        |row| row.get(0),
    )?;
    let order = sql::order_clause(sort, SORT_COLUMNS, "f.id ASC")?;
    let mut stmt = conn.prepare(&format!(
        "{SELECT}{}{}{}",
        w.clause(),
        order,
        sql::limit_clause(page)
    ))?;
    let rows = stmt.query_map(params_from_iter(w.params.iter()), map_row)?;
    let mut filaments = Vec::new();
    for row in rows {
        filaments.push(from_raw(conn, row?)?);
    }
    Ok((filaments, total as u64))
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
            .create_filament(NewFilament {
                name: Some("Mystery PETG".to_string()),
                material: Some("PETG".to_string()),
                density: 1.27,
                diameter: 1.75,
                ..NewFilament::default()
            })
            .await
            .expect("filament");
        store
    }

    #[tokio::test]
    async fn create_embeds_the_vendor_record() {
        let store = seeded_store().await;
        let filament = store.get_filament(1).await.expect("get");
        let vendor = filament.vendor.expect("vendor");
        assert_eq!(vendor.name, "Prusament");
    }

    #[tokio::test]
    async fn create_with_unknown_vendor_is_not_found() {
        let store = Store::open_in_memory().expect("open");
        let result = store
            .create_filament(NewFilament {
                vendor_id: Some(9),
                density: 1.24,
                diameter: 1.75,
                ..NewFilament::default()
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { kind: "vendor", .. })));
    }

    #[tokio::test]
    async fn vendor_sentinel_matches_orphan_filaments() {
        let store = seeded_store().await;
        let filter = FilamentFilter {
            vendor_ids: Some(vec![-1]),
            ..FilamentFilter::default()
        };
        let (filaments, total) = store
            .find_filaments(filter, Vec::new(), Page::default())
            .await
            .expect("find");
        assert_eq!(total, 1);
        assert_eq!(filaments[0].name.as_deref(), Some("Mystery PETG"));
    }

    #[tokio::test]
    async fn find_sorts_by_nested_vendor_name() {
        let store = seeded_store().await;
        let sort = spoolman_model::parse_sort_spec("vendor.name:desc").expect("sort");
        let (filaments, _) = store
            .find_filaments(FilamentFilter::default(), sort, Page::default())
            .await
            .expect("find");
        assert_eq!(filaments[0].vendor.as_ref().map(|v| v.name.as_str()), Some("Prusament"));
    }

    #[tokio::test]
    async fn update_can_detach_the_vendor() {
        let store = seeded_store().await;
        let update = FilamentUpdate {
            vendor_id: Patch::Clear,
            ..FilamentUpdate::default()
        };
        let filament = store.update_filament(1, update).await.expect("update");
        assert!(filament.vendor.is_none());
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::errors::ApiError;
use spoolman_model::{
    parse_sort_spec, CoilFilter, FilamentFilter, Page, SortKey, SpoolFilter, VendorFilter,
};

pub const MAX_FIND_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery<F> {
    pub filter: F,
    pub sort: Vec<SortKey>,
    pub page: Page,
}

/// Nested-field query keys use dots (`vendor.id`); the pre-alias underscore
/// names are still accepted.
fn get_either<'a>(
    query: &'a HashMap<String, String>,
    key: &str,
    legacy: &str,
) -> Option<&'a String> {
    query.get(key).or_else(|| query.get(legacy))
}

/// Comma-separated partial search terms; an empty term matches NULL.
fn terms(raw: Option<&String>) -> Option<Vec<String>> {
    raw.map(|value| value.split(',').map(str::to_string).collect())
}

fn id_list(name: &str, raw: Option<&String>) -> Result<Option<Vec<i64>>, ApiError> {
    let Some(value) = raw else {
        return Ok(None);
    };
    let mut ids = Vec::new();
    for item in value.split(',') {
        let id = item
            .trim()
            .parse::<i64>()
            .map_err(|_| ApiError::invalid_param(name, value))?;
        ids.push(id);
    }
    Ok(Some(ids))
}

fn parse_bool(name: &str, raw: Option<&String>) -> Result<bool, ApiError> {
    match raw.map(String::as_str) {
        None => Ok(false),
        Some("1" | "true" | "TRUE" | "yes") => Ok(true),
        Some("0" | "false" | "FALSE" | "no") => Ok(false),
        Some(other) => Err(ApiError::invalid_param(name, other)),
    }
}

fn parse_page(query: &HashMap<String, String>, max_limit: usize) -> Result<Page, ApiError> {
    let limit = match query.get("limit") {
        None => None,
        Some(raw) => {
            let value = raw
                .parse::<usize>()
                .map_err(|_| ApiError::invalid_param("limit", raw))?;
            if value == 0 || value > max_limit {
                return Err(ApiError::invalid_param("limit", raw));
            }
            Some(value)
        }
    };
    let offset = match query.get("offset") {
        None => 0,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::invalid_param("offset", raw))?,
    };
    Ok(Page { limit, offset })
}

fn parse_sort(query: &HashMap<String, String>) -> Result<Vec<SortKey>, ApiError> {
    match query.get("sort") {
        None => Ok(Vec::new()),
        Some(raw) => parse_sort_spec(raw).map_err(|_| ApiError::invalid_param("sort", raw)),
    }
}

pub fn parse_vendor_find(
    query: &HashMap<String, String>,
    max_limit: usize,
) -> Result<FindQuery<VendorFilter>, ApiError> {
    Ok(FindQuery {
        filter: VendorFilter {
            ids: id_list("id", query.get("id"))?,
            name: terms(query.get("name")),
        },
        sort: parse_sort(query)?,
        page: parse_page(query, max_limit)?,
    })
}

pub fn parse_filament_find(
    query: &HashMap<String, String>,
    max_limit: usize,
) -> Result<FindQuery<FilamentFilter>, ApiError> {
    Ok(FindQuery {
        filter: FilamentFilter {
            ids: id_list("id", query.get("id"))?,
            name: terms(query.get("name")),
            material: terms(query.get("material")),
            article_number: terms(query.get("article_number")),
            vendor_ids: id_list("vendor.id", get_either(query, "vendor.id", "vendor_id"))?,
            vendor_name: terms(get_either(query, "vendor.name", "vendor_name")),
        },
        sort: parse_sort(query)?,
        page: parse_page(query, max_limit)?,
    })
}

pub fn parse_spool_find(
    query: &HashMap<String, String>,
    max_limit: usize,
) -> Result<FindQuery<SpoolFilter>, ApiError> {
    Ok(FindQuery {
        filter: SpoolFilter {
            ids: id_list("id", query.get("id"))?,
            filament_ids: id_list("filament.id", get_either(query, "filament.id", "filament_id"))?,
            filament_name: terms(get_either(query, "filament.name", "filament_name")),
            filament_material: terms(get_either(query, "filament.material", "filament_material")),
            vendor_ids: id_list(
                "filament.vendor.id",
                get_either(query, "filament.vendor.id", "vendor_id"),
            )?,
            vendor_name: terms(get_either(query, "filament.vendor.name", "vendor_name")),
            location: terms(query.get("location")),
            lot_nr: terms(query.get("lot_nr")),
            allow_archived: parse_bool("allow_archived", query.get("allow_archived"))?,
        },
        sort: parse_sort(query)?,
        page: parse_page(query, max_limit)?,
    })
}

pub fn parse_coil_find(
    query: &HashMap<String, String>,
    max_limit: usize,
) -> Result<FindQuery<CoilFilter>, ApiError> {
    Ok(FindQuery {
        filter: CoilFilter {
            ids: id_list("id", query.get("id"))?,
            name: terms(query.get("name")),
            vendor_ids: id_list("vendor.id", get_either(query, "vendor.id", "vendor_id"))?,
            vendor_name: terms(get_either(query, "vendor.name", "vendor_name")),
        },
        sort: parse_sort(query)?,
        page: parse_page(query, max_limit)?,
    })
}

// SPDX-License-Identifier: Apache-2.0
//! Create bodies and PATCH parsing.
//!
//! PATCH bodies are parsed from raw JSON so that "field absent" and
//! "field explicitly null" stay distinguishable; only fields present in
//! the request are applied.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::ApiError;
use spoolman_model::{
    parse_color_hex, validate_extra, validate_positive, validate_short_text, validate_text,
    CoilUpdate, FilamentUpdate, Patch, SpoolUpdate, VendorUpdate, COMMENT_MAX_LEN,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorCreate {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl VendorCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::validation_failed("name", "must not be empty"));
        }
        check("name", validate_short_text("name", &self.name))?;
        if let Some(comment) = &self.comment {
            check("comment", validate_text("comment", comment, COMMENT_MAX_LEN))?;
        }
        check("extra", validate_extra(&self.extra))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilamentCreate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    pub density: f64,
    pub diameter: f64,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub spool_weight: Option<f64>,
    #[serde(default)]
    pub article_number: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub settings_extruder_temp: Option<i64>,
    #[serde(default)]
    pub settings_bed_temp: Option<i64>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl FilamentCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        check("density", validate_positive("density", self.density))?;
        check("diameter", validate_positive("diameter", self.diameter))?;
        if let Some(name) = &self.name {
            check("name", validate_short_text("name", name))?;
        }
        if let Some(material) = &self.material {
            check("material", validate_short_text("material", material))?;
        }
        if let Some(weight) = self.weight {
            check("weight", validate_positive("weight", weight))?;
        }
        if let Some(spool_weight) = self.spool_weight {
            check("spool_weight", validate_positive("spool_weight", spool_weight))?;
        }
        if let Some(article_number) = &self.article_number {
            check(
                "article_number",
                validate_short_text("article_number", article_number),
            )?;
        }
        if let Some(comment) = &self.comment {
            check("comment", validate_text("comment", comment, COMMENT_MAX_LEN))?;
        }
        if let Some(color_hex) = &self.color_hex {
            check("color_hex", parse_color_hex(color_hex).map(|_| ()))?;
        }
        check("extra", validate_extra(&self.extra))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpoolCreate {
    pub filament_id: i64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub used_weight: f64,
    #[serde(default)]
    pub first_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lot_nr: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SpoolCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.used_weight < 0.0 || !self.used_weight.is_finite() {
            return Err(ApiError::validation_failed("used_weight", "must be >= 0"));
        }
        if let Some(location) = &self.location {
            check("location", validate_short_text("location", location))?;
        }
        if let Some(lot_nr) = &self.lot_nr {
            check("lot_nr", validate_short_text("lot_nr", lot_nr))?;
        }
        if let Some(comment) = &self.comment {
            check("comment", validate_text("comment", comment, COMMENT_MAX_LEN))?;
        }
        check("extra", validate_extra(&self.extra))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoilCreate {
    #[serde(default)]
    pub name: Option<String>,
    pub vendor_id: i64,
    pub weight: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl CoilCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        check("weight", validate_positive("weight", self.weight))?;
        if let Some(name) = &self.name {
            check("name", validate_short_text("name", name))?;
        }
        if let Some(comment) = &self.comment {
            check("comment", validate_text("comment", comment, COMMENT_MAX_LEN))?;
        }
        check("extra", validate_extra(&self.extra))
    }
}

/// Body of `PUT /spool/{id}/use`: either grams consumed in this use, or a
/// fresh gross weight measurement, never both.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpoolUseBody {
    #[serde(default)]
    pub use_weight: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl SpoolUseBody {
    pub fn validate(&self) -> Result<(), ApiError> {
        match (self.use_weight, self.weight) {
            (Some(_), Some(_)) => Err(ApiError::invalid_body(
                "provide either use_weight or weight, not both",
            )),
            (None, None) => Err(ApiError::invalid_body(
                "either use_weight or weight is required",
            )),
            (Some(v), None) | (None, Some(v)) if !v.is_finite() => {
                Err(ApiError::invalid_body("weight values must be finite"))
            }
            _ => Ok(()),
        }
    }
}

fn check(field: &str, result: Result<(), spoolman_model::ParseError>) -> Result<(), ApiError> {
    result.map_err(|e| ApiError::validation_failed(field, e.to_string()))
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ApiError> {
    value
        .as_object()
        .ok_or_else(|| ApiError::invalid_body("patch body must be a JSON object"))
}

fn patch_string(field: &'static str, value: &Value, max: usize) -> Result<Patch<String>, ApiError> {
    match value {
        Value::Null => Ok(Patch::Clear),
        Value::String(s) => {
            check(field, validate_text(field, s, max))?;
            Ok(Patch::Set(s.clone()))
        }
        _ => Err(ApiError::validation_failed(field, "expected a string or null")),
    }
}

fn patch_f64(field: &'static str, value: &Value, positive: bool) -> Result<Patch<f64>, ApiError> {
    match value {
        Value::Null => Ok(Patch::Clear),
        Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| ApiError::validation_failed(field, "expected a number"))?;
            if positive {
                check(field, validate_positive(field, v))?;
            }
            Ok(Patch::Set(v))
        }
        _ => Err(ApiError::validation_failed(field, "expected a number or null")),
    }
}

fn patch_i64(field: &'static str, value: &Value) -> Result<Patch<i64>, ApiError> {
    match value {
        Value::Null => Ok(Patch::Clear),
        Value::Number(n) => n
            .as_i64()
            .map(Patch::Set)
            .ok_or_else(|| ApiError::validation_failed(field, "expected an integer")),
        _ => Err(ApiError::validation_failed(field, "expected an integer or null")),
    }
}

fn patch_datetime(field: &'static str, value: &Value) -> Result<Patch<DateTime<Utc>>, ApiError> {
    match value {
        Value::Null => Ok(Patch::Clear),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Patch::Set(dt.with_timezone(&Utc)))
            .map_err(|_| ApiError::validation_failed(field, "expected an RFC 3339 timestamp")),
        _ => Err(ApiError::validation_failed(
            field,
            "expected an RFC 3339 timestamp or null",
        )),
    }
}

fn required_i64(field: &'static str, value: &Value) -> Result<i64, ApiError> {
    value
        .as_i64()
        .ok_or_else(|| ApiError::validation_failed(field, "expected an integer"))
}

fn extra_map(value: &Value) -> Result<BTreeMap<String, String>, ApiError> {
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::validation_failed("extra", "expected an object of strings"))?;
    let mut map = BTreeMap::new();
    for (key, item) in object {
        let item = item
            .as_str()
            .ok_or_else(|| ApiError::validation_failed("extra", "expected an object of strings"))?;
        map.insert(key.clone(), item.to_string());
    }
    check("extra", validate_extra(&map))?;
    Ok(map)
}

pub fn parse_vendor_patch(body: &Value) -> Result<VendorUpdate, ApiError> {
    let mut update = VendorUpdate::default();
    for (key, value) in as_object(body)? {
        match key.as_str() {
            "name" => match value {
                Value::String(s) if !s.is_empty() => {
                    check("name", validate_short_text("name", s))?;
                    update.name = Some(s.clone());
                }
                _ => return Err(ApiError::validation_failed("name", "must be a non-empty string")),
            },
            "comment" => update.comment = patch_string("comment", value, COMMENT_MAX_LEN)?,
            "extra" => update.extra = Some(extra_map(value)?),
            other => return Err(ApiError::invalid_body(format!("unknown field: {other}"))),
        }
    }
    Ok(update)
}

pub fn parse_filament_patch(body: &Value) -> Result<FilamentUpdate, ApiError> {
    let mut update = FilamentUpdate::default();
    for (key, value) in as_object(body)? {
        match key.as_str() {
            "name" => update.name = patch_string("name", value, spoolman_model::NAME_MAX_LEN)?,
            "vendor_id" => update.vendor_id = patch_i64("vendor_id", value)?,
            "material" => {
                update.material = patch_string("material", value, spoolman_model::NAME_MAX_LEN)?;
            }
            "price" => update.price = patch_f64("price", value, false)?,
            "density" => match patch_f64("density", value, true)? {
                Patch::Set(v) => update.density = Some(v),
                _ => return Err(ApiError::validation_failed("density", "must not be null")),
            },
            "diameter" => match patch_f64("diameter", value, true)? {
                Patch::Set(v) => update.diameter = Some(v),
                _ => return Err(ApiError::validation_failed("diameter", "must not be null")),
            },
            "weight" => update.weight = patch_f64("weight", value, true)?,
            "spool_weight" => update.spool_weight = patch_f64("spool_weight", value, true)?,
            "article_number" => {
                update.article_number =
                    patch_string("article_number", value, spoolman_model::NAME_MAX_LEN)?;
            }
            "comment" => update.comment = patch_string("comment", value, COMMENT_MAX_LEN)?,
            "settings_extruder_temp" => {
                update.settings_extruder_temp = patch_i64("settings_extruder_temp", value)?;
            }
            "settings_bed_temp" => {
                update.settings_bed_temp = patch_i64("settings_bed_temp", value)?;
            }
            "color_hex" => {
                update.color_hex = match patch_string("color_hex", value, 16)? {
                    Patch::Set(s) => {
                        Patch::Set(check_color(&s)?)
                    }
                    other => other,
                };
            }
            "extra" => update.extra = Some(extra_map(value)?),
            other => return Err(ApiError::invalid_body(format!("unknown field: {other}"))),
        }
    }
    Ok(update)
}

fn check_color(raw: &str) -> Result<String, ApiError> {
    parse_color_hex(raw).map_err(|e| ApiError::validation_failed("color_hex", e.to_string()))
}

pub fn parse_spool_patch(body: &Value) -> Result<SpoolUpdate, ApiError> {
    let mut update = SpoolUpdate::default();
    for (key, value) in as_object(body)? {
        match key.as_str() {
            "filament_id" => update.filament_id = Some(required_i64("filament_id", value)?),
            "price" => update.price = patch_f64("price", value, false)?,
            "used_weight" => match patch_f64("used_weight", value, false)? {
                Patch::Set(v) if v >= 0.0 => update.used_weight = Some(v),
                _ => return Err(ApiError::validation_failed("used_weight", "must be >= 0")),
            },
            "first_used" => update.first_used = patch_datetime("first_used", value)?,
            "last_used" => update.last_used = patch_datetime("last_used", value)?,
            "location" => {
                update.location = patch_string("location", value, spoolman_model::NAME_MAX_LEN)?;
            }
            "lot_nr" => update.lot_nr = patch_string("lot_nr", value, spoolman_model::NAME_MAX_LEN)?,
            "comment" => update.comment = patch_string("comment", value, COMMENT_MAX_LEN)?,
            "archived" => {
                update.archived = Some(value.as_bool().ok_or_else(|| {
                    ApiError::validation_failed("archived", "expected a boolean")
                })?);
            }
            "extra" => update.extra = Some(extra_map(value)?),
            other => return Err(ApiError::invalid_body(format!("unknown field: {other}"))),
        }
    }
    Ok(update)
}

pub fn parse_coil_patch(body: &Value) -> Result<CoilUpdate, ApiError> {
    let mut update = CoilUpdate::default();
    for (key, value) in as_object(body)? {
        match key.as_str() {
            "name" => update.name = patch_string("name", value, spoolman_model::NAME_MAX_LEN)?,
            "vendor_id" => update.vendor_id = patch_i64("vendor_id", value)?,
            "weight" => match patch_f64("weight", value, true)? {
                Patch::Set(v) => update.weight = Some(v),
                _ => return Err(ApiError::validation_failed("weight", "must not be null")),
            },
            "comment" => update.comment = patch_string("comment", value, COMMENT_MAX_LEN)?,
            "extra" => update.extra = Some(extra_map(value)?),
            other => return Err(ApiError::invalid_body(format!("unknown field: {other}"))),
        }
    }
    Ok(update)
}

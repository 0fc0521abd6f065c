// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use spoolman_model::{Coil, Filament, Setting, Spool, Vendor};

/// Simple message body used by delete responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub message: String,
}

impl Message {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorDto {
    pub id: i64,
    pub registered: DateTime<Utc>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl From<&Vendor> for VendorDto {
    fn from(vendor: &Vendor) -> Self {
        Self {
            id: vendor.id,
            registered: vendor.registered,
            name: vendor.name.clone(),
            comment: vendor.comment.clone(),
            extra: vendor.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentDto {
    pub id: i64,
    pub registered: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub density: f64,
    pub diameter: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_extruder_temp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_bed_temp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl From<&Filament> for FilamentDto {
    fn from(filament: &Filament) -> Self {
        Self {
            id: filament.id,
            registered: filament.registered,
            name: filament.name.clone(),
            vendor: filament.vendor.as_ref().map(VendorDto::from),
            material: filament.material.clone(),
            price: filament.price,
            density: filament.density,
            diameter: filament.diameter,
            weight: filament.weight,
            spool_weight: filament.spool_weight,
            article_number: filament.article_number.clone(),
            comment: filament.comment.clone(),
            settings_extruder_temp: filament.settings_extruder_temp,
            settings_bed_temp: filament.settings_bed_temp,
            color_hex: filament.color_hex.clone(),
            extra: filament.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoolDto {
    pub id: i64,
    pub registered: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub filament: FilamentDto,
    pub used_weight: f64,
    /// Derived from the filament's net weight; absent when that is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_nr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub archived: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl From<&Spool> for SpoolDto {
    fn from(spool: &Spool) -> Self {
        Self {
            id: spool.id,
            registered: spool.registered,
            first_used: spool.first_used,
            last_used: spool.last_used,
            price: spool.price,
            filament: FilamentDto::from(&spool.filament),
            used_weight: spool.used_weight,
            remaining_weight: spool.remaining_weight(),
            location: spool.location.clone(),
            lot_nr: spool.lot_nr.clone(),
            comment: spool.comment.clone(),
            archived: spool.archived,
            extra: spool.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoilDto {
    pub id: i64,
    pub registered: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorDto>,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl From<&Coil> for CoilDto {
    fn from(coil: &Coil) -> Self {
        Self {
            id: coil.id,
            registered: coil.registered,
            name: coil.name.clone(),
            vendor: coil.vendor.as_ref().map(VendorDto::from),
            weight: coil.weight,
            comment: coil.comment.clone(),
            extra: coil.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingDto {
    pub key: String,
    pub value: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&Setting> for SettingDto {
    fn from(setting: &Setting) -> Self {
        Self {
            key: setting.key.clone(),
            value: setting.value.clone(),
            last_updated: setting.last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthDto {
    pub status: String,
}

/// Build provenance surfaced at runtime; the values originate from the
/// image packaging pipeline's build arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfoDto {
    pub version: String,
    pub git_commit: String,
    pub build_date: String,
    pub db_type: String,
    pub data_dir: String,
}

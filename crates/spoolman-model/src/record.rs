// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::field::{
    parse_color_hex, validate_extra, validate_positive, validate_short_text, validate_text,
    ParseError, COMMENT_MAX_LEN,
};

/// Registration and usage timestamps are stored at second precision, like
/// the rest of the inventory data.
#[must_use]
pub fn utc_now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: i64,
    pub registered: DateTime<Utc>,
    pub name: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Vendor {
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.name.is_empty() {
            return Err(ParseError::Empty("name"));
        }
        validate_short_text("name", &self.name)?;
        if let Some(comment) = &self.comment {
            validate_text("comment", comment, COMMENT_MAX_LEN)?;
        }
        validate_extra(&self.extra)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filament {
    pub id: i64,
    pub registered: DateTime<Utc>,
    pub name: Option<String>,
    pub vendor: Option<Vendor>,
    pub material: Option<String>,
    pub price: Option<f64>,
    pub density: f64,
    pub diameter: f64,
    /// Net weight of the filament on a full spool, in grams.
    pub weight: Option<f64>,
    /// Weight of an empty spool, in grams.
    pub spool_weight: Option<f64>,
    pub article_number: Option<String>,
    pub comment: Option<String>,
    pub settings_extruder_temp: Option<i64>,
    pub settings_bed_temp: Option<i64>,
    pub color_hex: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Filament {
    pub fn validate(&self) -> Result<(), ParseError> {
        if let Some(name) = &self.name {
            validate_short_text("name", name)?;
        }
        if let Some(material) = &self.material {
            validate_short_text("material", material)?;
        }
        if let Some(article_number) = &self.article_number {
            validate_short_text("article_number", article_number)?;
        }
        if let Some(comment) = &self.comment {
            validate_text("comment", comment, COMMENT_MAX_LEN)?;
        }
        validate_positive("density", self.density)?;
        validate_positive("diameter", self.diameter)?;
        if let Some(weight) = self.weight {
            validate_positive("weight", weight)?;
        }
        if let Some(spool_weight) = self.spool_weight {
            validate_positive("spool_weight", spool_weight)?;
        }
        if let Some(color_hex) = &self.color_hex {
            parse_color_hex(color_hex)?;
        }
        validate_extra(&self.extra)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spool {
    pub id: i64,
    pub registered: DateTime<Utc>,
    pub first_used: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub filament: Filament,
    /// Grams of filament consumed from this spool.
    pub used_weight: f64,
    pub location: Option<String>,
    pub lot_nr: Option<String>,
    pub comment: Option<String>,
    pub archived: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Spool {
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.used_weight < 0.0 || !self.used_weight.is_finite() {
            return Err(ParseError::InvalidFormat("used_weight must be >= 0"));
        }
        if let Some(location) = &self.location {
            validate_short_text("location", location)?;
        }
        if let Some(lot_nr) = &self.lot_nr {
            validate_short_text("lot_nr", lot_nr)?;
        }
        if let Some(comment) = &self.comment {
            validate_text("comment", comment, COMMENT_MAX_LEN)?;
        }
        validate_extra(&self.extra)
    }

    /// Grams left on the spool, derived from the filament's declared net
    /// weight. `None` when the filament does not declare one.
    #[must_use]
    pub fn remaining_weight(&self) -> Option<f64> {
        self.filament
            .weight
            .map(|net| (net - self.used_weight).max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coil {
    pub id: i64,
    pub registered: DateTime<Utc>,
    pub name: Option<String>,
    pub vendor: Option<Vendor>,
    /// Empty coil weight in grams.
    pub weight: f64,
    pub comment: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Coil {
    pub fn validate(&self) -> Result<(), ParseError> {
        if let Some(name) = &self.name {
            validate_short_text("name", name)?;
        }
        validate_positive("weight", self.weight)?;
        if let Some(comment) = &self.comment {
            validate_text("comment", comment, COMMENT_MAX_LEN)?;
        }
        validate_extra(&self.extra)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub last_updated: DateTime<Utc>,
}

// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tri-state for PATCH semantics: only fields present in the request are
/// touched, and an explicit null clears a nullable field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn apply(self, target: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *target = None,
            Self::Set(value) => *target = Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VendorUpdate {
    /// Vendor name is non-nullable; a patch can change it but not clear it.
    pub name: Option<String>,
    pub comment: Patch<String>,
    pub extra: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilamentUpdate {
    pub name: Patch<String>,
    pub vendor_id: Patch<i64>,
    pub material: Patch<String>,
    pub price: Patch<f64>,
    pub density: Option<f64>,
    pub diameter: Option<f64>,
    pub weight: Patch<f64>,
    pub spool_weight: Patch<f64>,
    pub article_number: Patch<String>,
    pub comment: Patch<String>,
    pub settings_extruder_temp: Patch<i64>,
    pub settings_bed_temp: Patch<i64>,
    pub color_hex: Patch<String>,
    pub extra: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpoolUpdate {
    pub filament_id: Option<i64>,
    pub price: Patch<f64>,
    pub used_weight: Option<f64>,
    pub first_used: Patch<DateTime<Utc>>,
    pub last_used: Patch<DateTime<Utc>>,
    pub location: Patch<String>,
    pub lot_nr: Patch<String>,
    pub comment: Patch<String>,
    pub archived: Option<bool>,
    pub extra: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoilUpdate {
    pub name: Patch<String>,
    pub vendor_id: Patch<i64>,
    pub weight: Option<f64>,
    pub comment: Patch<String>,
    pub extra: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_apply_keeps_clears_and_sets() {
        let mut value = Some("old".to_string());
        Patch::Keep.apply(&mut value);
        assert_eq!(value.as_deref(), Some("old"));
        Patch::Set("new".to_string()).apply(&mut value);
        assert_eq!(value.as_deref(), Some("new"));
        Patch::<String>::Clear.apply(&mut value);
        assert_eq!(value, None);
    }
}

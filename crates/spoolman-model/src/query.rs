// SPDX-License-Identifier: Apache-2.0

use crate::field::ParseError;

/// Sentinel accepted in reference id filters: matches records with no
/// vendor/filament set.
pub const NO_REFERENCE_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match raw {
            "asc" | "ASC" => Ok(Self::Asc),
            "desc" | "DESC" => Ok(Self::Desc),
            _ => Err(ParseError::InvalidFormat(
                "sort direction must be 'asc' or 'desc'",
            )),
        }
    }

    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Parse a `field:direction,field:direction` sort specification, keeping
/// the key order as given.
pub fn parse_sort_spec(raw: &str) -> Result<Vec<SortKey>, ParseError> {
    let mut keys = Vec::new();
    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (field, direction) = item.split_once(':').ok_or(ParseError::InvalidFormat(
            "sort items must be 'field:direction'",
        ))?;
        if field.is_empty() {
            return Err(ParseError::Empty("sort field"));
        }
        keys.push(SortKey {
            field: field.to_string(),
            order: SortOrder::parse(direction)?,
        });
    }
    Ok(keys)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Name-ish filters hold comma-separated search terms already split into a
/// list; an empty term matches records where the column is NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorFilter {
    pub ids: Option<Vec<i64>>,
    pub name: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilamentFilter {
    pub ids: Option<Vec<i64>>,
    pub name: Option<Vec<String>>,
    pub material: Option<Vec<String>>,
    pub article_number: Option<Vec<String>>,
    pub vendor_ids: Option<Vec<i64>>,
    pub vendor_name: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpoolFilter {
    pub ids: Option<Vec<i64>>,
    pub filament_ids: Option<Vec<i64>>,
    pub filament_name: Option<Vec<String>>,
    pub filament_material: Option<Vec<String>>,
    pub vendor_ids: Option<Vec<i64>>,
    pub vendor_name: Option<Vec<String>>,
    pub location: Option<Vec<String>>,
    pub lot_nr: Option<Vec<String>>,
    pub allow_archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoilFilter {
    pub ids: Option<Vec<i64>>,
    pub name: Option<Vec<String>>,
    pub vendor_ids: Option<Vec<i64>>,
    pub vendor_name: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_spec_preserves_key_order() {
        let keys = parse_sort_spec("vendor.name:asc,weight:desc").expect("sort spec");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, "vendor.name");
        assert_eq!(keys[0].order, SortOrder::Asc);
        assert_eq!(keys[1].field, "weight");
        assert_eq!(keys[1].order, SortOrder::Desc);
    }

    #[test]
    fn sort_spec_rejects_missing_direction() {
        assert!(parse_sort_spec("name").is_err());
        assert!(parse_sort_spec("name:sideways").is_err());
    }

    #[test]
    fn sort_spec_skips_empty_items() {
        let keys = parse_sort_spec("name:asc,,").expect("sort spec");
        assert_eq!(keys.len(), 1);
    }
}

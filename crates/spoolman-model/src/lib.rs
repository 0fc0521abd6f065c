#![forbid(unsafe_code)]
//! Spoolman domain model SSOT.
//!
//! Record shapes, field limits, and validation for the filament inventory.
//! Everything that crosses a crate boundary (store, API, event feed) is
//! defined here once.

mod event;
mod field;
mod query;
mod record;
mod update;

pub use event::{ChangeEvent, EventType, ResourceKind};
pub use field::{
    parse_color_hex, parse_setting_key, validate_extra, validate_positive, validate_short_text,
    validate_text, ParseError, COLOR_HEX_MAX_LEN, COMMENT_MAX_LEN, EXTRA_KEY_MAX_LEN,
    NAME_MAX_LEN, SETTING_KEY_MAX_LEN,
};
pub use query::{
    parse_sort_spec, Page, SortKey, SortOrder, CoilFilter, FilamentFilter, SpoolFilter,
    VendorFilter, NO_REFERENCE_ID,
};
pub use record::{
    utc_now_seconds, Coil, Filament, Setting, Spool, Vendor,
};
pub use update::{CoilUpdate, FilamentUpdate, Patch, SpoolUpdate, VendorUpdate};

pub const CRATE_NAME: &str = "spoolman-model";

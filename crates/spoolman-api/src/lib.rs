#![forbid(unsafe_code)]
//! Wire surface of the Spoolman REST API: DTOs, query/body parameter
//! parsing, and the error envelope with its status mapping.

mod dto;
mod error_mapping;
mod errors;
mod params;
mod patch;

pub use dto::{
    CoilDto, FilamentDto, HealthDto, InfoDto, Message, SettingDto, SpoolDto, VendorDto,
};
pub use error_mapping::map_error_status;
pub use errors::{ApiError, ApiErrorCode};
pub use params::{
    parse_coil_find, parse_filament_find, parse_spool_find, parse_vendor_find, FindQuery,
    MAX_FIND_LIMIT,
};
pub use patch::{
    parse_coil_patch, parse_filament_patch, parse_spool_patch, parse_vendor_patch, CoilCreate,
    FilamentCreate, SpoolCreate, SpoolUseBody, VendorCreate,
};

pub const API_VERSION: &str = "v1";

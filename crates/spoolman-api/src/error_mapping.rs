// SPDX-License-Identifier: Apache-2.0

use crate::{ApiError, ApiErrorCode};

#[must_use]
pub fn map_error_status(error: &ApiError) -> u16 {
    match error.code {
        ApiErrorCode::InvalidQueryParameter
        | ApiErrorCode::InvalidBody
        | ApiErrorCode::ValidationFailed => 400,
        ApiErrorCode::NotFound => 404,
        ApiErrorCode::DeleteConflict => 409,
        ApiErrorCode::Internal => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_client_and_server_classes() {
        assert_eq!(map_error_status(&ApiError::invalid_param("limit", "x")), 400);
        assert_eq!(map_error_status(&ApiError::not_found("spool", "9")), 404);
        assert_eq!(map_error_status(&ApiError::delete_conflict("vendor", "1")), 409);
        assert_eq!(map_error_status(&ApiError::internal("boom")), 500);
    }
}

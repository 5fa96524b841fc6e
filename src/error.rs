//! Application error taxonomy

use thiserror::Error;
use uuid::Uuid;

use crate::types::messages::ErrorResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("distance/time matrix unavailable: {0}")]
    MatrixUnavailable(String),

    #[error("infeasible: {} stop(s) could not be assigned", .unassigned.len())]
    Infeasible { unassigned: Vec<Uuid> },

    #[error("solver exceeded its time budget")]
    Timeout,

    #[error("{0} not found")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::MatrixUnavailable(_) => "matrix_unavailable",
            AppError::Infeasible { .. } => "infeasible",
            AppError::Timeout => "timeout",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn into_response(self, request_id: Uuid) -> ErrorResponse {
        let code = self.code();
        ErrorResponse::new(request_id, code, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_code() {
        let err = AppError::Infeasible { unassigned: vec![Uuid::nil()] };
        assert_eq!(err.code(), "infeasible");
    }

    #[test]
    fn test_into_response_carries_message() {
        let err = AppError::NotFound("job abc".into());
        let resp = err.into_response(Uuid::nil());
        assert_eq!(resp.error.code, "not_found");
        assert!(resp.error.message.contains("job abc"));
    }
}

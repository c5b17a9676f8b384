use thiserror::Error;

use crate::domain::{Role, TractorId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Tractor not found: {0}")]
    TractorNotFound(TractorId),

    #[error("Spare part not found: {0}")]
    PartNotFound(String),

    #[error("Service record not found: {0}")]
    ServiceRecordNotFound(i64),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Tractor {tractor_id} ({label}) is already sold")]
    AlreadySold { tractor_id: TractorId, label: String },

    #[error("Insufficient stock for {part_name}: available {available}, requested {requested}")]
    InsufficientStock {
        part_name: String,
        available: i64,
        requested: i64,
    },

    #[error("Chassis number already registered: {0}")]
    ChassisNumberExists(String),

    #[error("Part number already registered: {0}")]
    PartNumberExists(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Invalid username, password or token")]
    AuthenticationFailed,

    #[error("This operation requires the {required} role")]
    Forbidden { required: Role },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Coarse classification used by transports to pick a status or exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Persistence,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::TractorNotFound(_)
            | AppError::PartNotFound(_)
            | AppError::ServiceRecordNotFound(_)
            | AppError::ExpenseNotFound(_)
            | AppError::UserNotFound(_) => ErrorKind::NotFound,
            AppError::AlreadySold { .. }
            | AppError::InsufficientStock { .. }
            | AppError::ChassisNumberExists(_)
            | AppError::PartNumberExists(_)
            | AppError::UsernameTaken(_) => ErrorKind::Conflict,
            AppError::AuthenticationFailed | AppError::Forbidden { .. } => ErrorKind::Unauthorized,
            AppError::Database(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AppError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(AppError::TractorNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::InsufficientStock {
                part_name: "Oil filter".into(),
                available: 5,
                requested: 6,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::Forbidden { required: Role::Admin }.kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_insufficient_stock_message_names_part() {
        let err = AppError::InsufficientStock {
            part_name: "Oil filter".into(),
            available: 5,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Oil filter: available 5, requested 6"
        );
    }
}

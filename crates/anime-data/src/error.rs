//! Error types for the data access layer.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised by the data access layer.
#[derive(Debug)]
pub enum DataError {
    /// Migration execution failed.
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A row was expected to exist but did not.
    NotFound {
        /// What was being looked up, for logging (e.g. `"show"`, `"parsed_title"`).
        entity: &'static str,
    },
    /// A stored enum column held a value this build does not recognize.
    UnknownVariant {
        /// Column that held the value.
        column: &'static str,
        /// The offending stored value.
        value: String,
    },
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrationFailed { .. } => formatter.write_str("migration failed"),
            Self::QueryFailed { operation, .. } => {
                write!(formatter, "database operation '{operation}' failed")
            }
            Self::NotFound { entity } => write!(formatter, "{entity} not found"),
            Self::UnknownVariant { column, value } => {
                write!(formatter, "column '{column}' held unrecognized value '{value}'")
            }
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MigrationFailed { source } => Some(source),
            Self::QueryFailed { source, .. } => Some(source),
            Self::NotFound { .. } | Self::UnknownVariant { .. } => None,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: "sqlx operation",
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_display_and_source() {
        let migration = DataError::MigrationFailed {
            source: sqlx::migrate::MigrateError::VersionMissing(1),
        };
        assert_eq!(migration.to_string(), "migration failed");
        assert!(migration.source().is_some());

        let query = DataError::QueryFailed {
            operation: "fetch",
            source: sqlx::Error::RowNotFound,
        };
        assert_eq!(query.to_string(), "database operation 'fetch' failed");
        assert!(query.source().is_some());

        let not_found = DataError::NotFound { entity: "show" };
        assert_eq!(not_found.to_string(), "show not found");
        assert!(not_found.source().is_none());

        let unknown = DataError::UnknownVariant {
            column: "parser_tag",
            value: "wat".to_string(),
        };
        assert_eq!(
            unknown.to_string(),
            "column 'parser_tag' held unrecognized value 'wat'"
        );

        let from = DataError::from(sqlx::Error::RowNotFound);
        assert_eq!(from.to_string(), "database operation 'sqlx operation' failed");
    }
}

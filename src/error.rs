//! Error type for `sybil-orm`.

use thiserror::Error;

use crate::plan::Phase;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse schema {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The schema documents are unusable as written. Raised before any DDL.
    #[error("schema error:\n{0}")]
    Authoring(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A batch of queued statements failed.
    #[error("database update queries failed during the {phase} phase.\n> Callback message: {message}\n> Error code: {code}")]
    Execution {
        phase: Phase,
        message: String,
        code: String,
    },

    #[error("update canceled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn execution(phase: Phase, err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code().map(|c| c.into_owned()))
            .unwrap_or_else(|| "-".to_string());
        let message = match err.as_database_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };
        Error::Execution {
            phase,
            message,
            code,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the core can report.
///
/// None of these should end the process: hotkey and persistence errors become
/// diagnostics in the transcript, request errors end the current working cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hotkey '{0}'")]
    InvalidHotkeySpec(String),

    #[error("global hotkey '{spec}' could not be registered: {reason}")]
    HotkeyRegistrationFailed { spec: String, reason: String },

    #[error("{var} is not set. Set it in your environment or a .env file.")]
    MissingCredential { var: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("could not write {path}: {source}")]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read {path}: {reason}")]
    PersistenceReadFailed { path: PathBuf, reason: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Body decoding is mapped at the call site, where the status is known
        match err.status() {
            Some(status) => Error::Upstream {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => Error::Network(err.to_string()),
        }
    }
}

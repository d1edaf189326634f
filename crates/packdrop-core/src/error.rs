//! Error types for the scan and reward paths.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// No signed-in user; scan and claim calls do nothing
    #[error("Login required")]
    NotAuthenticated,

    #[error("Item not found in catalog: {0}")]
    UnknownItem(String),

    /// Backend call faulted or was canceled. Shown to the user as a generic
    /// connection error; the detail is only logged.
    #[error("Connection error")]
    Backend(String),

    #[error("Reward already claimed")]
    AlreadyClaimed,

    #[error("Reward not unlocked yet ({count}/{threshold})")]
    NotEligible { count: u32, threshold: u32 },

    #[error("Invalid item: {0}")]
    InvalidItem(String),
}

impl ScanError {
    /// Wrap a storage error, keeping its message for the logs
    pub fn backend(err: anyhow::Error) -> Self {
        ScanError::Backend(format!("{:#}", err))
    }
}

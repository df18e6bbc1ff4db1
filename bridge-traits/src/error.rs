use thiserror::Error;

/// Error shared by every host bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide this capability right now (no audio device,
    /// no background budget, unsupported source).
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// A session, file or bundled resource the caller named does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

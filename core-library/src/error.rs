use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Settings store error: {0}")]
    Bridge(#[from] BridgeError),

    /// Catalog content that breaks an invariant (duplicate section ids,
    /// tracks with an empty filename and so on).
    #[error("Invalid catalog: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;

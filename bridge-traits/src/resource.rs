//! Bundled resource lookup.

use crate::error::Result;
use crate::playback::AudioSource;

/// Read-only resources shipped with the application.
///
/// On mobile this is the app bundle; on desktop it is a directory next to
/// the executable or a static HTTP origin.
#[async_trait::async_trait]
pub trait ResourceBundle: Send + Sync {
    /// Locate a bundled file by name (for example `Hour.mp3`).
    ///
    /// Returns `Ok(None)` if the bundle does not ship that resource.
    async fn locate(&self, file_name: &str) -> Result<Option<AudioSource>>;
}

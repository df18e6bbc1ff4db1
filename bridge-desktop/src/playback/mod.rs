//! Playback adapters for desktop.
//!
//! - [`HeadlessPlaybackAdapter`]: clock-driven player with no audio output,
//!   used by servers, CI and as the default when no output device is wanted.
//! - `RodioPlaybackAdapter` (feature `audio-output`): real output through the
//!   default audio device.

mod headless;
#[cfg(feature = "audio-output")]
mod rodio_output;

pub use headless::HeadlessPlaybackAdapter;
#[cfg(feature = "audio-output")]
pub use rodio_output::RodioPlaybackAdapter;

use bridge_traits::error::{BridgeError, Result};
use std::path::Path;
use std::time::Duration;

/// Read the stream duration from container metadata.
pub(crate) async fn probe_duration(path: &Path) -> Result<Duration> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || probe_duration_blocking(&owned))
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Probe task failed: {}", e)))?
}

pub(crate) fn probe_duration_blocking(path: &Path) -> Result<Duration> {
    use lofty::file::AudioFile;

    let tagged = lofty::read_from_path(path).map_err(|e| {
        BridgeError::OperationFailed(format!("Unreadable audio file {}: {}", path.display(), e))
    })?;
    Ok(tagged.properties().duration())
}

//! Playback speeds.

use crate::error::PlaybackError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fixed playback rates offered to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    #[default]
    Normal,
    OneAndHalf,
    Double,
    Triple,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Normal,
        PlaybackSpeed::OneAndHalf,
        PlaybackSpeed::Double,
        PlaybackSpeed::Triple,
    ];

    pub fn as_f32(self) -> f32 {
        match self {
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::OneAndHalf => 1.5,
            PlaybackSpeed::Double => 2.0,
            PlaybackSpeed::Triple => 3.0,
        }
    }
}

impl TryFrom<f32> for PlaybackSpeed {
    type Error = PlaybackError;

    fn try_from(rate: f32) -> Result<Self, Self::Error> {
        PlaybackSpeed::ALL
            .into_iter()
            .find(|speed| (speed.as_f32() - rate).abs() < f32::EPSILON)
            .ok_or(PlaybackError::InvalidSpeed(rate))
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.as_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_rates() {
        assert_eq!(PlaybackSpeed::try_from(2.0).unwrap(), PlaybackSpeed::Double);
        assert_eq!(PlaybackSpeed::try_from(1.5).unwrap(), PlaybackSpeed::OneAndHalf);
        assert_eq!(PlaybackSpeed::default().as_f32(), 1.0);
    }

    #[test]
    fn test_rejects_other_rates() {
        for rate in [0.0, 0.5, 1.25, 2.5, 4.0, f32::NAN] {
            assert!(matches!(
                PlaybackSpeed::try_from(rate),
                Err(PlaybackError::InvalidSpeed(_))
            ));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(PlaybackSpeed::OneAndHalf.to_string(), "1.5x");
        assert_eq!(PlaybackSpeed::Triple.to_string(), "3x");
    }
}

//! Streak counter.
//!
//! A persisted day count with a last-updated stamp. Every mutation is
//! written to the settings store before it returns.

use crate::error::Result;
use bridge_traits::{Clock, SettingsStore};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const STREAK_DAYS_KEY: &str = "streakDays";
pub const LAST_UPDATED_KEY: &str = "lastUpdated";

const LAST_UPDATED_FORMAT: &str = "%b %-d, %Y at %-I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakRecord {
    /// Never negative
    pub days: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StreakRecord {
    /// `"Last Updated: Mar 1, 2024 at 9:30 AM"` in `tz`, or empty if never
    /// updated.
    pub fn formatted_last_updated_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match self.last_updated {
            Some(at) => format!(
                "Last Updated: {}",
                at.with_timezone(tz).format(LAST_UPDATED_FORMAT)
            ),
            None => String::new(),
        }
    }
}

pub struct StreakCounter {
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    record: Mutex<StreakRecord>,
}

impl StreakCounter {
    /// Load the persisted streak. Missing or unreadable values start at zero.
    pub async fn load(settings: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        let days = match settings.get_i64(STREAK_DAYS_KEY).await {
            Ok(days) => days.unwrap_or(0).max(0),
            Err(e) => {
                warn!(error = %e, "Failed to read streak days; starting at 0");
                0
            }
        };

        let last_updated = match settings.get_string(LAST_UPDATED_KEY).await {
            Ok(Some(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Ignoring malformed streak timestamp");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read streak timestamp");
                None
            }
        };

        debug!(days, "Streak loaded");

        Self {
            settings,
            clock,
            record: Mutex::new(StreakRecord { days, last_updated }),
        }
    }

    pub async fn record(&self) -> StreakRecord {
        *self.record.lock().await
    }

    /// Add `delta` days (negative to subtract), flooring at zero, and stamp
    /// the change with the current time.
    ///
    /// The in-memory value only changes once both keys are persisted.
    pub async fn update_streak(&self, delta: i64) -> Result<StreakRecord> {
        let mut record = self.record.lock().await;

        let updated = StreakRecord {
            days: record.days.saturating_add(delta).max(0),
            last_updated: Some(self.clock.now()),
        };

        self.settings.set_i64(STREAK_DAYS_KEY, updated.days).await?;
        if let Some(at) = updated.last_updated {
            self.settings
                .set_string(LAST_UPDATED_KEY, &at.to_rfc3339())
                .await?;
        }

        debug!(from = record.days, to = updated.days, "Streak updated");
        *record = updated;
        Ok(updated)
    }

    pub async fn increment(&self) -> Result<StreakRecord> {
        self.update_streak(1).await
    }

    pub async fn decrement(&self) -> Result<StreakRecord> {
        self.update_streak(-1).await
    }

    /// Last-updated label in the local time zone.
    pub async fn formatted_last_updated(&self) -> String {
        self.record().await.formatted_last_updated_in(&Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{error::BridgeError, ManualClock};
    use mockall::mock;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySettings {
        values: std::sync::Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn set_string(&self, key: &str, value: &str) -> bridge_traits::error::Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn get_string(&self, key: &str) -> bridge_traits::error::Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }
        async fn set_bool(&self, key: &str, value: bool) -> bridge_traits::error::Result<()> {
            self.set_string(key, &value.to_string()).await
        }
        async fn get_bool(&self, key: &str) -> bridge_traits::error::Result<Option<bool>> {
            Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
        }
        async fn set_i64(&self, key: &str, value: i64) -> bridge_traits::error::Result<()> {
            self.set_string(key, &value.to_string()).await
        }
        async fn get_i64(&self, key: &str) -> bridge_traits::error::Result<Option<i64>> {
            Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
        }
        async fn set_f64(&self, key: &str, value: f64) -> bridge_traits::error::Result<()> {
            self.set_string(key, &value.to_string()).await
        }
        async fn get_f64(&self, key: &str) -> bridge_traits::error::Result<Option<f64>> {
            Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
        }
        async fn delete(&self, key: &str) -> bridge_traits::error::Result<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
        async fn has_key(&self, key: &str) -> bridge_traits::error::Result<bool> {
            Ok(self.values.lock().unwrap().contains_key(key))
        }
        async fn clear_all(&self) -> bridge_traits::error::Result<()> {
            self.values.lock().unwrap().clear();
            Ok(())
        }
    }

    mock! {
        Settings {}

        #[async_trait]
        impl SettingsStore for Settings {
            async fn set_string(&self, key: &str, value: &str) -> bridge_traits::error::Result<()>;
            async fn get_string(&self, key: &str) -> bridge_traits::error::Result<Option<String>>;
            async fn set_bool(&self, key: &str, value: bool) -> bridge_traits::error::Result<()>;
            async fn get_bool(&self, key: &str) -> bridge_traits::error::Result<Option<bool>>;
            async fn set_i64(&self, key: &str, value: i64) -> bridge_traits::error::Result<()>;
            async fn get_i64(&self, key: &str) -> bridge_traits::error::Result<Option<i64>>;
            async fn set_f64(&self, key: &str, value: f64) -> bridge_traits::error::Result<()>;
            async fn get_f64(&self, key: &str) -> bridge_traits::error::Result<Option<f64>>;
            async fn delete(&self, key: &str) -> bridge_traits::error::Result<()>;
            async fn has_key(&self, key: &str) -> bridge_traits::error::Result<bool>;
            async fn clear_all(&self) -> bridge_traits::error::Result<()>;
        }
    }

    fn clock_at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_fresh_streak_is_zero() {
        let counter = StreakCounter::load(
            Arc::new(MemorySettings::default()),
            clock_at(2024, 3, 1, 9, 30),
        )
        .await;

        assert_eq!(counter.record().await, StreakRecord::default());
        assert_eq!(counter.formatted_last_updated().await, "");
    }

    #[tokio::test]
    async fn test_update_persists_both_keys() {
        let settings = Arc::new(MemorySettings::default());
        let clock = clock_at(2024, 3, 1, 9, 30);
        let counter = StreakCounter::load(settings.clone(), clock.clone()).await;

        counter.increment().await.unwrap();
        let record = counter.increment().await.unwrap();

        assert_eq!(record.days, 2);
        assert_eq!(settings.get_i64(STREAK_DAYS_KEY).await.unwrap(), Some(2));
        assert!(settings.has_key(LAST_UPDATED_KEY).await.unwrap());

        let reloaded = StreakCounter::load(settings, clock).await;
        assert_eq!(reloaded.record().await, record);
    }

    #[tokio::test]
    async fn test_streak_floors_at_zero() {
        let counter = StreakCounter::load(
            Arc::new(MemorySettings::default()),
            clock_at(2024, 3, 1, 9, 30),
        )
        .await;

        counter.update_streak(2).await.unwrap();
        let record = counter.update_streak(-5).await.unwrap();
        assert_eq!(record.days, 0);

        let record = counter.decrement().await.unwrap();
        assert_eq!(record.days, 0);
        assert!(record.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_negative_persisted_value_is_floored() {
        let settings = Arc::new(MemorySettings::default());
        settings.set_i64(STREAK_DAYS_KEY, -4).await.unwrap();
        settings.set_string(LAST_UPDATED_KEY, "not a date").await.unwrap();

        let counter = StreakCounter::load(settings, clock_at(2024, 3, 1, 9, 30)).await;
        assert_eq!(counter.record().await, StreakRecord::default());
    }

    #[tokio::test]
    async fn test_formatted_last_updated() {
        let clock = clock_at(2024, 3, 1, 21, 5);
        let counter = StreakCounter::load(Arc::new(MemorySettings::default()), clock).await;

        let record = counter.increment().await.unwrap();
        assert_eq!(
            record.formatted_last_updated_in(&Utc),
            "Last Updated: Mar 1, 2024 at 9:05 PM"
        );
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_value() {
        let mut settings = MockSettings::new();
        settings.expect_get_i64().returning(|_| Ok(Some(3)));
        settings.expect_get_string().returning(|_| Ok(None));
        settings
            .expect_set_i64()
            .returning(|_, _| Err(BridgeError::OperationFailed("disk full".to_string())));

        let counter = StreakCounter::load(Arc::new(settings), clock_at(2024, 3, 1, 9, 30)).await;

        assert!(counter.increment().await.is_err());
        assert_eq!(counter.record().await.days, 3);
    }
}

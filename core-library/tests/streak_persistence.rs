//! Streak persistence against the SQLite settings store.

use bridge_desktop::SqliteSettingsStore;
use bridge_traits::{ManualClock, SettingsStore};
use chrono::{TimeZone, Utc};
use core_library::streak::{StreakCounter, LAST_UPDATED_KEY, STREAK_DAYS_KEY};
use std::sync::Arc;

#[tokio::test]
async fn test_streak_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("settings.db");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap(),
    ));

    {
        let store: Arc<dyn SettingsStore> =
            Arc::new(SqliteSettingsStore::new(db_path.clone()).await.unwrap());
        let counter = StreakCounter::load(store, clock.clone()).await;
        counter.update_streak(5).await.unwrap();
        counter.decrement().await.unwrap();
    }

    let store: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::new(db_path).await.unwrap());
    assert_eq!(store.get_i64(STREAK_DAYS_KEY).await.unwrap(), Some(4));
    assert!(store.get_string(LAST_UPDATED_KEY).await.unwrap().is_some());

    let counter = StreakCounter::load(store, clock).await;
    let record = counter.record().await;
    assert_eq!(record.days, 4);
    assert_eq!(
        record.formatted_last_updated_in(&Utc),
        "Last Updated: May 10, 2024 at 7:00 AM"
    );
}

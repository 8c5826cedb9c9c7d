use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use shiftbot_core::clock::Clock;
use shiftbot_core::error::StoreError;
use shiftbot_core::store::WatermarkStore;

const LAST_FIRED_KEY: &str = "last_fired_occurrence";

/// Persists the last fired schedule occurrence so a restart near a fire
/// boundary neither repeats nor skips a broadcast.
pub struct SqliteWatermarkStore {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteWatermarkStore {
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Mutex::new(conn),
            clock,
        }
    }
}

impl WatermarkStore for SqliteWatermarkStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let db = self.db.lock().unwrap();
        let value: Option<String> = match db.query_row(
            "SELECT value FROM dispatch_state WHERE key = ?1",
            [LAST_FIRED_KEY],
            |row| row.get(0),
        ) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(StoreError::database(e)),
        };
        value
            .map(|v| {
                DateTime::parse_from_rfc3339(&v)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|e| StoreError::Corrupt {
                        what: LAST_FIRED_KEY.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }

    fn save(&self, occurrence: DateTime<Utc>) -> Result<(), StoreError> {
        let now = self.clock.now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO dispatch_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![LAST_FIRED_KEY, occurrence.to_rfc3339(), now],
        )
        .map_err(StoreError::database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;
    use shiftbot_core::clock::ManualClock;

    fn store_at(now: DateTime<Utc>) -> SqliteWatermarkStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        SqliteWatermarkStore::new(conn, Arc::new(ManualClock::new(now)))
    }

    fn store() -> SqliteWatermarkStore {
        store_at(Utc.with_ymd_and_hms(2024, 10, 19, 18, 0, 5).unwrap())
    }

    #[test]
    fn empty_until_first_save() {
        assert_eq!(store().load().unwrap(), None);
    }

    #[test]
    fn save_overwrites_previous_value() {
        let s = store();
        let first = Utc.with_ymd_and_hms(2024, 10, 19, 6, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 10, 19, 18, 0, 0).unwrap();
        s.save(first).unwrap();
        s.save(second).unwrap();
        assert_eq!(s.load().unwrap(), Some(second));
    }

    #[test]
    fn update_time_comes_from_the_clock() {
        let now = Utc.with_ymd_and_hms(2024, 10, 19, 18, 0, 12).unwrap();
        let s = store_at(now);
        s.save(Utc.with_ymd_and_hms(2024, 10, 19, 18, 0, 0).unwrap()).unwrap();

        let updated_at: String = s
            .db
            .lock()
            .unwrap()
            .query_row(
                "SELECT updated_at FROM dispatch_state WHERE key = ?1",
                [LAST_FIRED_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(updated_at, now.to_rfc3339());
    }
}

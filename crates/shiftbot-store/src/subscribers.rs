use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use shiftbot_core::clock::Clock;
use shiftbot_core::error::StoreError;
use shiftbot_core::store::SubscriberRegistry;
use shiftbot_core::types::{Destination, Subscriber};

/// SQLite-backed set of chats that receive the scheduled document.
pub struct SqliteSubscriberRegistry {
    db: Mutex<Connection>,
    /// Stamps `registered_at`.
    clock: Arc<dyn Clock>,
}

impl SqliteSubscriberRegistry {
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Mutex::new(conn),
            clock,
        }
    }
}

impl SubscriberRegistry for SqliteSubscriberRegistry {
    fn add(&self, destination: Destination) -> Result<bool, StoreError> {
        let now = self.clock.now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db
            .execute(
                "INSERT OR IGNORE INTO subscribers (chat_id, registered_at) VALUES (?1, ?2)",
                rusqlite::params![destination.get(), now],
            )
            .map_err(StoreError::database)?;
        if n > 0 {
            info!(%destination, "subscriber registered");
        }
        Ok(n > 0)
    }

    fn all(&self) -> Result<Vec<Subscriber>, StoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db
            .prepare_cached("SELECT chat_id, registered_at FROM subscribers ORDER BY registered_at")
            .map_err(StoreError::database)?;
        let subscribers = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(StoreError::database)?
            .filter_map(|r| {
                let (chat_id, registered_at) = match r {
                    Ok(row) => row,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable subscriber row");
                        return None;
                    }
                };
                match DateTime::parse_from_rfc3339(&registered_at) {
                    Ok(at) => Some(Subscriber {
                        destination: Destination(chat_id),
                        registered_at: at.with_timezone(&Utc),
                    }),
                    Err(e) => {
                        warn!(chat_id, error = %e, "subscriber has unreadable registration time");
                        None
                    }
                }
            })
            .collect();
        Ok(subscribers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;
    use shiftbot_core::clock::ManualClock;

    fn registry_at(now: DateTime<Utc>) -> (SqliteSubscriberRegistry, Arc<ManualClock>) {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        (SqliteSubscriberRegistry::new(conn, clock.clone()), clock)
    }

    fn registry() -> SqliteSubscriberRegistry {
        registry_at(Utc.with_ymd_and_hms(2024, 10, 19, 9, 0, 0).unwrap()).0
    }

    #[test]
    fn duplicate_registration_is_a_no_op() {
        let r = registry();
        assert!(r.add(Destination(42)).unwrap());
        assert!(!r.add(Destination(42)).unwrap());
        assert_eq!(r.all().unwrap().len(), 1);
    }

    #[test]
    fn snapshot_contains_every_destination() {
        let r = registry();
        for id in [-100_123_i64, 7, 99] {
            r.add(Destination(id)).unwrap();
        }
        let mut ids: Vec<i64> = r.all().unwrap().iter().map(|s| s.destination.get()).collect();
        ids.sort();
        assert_eq!(ids, vec![-100_123, 7, 99]);
    }

    #[test]
    fn registration_time_comes_from_the_clock() {
        let first = Utc.with_ymd_and_hms(2024, 10, 19, 9, 0, 0).unwrap();
        let (r, clock) = registry_at(first);
        r.add(Destination(1)).unwrap();
        clock.advance(chrono::Duration::hours(3));
        r.add(Destination(2)).unwrap();

        let subs = r.all().unwrap();
        assert_eq!(subs[0].destination, Destination(1));
        assert_eq!(subs[0].registered_at, first);
        assert_eq!(subs[1].registered_at, first + chrono::Duration::hours(3));
    }

    #[test]
    fn unreadable_rows_are_skipped_not_fatal() {
        let r = registry();
        r.add(Destination(7)).unwrap();
        r.db.lock()
            .unwrap()
            .execute(
                "INSERT INTO subscribers (chat_id, registered_at) VALUES (8, X'DEADBEEF')",
                [],
            )
            .unwrap();
        r.db.lock()
            .unwrap()
            .execute(
                "INSERT INTO subscribers (chat_id, registered_at) VALUES (9, 'yesterday')",
                [],
            )
            .unwrap();

        let ids: Vec<i64> = r.all().unwrap().iter().map(|s| s.destination.get()).collect();
        assert_eq!(ids, vec![7]);
    }
}

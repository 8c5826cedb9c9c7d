use std::sync::Mutex;

use chrono::{DateTime, FixedOffset};
use rusqlite::Connection;
use tracing::{debug, warn};

use shiftbot_core::error::StoreError;
use shiftbot_core::store::ReportStore;
use shiftbot_core::types::{Report, ShiftLabel};

/// SQLite-backed report log.
///
/// Thread-safe: the connection sits behind a `Mutex`, so the chat handler
/// can append while the scheduler reads.
pub struct SqliteReportStore {
    db: Mutex<Connection>,
}

impl SqliteReportStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn query(&self, limit: Option<usize>) -> rusqlite::Result<Vec<Report>> {
        let db = self.db.lock().unwrap();
        // LIMIT -1 means "no limit" in SQLite.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = db.prepare_cached(
            "SELECT id, shift, body, reported_at FROM reports
             ORDER BY reported_ts DESC, id DESC
             LIMIT ?1",
        )?;
        let reports = stmt
            .query_map([limit], row_to_report)?
            .filter_map(|r| match r {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable report row");
                    None
                }
            })
            .collect();
        Ok(reports)
    }
}

impl ReportStore for SqliteReportStore {
    fn append(
        &self,
        shift: &ShiftLabel,
        text: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<Report, StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO reports (shift, body, reported_at, reported_ts)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                shift.as_str(),
                text,
                timestamp.to_rfc3339(),
                timestamp.timestamp()
            ],
        )
        .map_err(StoreError::database)?;
        let id = db.last_insert_rowid();
        debug!(report_id = id, %shift, "report row inserted");
        Ok(Report {
            id,
            shift: shift.clone(),
            text: text.to_string(),
            timestamp,
        })
    }

    fn all(&self) -> Result<Vec<Report>, StoreError> {
        self.query(None).map_err(StoreError::database)
    }

    fn recent(&self, limit: usize) -> Result<Vec<Report>, StoreError> {
        self.query(Some(limit)).map_err(StoreError::database)
    }
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let reported_at: String = row.get(3)?;
    let timestamp = DateTime::parse_from_rfc3339(&reported_at).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Report {
        id: row.get(0)?,
        shift: ShiftLabel(row.get(1)?),
        text: row.get(2)?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn store() -> SqliteReportStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        SqliteReportStore::new(conn)
    }

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn append_assigns_ids_and_round_trips_offset() {
        let s = store();
        let r = s
            .append(&ShiftLabel::from("B"), "valve 7 stuck", ts("2024-10-19T09:00:00+02:00"))
            .unwrap();
        assert_eq!(r.id, 1);
        let all = s.all().unwrap();
        assert_eq!(all, vec![r]);
        assert_eq!(all[0].timestamp.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn all_is_most_recent_first_across_offsets() {
        let s = store();
        // 02:30+02:00 (00:30Z) happens before 02:10+01:00 (01:10Z) on the fall-back night.
        s.append(&ShiftLabel::from("A"), "first", ts("2024-10-27T02:30:00+02:00")).unwrap();
        s.append(&ShiftLabel::from("A"), "second", ts("2024-10-27T02:10:00+01:00")).unwrap();
        s.append(&ShiftLabel::from("B"), "third", ts("2024-10-27T09:00:00+01:00")).unwrap();

        let texts: Vec<String> = s.all().unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
    }

    #[test]
    fn recent_caps_the_listing() {
        let s = store();
        for i in 0..25 {
            let at = ts("2024-10-19T09:00:00+02:00") + chrono::Duration::minutes(i);
            s.append(&ShiftLabel::from("C"), &format!("report {i}"), at).unwrap();
        }
        let recent = s.recent(20).unwrap();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].text, "report 24");
        assert_eq!(s.all().unwrap().len(), 25);
    }

    #[test]
    fn corrupt_timestamp_rows_are_skipped() {
        let s = store();
        s.append(&ShiftLabel::from("D"), "ok", ts("2024-10-19T21:00:00+02:00")).unwrap();
        s.db.lock()
            .unwrap()
            .execute(
                "INSERT INTO reports (shift, body, reported_at, reported_ts)
                 VALUES ('D', 'bad', 'yesterday', 0)",
                [],
            )
            .unwrap();
        let all = s.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "ok");
    }
}

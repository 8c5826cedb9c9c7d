use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use shiftbot_core::clock::{Clock, SystemClock};
use shiftbot_core::config::ShiftbotConfig;
use shiftbot_core::delivery::Transport;
use shiftbot_core::intake::ReportIntake;
use shiftbot_core::render::TextRenderer;
use shiftbot_core::shift::{ShiftCalculator, ShiftStatus};
use shiftbot_scheduler::{DispatchDeps, FireSchedule};
use shiftbot_store::{db, SqliteReportStore, SqliteSubscriberRegistry, SqliteWatermarkStore};
use shiftbot_telegram::BotContext;

/// Everything built from config at startup, shared by the chat front end and
/// the dispatch scheduler.
pub struct AppState {
    pub config: ShiftbotConfig,
    pub clock: Arc<dyn Clock>,
    pub shifts: Arc<ShiftCalculator>,
    pub schedule: FireSchedule,
    pub reports: Arc<SqliteReportStore>,
    pub subscribers: Arc<SqliteSubscriberRegistry>,
    pub watermark: Arc<SqliteWatermarkStore>,
    pub renderer: Arc<TextRenderer>,
}

impl AppState {
    /// Open the database, run migrations and build the runtime objects.
    pub fn open(config: ShiftbotConfig) -> anyhow::Result<Self> {
        let db_path = config.database.path.clone();
        ensure_parent_dir(&db_path);
        info!(path = %db_path, "opening SQLite database");

        let conn = db::open(&db_path)?;
        db::init_db(&conn)?;
        info!("database migrations complete");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // Each store gets its own connection for thread safety.
        let reports = Arc::new(SqliteReportStore::new(conn));
        let subscribers = Arc::new(SqliteSubscriberRegistry::new(db::open(&db_path)?, clock.clone()));
        let watermark = Arc::new(SqliteWatermarkStore::new(db::open(&db_path)?, clock.clone()));

        Ok(Self {
            clock,
            shifts: Arc::new(config.shift_calculator()?),
            schedule: FireSchedule::new(config.dispatch.fire_times.iter().copied()),
            reports,
            subscribers,
            watermark,
            renderer: Arc::new(TextRenderer::new(&config.dispatch.output_dir)),
            config,
        })
    }

    pub fn bot_context(&self) -> BotContext {
        BotContext {
            clock: self.clock.clone(),
            shifts: self.shifts.clone(),
            intake: ReportIntake::new(self.clock.clone(), self.shifts.clone(), self.reports.clone()),
            reports: self.reports.clone(),
            subscribers: self.subscribers.clone(),
            renderer: self.renderer.clone(),
            schedule: self.schedule.clone(),
            list_limit: self.config.listing.limit,
        }
    }

    pub fn dispatch_deps(&self, transport: Arc<dyn Transport>) -> DispatchDeps {
        DispatchDeps {
            clock: self.clock.clone(),
            shifts: self.shifts.clone(),
            reports: self.reports.clone(),
            subscribers: self.subscribers.clone(),
            renderer: self.renderer.clone(),
            transport,
            watermark: self.watermark.clone(),
        }
    }
}

/// Shift status at `at`, computed from config alone (no database).
pub fn shift_status(config: &ShiftbotConfig, at: DateTime<Utc>) -> anyhow::Result<ShiftStatus> {
    Ok(config.shift_calculator()?.status(at))
}

/// Next dispatch after `from` as local and UTC RFC 3339 strings.
pub fn next_fire(config: &ShiftbotConfig, from: DateTime<Utc>) -> anyhow::Result<Option<(String, String)>> {
    let tz = config.timezone_resolver()?;
    let schedule = FireSchedule::new(config.dispatch.fire_times.iter().copied());
    Ok(schedule
        .next_after(from, &tz)
        .map(|n| (n.to_rfc3339(), n.with_timezone(&Utc).to_rfc3339())))
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

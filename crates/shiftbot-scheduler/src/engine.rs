use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shiftbot_core::clock::{Clock, TimezoneResolver};
use shiftbot_core::delivery::{DeliveryMeta, Document, DocumentRenderer, Transport};
use shiftbot_core::error::DeliveryError;
use shiftbot_core::shift::ShiftCalculator;
use shiftbot_core::store::{ReportStore, SubscriberRegistry, WatermarkStore};
use shiftbot_core::types::Subscriber;

use crate::{
    error::Result,
    schedule::FireSchedule,
    types::{DispatchSettings, FireReport},
};

/// Collaborators the dispatch engine is wired with.
#[derive(Clone)]
pub struct DispatchDeps {
    pub clock: Arc<dyn Clock>,
    pub shifts: Arc<ShiftCalculator>,
    pub reports: Arc<dyn ReportStore>,
    pub subscribers: Arc<dyn SubscriberRegistry>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub transport: Arc<dyn Transport>,
    pub watermark: Arc<dyn WatermarkStore>,
}

/// Broadcasts the compiled report at every occurrence of a [`FireSchedule`].
///
/// Polls the clock on a short interval (cut short when a fire instant is
/// closer) and fires when the most recent occurrence is newer than the
/// watermark. Skipped or missed occurrences collapse into one catch-up
/// firing. The watermark is persisted after every occurrence, fired or
/// aborted, so no occurrence is served twice, even across restarts.
pub struct DispatchScheduler {
    deps: DispatchDeps,
    schedule: FireSchedule,
    settings: DispatchSettings,
    /// Latest occurrence served. `None` until primed from the watermark store.
    last_occurrence: Option<DateTime<Utc>>,
    primed: bool,
    /// Wall-clock instant of the last firing; drives the cool-down.
    last_fired_at: Option<DateTime<Utc>>,
    announced_next: Option<DateTime<Utc>>,
}

impl DispatchScheduler {
    pub fn new(deps: DispatchDeps, schedule: FireSchedule, settings: DispatchSettings) -> Self {
        Self {
            deps,
            schedule,
            settings,
            last_occurrence: None,
            primed: false,
            last_fired_at: None,
            announced_next: None,
        }
    }

    fn tz(&self) -> &TimezoneResolver {
        self.deps.shifts.resolver()
    }

    /// Next occurrence strictly after the current clock reading.
    pub fn next_fire(&self) -> Option<DateTime<FixedOffset>> {
        self.schedule.next_after(self.deps.clock.now(), self.tz())
    }

    /// Main event loop. Runs until `cancel` is triggered.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            times = ?self.schedule.times().iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            poll_secs = self.settings.poll_interval.as_secs(),
            "dispatch scheduler started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.poll_once(&cancel).await {
                error!("dispatch occurrence aborted: {e}");
            }

            let wait = self.next_wait();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("dispatch scheduler shutting down");
    }

    /// One look at the clock: fire if an unserved occurrence is due.
    ///
    /// Returns `Ok(None)` when nothing was due. An `Err` means the due
    /// occurrence was abandoned; it is still marked as served.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<Option<FireReport>> {
        let now = self.deps.clock.now();
        self.prime(now);

        let Some(due) = self.schedule.latest_at_or_before(now, self.tz()) else {
            return Ok(None);
        };
        let due_utc = due.with_timezone(&Utc);
        if self.last_occurrence.is_some_and(|served| served >= due_utc) {
            return Ok(None);
        }
        if self.in_cooldown(now) {
            debug!(occurrence = %due, "due occurrence held back by cool-down");
            return Ok(None);
        }

        let result = self.fire(due, now, cancel).await;
        self.mark_served(due_utc, now);
        result.map(Some)
    }

    /// Load the watermark once. A fresh database starts from the most recent
    /// past occurrence so the first start does not broadcast immediately.
    fn prime(&mut self, now: DateTime<Utc>) {
        if self.primed {
            return;
        }
        self.primed = true;

        match self.deps.watermark.load() {
            Ok(Some(served)) => {
                info!(last_fired = %served, "dispatch watermark loaded");
                self.last_occurrence = Some(served);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("dispatch watermark unreadable, starting fresh: {e}"),
        }

        if let Some(latest) = self.schedule.latest_at_or_before(now, self.tz()) {
            let latest = latest.with_timezone(&Utc);
            self.last_occurrence = Some(latest);
            if let Err(e) = self.deps.watermark.save(latest) {
                warn!("failed to persist initial dispatch watermark: {e}");
            }
            info!(after = %latest, "no dispatch history; waiting for the next occurrence");
        }
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_fired_at {
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed < self.settings.cooldown)
                .unwrap_or(false),
            None => false,
        }
    }

    fn mark_served(&mut self, occurrence: DateTime<Utc>, now: DateTime<Utc>) {
        self.last_occurrence = Some(occurrence);
        self.last_fired_at = Some(now);
        if let Err(e) = self.deps.watermark.save(occurrence) {
            warn!(%occurrence, "failed to persist dispatch watermark: {e}");
        }
    }

    /// Time to sleep before the next poll: the poll interval, or less when the
    /// next occurrence is closer. Recomputed each iteration with the offset
    /// currently in force.
    fn next_wait(&mut self) -> Duration {
        let now = self.deps.clock.now();
        let poll = self.settings.poll_interval;
        let Some(next) = self.schedule.next_after(now, self.tz()) else {
            return poll;
        };
        let next_utc = next.with_timezone(&Utc);
        if self.announced_next != Some(next_utc) {
            info!(next = %next, "next dispatch scheduled");
            self.announced_next = Some(next_utc);
        }
        (next_utc - now)
            .to_std()
            .map(|until| until.min(poll))
            .unwrap_or(poll)
    }

    async fn fire(
        &self,
        occurrence: DateTime<FixedOffset>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<FireReport> {
        let local_now = self.tz().localize(now);
        info!(%occurrence, "dispatch firing");

        let reports = self.deps.reports.all()?;
        let document = self.deps.renderer.render(&reports, local_now)?;

        let subscribers = match self.deps.subscribers.all() {
            Ok(s) => s,
            Err(e) => {
                self.release(document);
                return Err(e.into());
            }
        };

        let meta = DeliveryMeta {
            caption: format!(
                "Scheduled shift report\nDate: {}\nShift on duty: {}\nReports: {}",
                local_now.format("%d/%m/%Y %H:%M"),
                self.deps.shifts.current_shift(now),
                reports.len()
            ),
        };

        let outcome = fan_out(
            self.deps.transport.as_ref(),
            &subscribers,
            &document,
            &meta,
            &self.settings,
            cancel,
        )
        .await;
        self.release(document);

        info!(
            %occurrence,
            delivered = outcome.delivered,
            failed = outcome.failures.len(),
            "report delivered to {} of {} subscribers",
            outcome.delivered,
            subscribers.len()
        );

        Ok(FireReport {
            occurrence,
            report_count: reports.len(),
            subscribers: subscribers.len(),
            attempted: outcome.attempted,
            delivered: outcome.delivered,
            failures: outcome.failures,
            interrupted: outcome.interrupted,
        })
    }

    fn release(&self, document: Document) {
        let path = document.path.clone();
        if let Err(e) = self.deps.renderer.release(document) {
            warn!(path = %path.display(), "failed to release rendered document: {e}");
        }
    }
}

#[derive(Debug, Default)]
struct FanOut {
    attempted: usize,
    delivered: usize,
    failures: Vec<DeliveryError>,
    interrupted: bool,
}

/// Deliver `document` to every subscriber, one at a time.
///
/// A failure or timeout is logged and recorded for that subscriber only.
/// Cancellation lets the delivery in flight finish, then stops.
async fn fan_out(
    transport: &dyn Transport,
    subscribers: &[Subscriber],
    document: &Document,
    meta: &DeliveryMeta,
    settings: &DispatchSettings,
    cancel: &CancellationToken,
) -> FanOut {
    let mut out = FanOut::default();

    for (i, sub) in subscribers.iter().enumerate() {
        if cancel.is_cancelled() {
            out.interrupted = true;
            break;
        }
        if i > 0 && !settings.delivery_pause.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    out.interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(settings.delivery_pause) => {}
            }
        }

        let destination = sub.destination;
        out.attempted += 1;
        let result = match tokio::time::timeout(
            settings.delivery_timeout,
            transport.deliver(destination, document, meta),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => Err(DeliveryError::TimedOut {
                destination,
                ms: settings.delivery_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(()) => {
                out.delivered += 1;
                info!(%destination, "report delivered");
            }
            Err(e) => {
                warn!(%destination, "report delivery failed: {e}");
                out.failures.push(e);
            }
        }
    }

    if out.interrupted {
        warn!(
            remaining = subscribers.len() - out.attempted,
            "fan-out interrupted by shutdown"
        );
    }
    out
}

//! Telegram update handlers registered in the teloxide Dispatcher.
//!
//! Commands are parsed with `BotCommands`; any other text message is logged
//! as a report for the shift on duty.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use shiftbot_core::delivery::Document;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use shiftbot_core::shift::ShiftStatus;
use shiftbot_core::types::{Destination, Report, TimeOfDay};

use crate::context::BotContext;
use crate::send;
use crate::transport::send_document;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const APOLOGY: &str = "Something went wrong. Please try again later.";
const REPORT_FAILED: &str = "Could not generate the report right now. Please try again later.";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "register for scheduled reports and show the menu")]
    Start,
    #[command(description = "show the most recent reports")]
    List,
    #[command(description = "compile every report into a document now")]
    Report,
    #[command(description = "show the shift on duty and the next dispatch")]
    Shift,
    #[command(description = "show this guide")]
    Help,
}

/// Handler tree: known commands first, then free text.
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Message::filter_text().endpoint(handle_text))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<BotContext>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    match cmd {
        Command::Start => start(&bot, chat_id, &ctx).await?,
        Command::List => {
            let text = match ctx.reports.recent(ctx.list_limit) {
                Ok(reports) => listing_text(&reports),
                Err(e) => {
                    error!(chat_id = chat_id.0, "listing reports failed: {e}");
                    APOLOGY.to_string()
                }
            };
            send::send_response(&bot, chat_id, &text).await;
        }
        Command::Report => on_demand_report(&bot, chat_id, &ctx).await?,
        Command::Shift => {
            let now = ctx.clock.now();
            let status = ctx.shifts.status(now);
            let next = ctx.schedule.next_after(now, ctx.shifts.resolver());
            bot.send_message(chat_id, status_text(&status, next)).await?;
        }
        Command::Help => {
            bot.send_message(chat_id, help_text(ctx.schedule.times()))
                .await?;
        }
    }
    Ok(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    text: String,
    ctx: Arc<BotContext>,
) -> ResponseResult<()> {
    // Ignore other bots.
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    if text.starts_with('/') {
        bot.send_message(msg.chat.id, "Unknown command. Send /help for the list.")
            .await?;
        return Ok(());
    }
    if text.trim().is_empty() {
        return Ok(());
    }

    let submission = ctx.intake.submit(&text);
    let reply = match &submission.persisted {
        Ok(report) => ack_text(report),
        Err(_) => format!(
            "Could not record the report for shift {}. Please try again later.",
            submission.shift
        ),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn start(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> ResponseResult<()> {
    match ctx.subscribers.add(Destination(chat_id.0)) {
        Ok(new) => {
            if !new {
                info!(chat_id = chat_id.0, "subscriber already registered");
            }
            bot.send_message(chat_id, welcome_text(ctx.schedule.times()))
                .reply_markup(menu_keyboard())
                .await?;
        }
        Err(e) => {
            error!(chat_id = chat_id.0, "subscriber registration failed: {e}");
            bot.send_message(chat_id, APOLOGY).await?;
        }
    }
    Ok(())
}

/// Render all reports and send the document to the requester only.
async fn on_demand_report(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> ResponseResult<()> {
    bot.send_message(chat_id, "Generating the report...").await?;

    let document = match compile_on_demand(ctx, chat_id) {
        Ok(d) => d,
        Err(reply) => {
            bot.send_message(chat_id, reply).await?;
            return Ok(());
        }
    };

    let caption = format!("Shift report\nReports: {}", document.report_count);
    let sent = send_document(bot, chat_id, &document, &caption).await;
    let path = document.path.clone();
    if let Err(e) = ctx.renderer.release(document) {
        warn!(path = %path.display(), "failed to release rendered document: {e}");
    }
    sent.map(|_| ())
}

/// Read and render every report. Failures are logged here; the caller only
/// gets the text to show in the chat.
fn compile_on_demand(ctx: &BotContext, chat_id: ChatId) -> Result<Document, &'static str> {
    let generated_at = ctx.shifts.resolver().localize(ctx.clock.now());
    let reports = ctx.reports.all().map_err(|e| {
        error!(chat_id = chat_id.0, "on-demand report: reading reports failed: {e}");
        REPORT_FAILED
    })?;
    ctx.renderer.render(&reports, generated_at).map_err(|e| {
        error!(chat_id = chat_id.0, "on-demand report: rendering failed: {e}");
        REPORT_FAILED
    })
}

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new("/start"),
            KeyboardButton::new("/list"),
            KeyboardButton::new("/report"),
        ],
        vec![KeyboardButton::new("/shift"), KeyboardButton::new("/help")],
    ])
    .resize_keyboard()
}

fn join_times(times: &[TimeOfDay]) -> String {
    let parts: Vec<String> = times.iter().map(|t| t.to_string()).collect();
    match parts.len() {
        0 => "never".to_string(),
        1 => parts[0].clone(),
        n => format!("{} and {}", parts[..n - 1].join(", "), parts[n - 1]),
    }
}

pub fn welcome_text(times: &[TimeOfDay]) -> String {
    format!(
        "Welcome to the shift report bot!\n\n\
         Use the buttons below to interact with the bot.\n\
         Every message you send is logged as a report for the shift on duty.\n\n\
         You will receive the compiled report every day at {}.",
        join_times(times)
    )
}

pub fn help_text(times: &[TimeOfDay]) -> String {
    format!(
        "{}\n\nHow it works:\n\
         - Every message you send is saved as a report\n\
         - The shift is assigned automatically\n\
         - The compiled report is sent automatically at {}\n\
         - /report builds one on demand",
        Command::descriptions(),
        join_times(times)
    )
}

pub fn ack_text(report: &Report) -> String {
    format!(
        "Report logged.\nShift: {}\nDate: {}",
        report.shift,
        report.timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Most recent first, one block per report.
pub fn listing_text(reports: &[Report]) -> String {
    if reports.is_empty() {
        return "No reports recorded yet.".to_string();
    }
    let blocks: Vec<String> = reports
        .iter()
        .map(|r| {
            format!(
                "Shift {}\n{}\n{}",
                r.shift,
                r.text,
                r.timestamp.format(TIMESTAMP_FORMAT)
            )
        })
        .collect();
    format!("Latest {} reports:\n\n{}", reports.len(), blocks.join("\n\n"))
}

pub fn status_text(status: &ShiftStatus, next: Option<DateTime<FixedOffset>>) -> String {
    let next = next
        .map(|n| n.format("%Y-%m-%d %H:%M (%:z)").to_string())
        .unwrap_or_else(|| "none scheduled".to_string());
    format!(
        "Local time: {}\nShift on duty: {} ({})\nDays since reference: {}\nNext dispatch: {}",
        status.local_time.format("%Y-%m-%d %H:%M (%:z)"),
        status.shift,
        status.segment,
        status.days_elapsed,
        next
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use shiftbot_core::clock::{ManualClock, TimezoneResolver};
    use shiftbot_core::delivery::DocumentRenderer;
    use shiftbot_core::error::{RenderError, StoreError};
    use shiftbot_core::intake::ReportIntake;
    use shiftbot_core::shift::ShiftCalculator;
    use shiftbot_core::store::{ReportStore, SubscriberRegistry};
    use shiftbot_core::types::{Segment, ShiftLabel, Subscriber};
    use shiftbot_scheduler::FireSchedule;

    struct UnreadableReports;

    impl ReportStore for UnreadableReports {
        fn append(
            &self,
            _: &ShiftLabel,
            _: &str,
            _: DateTime<FixedOffset>,
        ) -> Result<Report, StoreError> {
            Err(StoreError::Database("disk I/O error at /var/lib/shiftbot.db".into()))
        }
        fn all(&self) -> Result<Vec<Report>, StoreError> {
            Err(StoreError::Database("disk I/O error at /var/lib/shiftbot.db".into()))
        }
        fn recent(&self, _: usize) -> Result<Vec<Report>, StoreError> {
            self.all()
        }
    }

    struct EmptyReports;

    impl ReportStore for EmptyReports {
        fn append(
            &self,
            _: &ShiftLabel,
            _: &str,
            _: DateTime<FixedOffset>,
        ) -> Result<Report, StoreError> {
            Err(StoreError::Database("read-only".into()))
        }
        fn all(&self) -> Result<Vec<Report>, StoreError> {
            Ok(Vec::new())
        }
        fn recent(&self, _: usize) -> Result<Vec<Report>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct NoSubscribers;

    impl SubscriberRegistry for NoSubscribers {
        fn add(&self, _: Destination) -> Result<bool, StoreError> {
            Ok(true)
        }
        fn all(&self) -> Result<Vec<Subscriber>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct FullDisk;

    impl DocumentRenderer for FullDisk {
        fn render(&self, _: &[Report], _: DateTime<FixedOffset>) -> Result<Document, RenderError> {
            Err(RenderError::Io(std::io::Error::other("no space left on /tmp/shiftbot")))
        }
        fn release(&self, _: Document) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn context(reports: Arc<dyn ReportStore>) -> BotContext {
        let clock: Arc<dyn shiftbot_core::clock::Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 10, 19, 18, 0, 0).unwrap(),
        ));
        let shifts = Arc::new(
            ShiftCalculator::new(
                ["A", "B", "C", "D"].into_iter().map(ShiftLabel::from).collect(),
                NaiveDate::from_ymd_opt(2024, 10, 18).unwrap(),
                TimeOfDay::new(8, 0).unwrap(),
                TimeOfDay::new(20, 0).unwrap(),
                TimezoneResolver::central_european(),
            )
            .unwrap(),
        );
        BotContext {
            clock: clock.clone(),
            shifts: shifts.clone(),
            intake: ReportIntake::new(clock, shifts, reports.clone()),
            reports,
            subscribers: Arc::new(NoSubscribers),
            renderer: Arc::new(FullDisk),
            schedule: FireSchedule::new([TimeOfDay::new(20, 0).unwrap()]),
            list_limit: 20,
        }
    }

    fn cest() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn report(id: i64, shift: &str, text: &str) -> Report {
        Report {
            id,
            shift: ShiftLabel::from(shift),
            text: text.to_string(),
            timestamp: cest().with_ymd_and_hms(2024, 10, 19, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn commands_parse_lowercase() {
        assert_eq!(Command::parse("/start", "shiftbot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/list", "shiftbot").unwrap(), Command::List);
        assert_eq!(Command::parse("/report@shiftbot", "shiftbot").unwrap(), Command::Report);
        assert!(Command::parse("/lista", "shiftbot").is_err());
    }

    #[test]
    fn ack_names_shift_and_time() {
        let text = ack_text(&report(1, "B", "pump 3 serviced"));
        assert!(text.contains("Shift: B"));
        assert!(text.contains("2024-10-19 10:30:00"));
    }

    #[test]
    fn empty_listing_says_so() {
        assert_eq!(listing_text(&[]), "No reports recorded yet.");
    }

    #[test]
    fn listing_keeps_given_order() {
        let text = listing_text(&[report(2, "C", "second"), report(1, "B", "first")]);
        assert!(text.starts_with("Latest 2 reports:"));
        assert!(text.find("second").unwrap() < text.find("first").unwrap());
    }

    #[test]
    fn welcome_lists_dispatch_times() {
        let times = [TimeOfDay::new(8, 0).unwrap(), TimeOfDay::new(20, 0).unwrap()];
        assert!(welcome_text(&times).contains("every day at 08:00 and 20:00"));
    }

    #[test]
    fn help_includes_every_command() {
        let text = help_text(&[TimeOfDay::new(8, 0).unwrap()]);
        for cmd in ["/start", "/list", "/report", "/shift", "/help"] {
            assert!(text.contains(cmd), "missing {cmd}");
        }
    }

    #[test]
    fn status_shows_offset_and_next_dispatch() {
        let status = ShiftStatus {
            local_time: cest().with_ymd_and_hms(2024, 10, 19, 20, 0, 0).unwrap(),
            shift: ShiftLabel::from("B"),
            segment: Segment::Night,
            days_elapsed: 1,
        };
        let next = cest().with_ymd_and_hms(2024, 10, 20, 8, 0, 0).unwrap();
        let text = status_text(&status, Some(next));
        assert!(text.contains("2024-10-19 20:00 (+02:00)"));
        assert!(text.contains("Shift on duty: B (night)"));
        assert!(text.contains("Next dispatch: 2024-10-20 08:00 (+02:00)"));
    }

    #[test]
    fn on_demand_store_failure_hides_error_details() {
        let ctx = context(Arc::new(UnreadableReports));
        let reply = compile_on_demand(&ctx, ChatId(7)).unwrap_err();
        assert_eq!(reply, REPORT_FAILED);
        assert!(!reply.contains("disk"));
        assert!(!reply.contains("/var/lib"));
    }

    #[test]
    fn on_demand_render_failure_hides_error_details() {
        let ctx = context(Arc::new(EmptyReports));
        let reply = compile_on_demand(&ctx, ChatId(7)).unwrap_err();
        assert_eq!(reply, REPORT_FAILED);
        assert!(!reply.contains("/tmp"));
    }
}

use crate::infra::{load_store, parse_date};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use event_admission::admission::{
    AdmissionController, AdmissionSettings, DrawResult, EntrantId, EntrantStatus, EventId,
    EventSerializer, GeoPoint, ModerationReport, NotificationReport, OrganizerId, Role, Shuffler,
    SkipReason, UserIdentity,
};
use event_admission::error::AppError;
use event_admission::store::{MemoryStore, Store};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_EVENT: &str = "evt-community-swim";
const DEMO_ORGANIZER: &str = "org-riverside";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of entrants that join the waiting list.
    #[arg(long, default_value_t = 8)]
    pub(crate) entrants: usize,
    /// Seats available for the event.
    #[arg(long, default_value_t = 3)]
    pub(crate) capacity: u32,
    /// Seed for the lottery shuffle so runs are reproducible.
    #[arg(long, default_value_t = 7)]
    pub(crate) seed: u64,
    /// Override the reporting date (defaults to today).
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the organizer ban and reinstatement portion of the demo.
    #[arg(long)]
    pub(crate) skip_moderation: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SnapshotArgs {
    /// JSON snapshot of the store tree (`Event`, `WaitingList`, `User`, ...).
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Event id to operate on.
    #[arg(long)]
    pub(crate) event: String,
    /// Seed for the lottery shuffle. Defaults to entropy.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Write the updated store tree here after a draw.
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SnapshotAction {
    Draw,
    Export,
}

pub(crate) async fn run_snapshot_command(
    args: SnapshotArgs,
    action: SnapshotAction,
) -> Result<(), AppError> {
    let store = Arc::new(load_store(Some(&args.snapshot))?);
    let shuffler = match args.seed {
        Some(seed) => Shuffler::seeded(seed),
        None => Shuffler::from_entropy(),
    };
    let controller = AdmissionController::new(
        store.clone(),
        Arc::new(EventSerializer::new()),
        Arc::new(shuffler),
        AdmissionSettings::default(),
    );
    let event_id = EventId(args.event);

    match action {
        SnapshotAction::Draw => {
            let result = controller.lottery().draw_or_pool(&event_id).await?;
            println!("Event {event_id}");
            render_draw("Draw", &result);
            if let Some(path) = args.output {
                let rendered = serde_json::to_string_pretty(&store.snapshot())?;
                std::fs::write(&path, rendered)?;
                println!("Updated snapshot written to {}", path.display());
            }
        }
        SnapshotAction::Export => {
            let csv = controller.export_final_entrants(&event_id).await?;
            print!("{csv}");
        }
    }

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        entrants,
        capacity,
        seed,
        today,
        skip_moderation,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(demo_store(entrants, capacity, today));
    let controller = AdmissionController::new(
        store.clone(),
        Arc::new(EventSerializer::new()),
        Arc::new(Shuffler::seeded(seed)),
        AdmissionSettings {
            auto_backfill: true,
        },
    );
    let event_id = EventId(DEMO_EVENT.to_string());

    println!("Event Admission Demo");
    println!("====================");
    println!("Event: {event_id} (organizer {DEMO_ORGANIZER})");
    println!("Seats: {capacity}    Entrants: {entrants}    Seed: {seed}");
    println!("Reporting date: {today}");
    println!();

    println!("Registration");
    println!("------------");
    for (index, entrant_id) in demo_entrants(entrants).iter().enumerate() {
        let location = (index % 2 == 0).then_some(GeoPoint {
            latitude: 53.52 + index as f64 * 0.001,
            longitude: -113.52,
        });
        let receipt = controller
            .join_waiting_list(&event_id, entrant_id, location)
            .await?;
        let pinned = if location.is_some() { " (with location)" } else { "" };
        println!("  {} joined -> {}{pinned}", receipt.entrant_id, describe(receipt.to));
    }
    println!();

    let lottery = controller.lottery().run_lottery(&event_id).await?;
    render_draw("Lottery", &lottery);
    println!();

    println!("Responses");
    println!("---------");
    let mut pending = lottery.invited().to_vec();
    if pending.len() > 1 {
        let decliner = pending.remove(1);
        let receipt = controller.decline_invitation(&event_id, &decliner).await?;
        println!("  {} declined -> {}", receipt.entrant_id, describe(receipt.to));
        if let Some(backfill) = &receipt.backfill {
            render_draw("  Backfill", backfill);
            pending.extend(backfill.invited().iter().cloned());
        }
    }
    for entrant_id in &pending {
        let receipt = controller.accept_invitation(&event_id, entrant_id).await?;
        println!("  {} accepted -> {}", receipt.entrant_id, describe(receipt.to));
    }
    if let Some(first_uninvited) = lottery.uninvited().first() {
        let receipt = controller
            .rejoin_waiting_list(&event_id, first_uninvited, None)
            .await?;
        println!("  {} rejoined -> {}", receipt.entrant_id, describe(receipt.to));
    }
    println!();

    render_buckets(&controller, &event_id).await?;
    println!();

    let report = controller
        .send_waiting_list_notification(
            &event_id,
            EntrantStatus::Waiting,
            "Seats may open up. You are still on the waiting list.",
        )
        .await?;
    render_notifications("Waiting list update", &report);
    println!();

    println!("Final entrant export");
    println!("--------------------");
    let csv = controller.export_final_entrants(&event_id).await?;
    for line in csv.lines() {
        println!("  {line}");
    }

    if !skip_moderation {
        println!();
        let admin = UserIdentity::new("admin-demo", [Role::Admin]);
        let organizer = OrganizerId(DEMO_ORGANIZER.to_string());

        let banned = controller
            .ban_user_from_organizer(&admin, &organizer, Some("Repeated no-show events"), today)
            .await?;
        render_moderation("Organizer banned", &banned);

        match controller.replacement().pool_replacement_auto(&event_id).await {
            Ok(result) => render_draw("Backfill while held", &result),
            Err(err) => println!("  Backfill while held refused: {err}"),
        }

        let reinstated = controller
            .unban_user_from_organizer(&admin, &organizer, today)
            .await?;
        render_moderation("Organizer reinstated", &reinstated);
    }

    Ok(())
}

fn demo_entrants(count: usize) -> Vec<EntrantId> {
    (1..=count)
        .map(|n| EntrantId(format!("entrant-{n:02}")))
        .collect()
}

fn demo_store(entrants: usize, capacity: u32, today: NaiveDate) -> MemoryStore {
    let users: Map<String, Value> = demo_entrants(entrants)
        .into_iter()
        .enumerate()
        .map(|(index, entrant_id)| {
            let number = index + 1;
            let mut profile = json!({
                "name": format!("Entrant {number}"),
                "email": format!("entrant{number}@example.org"),
            });
            if number % 3 != 0 {
                profile["phone"] = json!(format!("780-555-01{number:02}"));
            }
            (entrant_id.0, profile)
        })
        .collect();

    let start = today + Duration::days(21);
    MemoryStore::from_value(json!({
        "Event": {
            DEMO_EVENT: {
                "name": "Community Swim Lessons",
                "organizer": DEMO_ORGANIZER,
                "entrantLimit": capacity,
                "eventStartDate": start.to_string(),
                "registrationStartDate": today.to_string(),
                "registrationEndDate": (today + Duration::days(7)).to_string(),
                "onHold": false
            }
        },
        "Organizer": {
            DEMO_ORGANIZER: { "name": "Riverside Aquatics", "bannedFromOrganizer": false }
        },
        "User": Value::Object(users)
    }))
}

fn describe(status: Option<EntrantStatus>) -> String {
    status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "removed".to_string())
}

fn render_draw(label: &str, result: &DrawResult) {
    match result {
        DrawResult::Applied(outcome) => {
            println!(
                "{label}: {} invited, {} not selected",
                outcome.invited.len(),
                outcome.uninvited.len()
            );
            for entrant_id in &outcome.invited {
                println!("  + {entrant_id}");
            }
            for entrant_id in &outcome.uninvited {
                println!("  - {entrant_id}");
            }
        }
        DrawResult::Skipped(SkipReason::EmptyWaitingList) => {
            println!("{label}: nothing to do, the waiting list is empty");
        }
        DrawResult::Skipped(SkipReason::AtCapacity {
            seats_taken,
            capacity,
        }) => {
            println!("{label}: nothing to do, {seats_taken}/{capacity} seats taken");
        }
    }
}

async fn render_buckets<S>(
    controller: &AdmissionController<S>,
    event_id: &EventId,
) -> Result<(), AppError>
where
    S: Store + 'static,
{
    println!("Buckets");
    println!("-------");
    for status in EntrantStatus::ALL {
        let members = controller.entrants(event_id, status).await?;
        if members.is_empty() {
            continue;
        }
        let names: Vec<&str> = members.iter().map(|entrant| entrant.0.as_str()).collect();
        println!("  {:<10} {}", status.to_string(), names.join(", "));
    }
    Ok(())
}

fn render_notifications(label: &str, report: &NotificationReport) {
    println!(
        "{label}: {} delivered, {} failed",
        report.delivered.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        println!("  ! {}: {}", failure.recipient, failure.error);
    }
}

fn render_moderation(label: &str, report: &ModerationReport) {
    println!("{label}: {}", report.organizer_id);
    if report.affected_events.is_empty() {
        println!("  No upcoming events affected.");
    } else {
        for event_id in &report.affected_events {
            println!("  event {event_id}");
        }
    }
    render_notifications("  Notifications", &report.notifications);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_store_seeds_event_and_profiles() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 10).expect("valid");
        let store = demo_store(4, 2, today);
        let snapshot = store.snapshot();

        assert_eq!(
            snapshot.pointer(&format!("/Event/{DEMO_EVENT}/entrantLimit")),
            Some(&json!(2))
        );
        assert_eq!(
            snapshot.pointer(&format!("/Event/{DEMO_EVENT}/eventStartDate")),
            Some(&json!("2030-01-31"))
        );
        assert_eq!(
            snapshot.pointer("/User/entrant-03/phone"),
            None,
            "every third profile omits a phone"
        );
        assert_eq!(
            snapshot.pointer("/User/entrant-04/email"),
            Some(&json!("entrant4@example.org"))
        );
    }

    #[tokio::test]
    async fn demo_runs_to_completion() {
        let args = DemoArgs {
            entrants: 6,
            capacity: 2,
            seed: 11,
            today: NaiveDate::from_ymd_opt(2030, 1, 10),
            skip_moderation: false,
        };
        run_demo(args).await.expect("demo succeeds");
    }
}

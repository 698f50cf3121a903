use serde_json::json;
use shiftform_core::aggregate::Derived;
use shiftform_core::presets::{LINE_FEEDS, LINE_TONNAGE, production_report};
use shiftform_core::propagation::PERCENT_BUDGET;
use shiftform_core::{Applied, Balance, FeedSlot, FieldValue, Rejected};
use shiftform_harness::TestDesk;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn production_desk() -> Result<TestDesk, Box<dyn std::error::Error>> {
    let mut desk = TestDesk::new()?;
    desk.publish("kiln", "Kiln shift report", production_report())?;
    Ok(desk)
}

#[test]
fn feed_primary_at_full_clears_secondary() -> TestResult {
    let desk = production_desk()?;
    let mut session = desk.session("kiln")?;

    session.set_feed_type(LINE_FEEDS[0], 0, 1, "sand", false)?;
    session.set_feed_percent(LINE_FEEDS[0], 0, 1, 25.0)?;
    session.set_feed_percent(LINE_FEEDS[0], 3, 0, 60.0)?;
    session.set_feed_percent(LINE_FEEDS[0], 5, 0, 100.0)?;

    let feed = session.feed(LINE_FEEDS[0]);
    for t in 3..5 {
        assert_eq!(feed.slot(t, 0).map(|s| s.percent), Some(60.0));
        assert_eq!(feed.slot(t, 1).map(|s| s.kind.as_str()), Some("sand"));
    }
    for t in 5..feed.len() {
        assert_eq!(feed.slot(t, 1), Some(&FeedSlot::default()));
    }
    Ok(())
}

#[test]
fn feed_budget_holds_after_any_edit_sequence() -> TestResult {
    let desk = production_desk()?;
    let mut session = desk.session("kiln")?;
    let edits = [
        (0, 0, 70.0),
        (2, 1, 50.0),
        (4, 0, 95.0),
        (1, 1, 40.0),
        (7, 0, 10.0),
        (6, 1, 200.0),
        (9, 0, 100.0),
        (3, 1, 80.0),
    ];
    for (time, slot, percent) in edits {
        session.set_feed_percent(LINE_FEEDS[1], time, slot, percent)?;
        let feed = session.feed(LINE_FEEDS[1]);
        for t in 0..feed.len() {
            assert!(feed.allocated(t) <= PERCENT_BUDGET, "after {time}/{slot}: point {t}");
        }
    }
    assert_eq!(
        session.set_feed_percent(LINE_FEEDS[1], 3, 1, 80.0),
        Ok(Applied::Clamped { requested: 80.0, applied: 30.0 })
    );
    Ok(())
}

#[test]
fn feed_type_fills_forward_without_touching_the_past() -> TestResult {
    let desk = production_desk()?;
    let mut session = desk.session("kiln")?;
    session.set_feed_type(LINE_FEEDS[0], 4, 0, "limestone", false)?;
    let feed = session.feed(LINE_FEEDS[0]);
    for t in 0..4 {
        assert_eq!(feed.slot(t, 0).map(|s| s.kind.as_str()), Some(""));
    }
    for t in 4..feed.len() {
        assert_eq!(feed.slot(t, 0).map(|s| s.kind.as_str()), Some("limestone"));
    }
    Ok(())
}

#[test]
fn downtime_matrix_balances_against_total() -> TestResult {
    let desk = production_desk()?;
    let mut session = desk.session("kiln")?;
    session.set(
        "downtime",
        FieldValue::from(json!({
            "Mechanical": {"Line 1": "30", "Line 2": "x"},
            "Electrical": {"Line 1": "-5", "Line 2": "15"},
        })),
    )?;

    let Some(view) = session.view("downtime") else {
        return Err("downtime view missing".into());
    };
    let Derived::Matrix { summaries, balance } = view.derived else {
        return Err("expected matrix aggregates".into());
    };
    assert_eq!(summaries[0].grand, 40.0);
    assert_eq!(summaries[0].rows[0], ("Mechanical".to_string(), 30.0));
    assert_eq!(summaries[1].grand, 30.0);
    assert_eq!(balance, Some(Balance::Pending));

    session.set("downtime_total", 40.0)?;
    let view = session.view("downtime").ok_or("view")?;
    assert!(matches!(view.derived, Derived::Matrix { balance: Some(Balance::Balanced), .. }));
    Ok(())
}

#[test]
fn attendance_summary_uses_roster() -> TestResult {
    let desk = production_desk()?;
    let mut session = desk.session("kiln")?;
    session.set("crew", FieldValue::from(json!({"op-1": "present", "op-3": "sick", "op-9": "present"})))?;
    let view = session.view("crew").ok_or("view")?;
    let Derived::Attendance(summary) = view.derived else {
        return Err("expected attendance".into());
    };
    assert_eq!(summary.by_status.get("present"), Some(&1));
    assert_eq!(summary.unmarked, 2);
    assert_eq!(summary.unknown, vec!["op-9".to_string()]);
    Ok(())
}

#[test]
fn full_report_submits_once() -> TestResult {
    let mut desk = production_desk()?;
    let mut session = desk.session("kiln")?;

    let blocking: Vec<String> = session.issues().iter().map(|i| i.key.clone()).collect();
    assert!(blocking.contains(&"report_day".to_string()));
    assert!(!blocking.contains(&"stop_reason".to_string()), "hidden fields never block");

    session.merge([
        ("report_day", FieldValue::text("2026-03-02")),
        ("shift", FieldValue::text("day")),
        ("line1_output", FieldValue::Number(118.0)),
    ])?;
    session.set_time_pair("line1_time", "09:00", "03:00", "kiln feed jam")?;
    session.set_time_pair("line2_time", "12:00", "00:00", "")?;
    session.set_tonnage(LINE_TONNAGE[0], 0, 42.0)?;
    session.set("stopped", true)?;
    assert!(session.issues().iter().any(|i| i.key == "stop_reason"));
    session.set("stop_reason", "feed jam on line 1")?;
    assert!(session.issues().is_empty(), "{:?}", session.issues());

    let id = session.submit(&mut desk.store)?;
    assert_eq!(session.set("line1_output", 1.0), Err(Rejected::Submitted));

    let stored = shiftform_storage::FormStore::get_report(&desk.store, id)?.ok_or("report missing")?;
    assert_eq!(stored.report_date.as_deref(), Some("2026-03-02"));
    assert_eq!(stored.values.get("line1_output"), Some(&FieldValue::Number(118.0)));
    assert_eq!(&stored.values, session.snapshot());
    assert!(stored.values.contains_key(LINE_TONNAGE[0]));
    Ok(())
}

#[test]
fn unbalanced_time_pair_blocks_submit() -> TestResult {
    let mut desk = production_desk()?;
    let mut session = desk.session("kiln")?;
    session.merge([
        ("report_day", FieldValue::text("2026-03-02")),
        ("shift", FieldValue::text("night")),
    ])?;
    session.set_time_pair("line1_time", "08:00", "02:00", "belt")?;
    let issues = session.issues();
    assert!(issues.iter().any(|i| i.key == "line1_time"));
    assert!(session.submit(&mut desk.store).is_err());
    assert!(!session.is_submitted());
    Ok(())
}

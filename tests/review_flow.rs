mod common;

use anyhow::{Context, Result};
use time::Duration;

use revisit::error::Error;
use revisit::model::{self, RevisionId};

use common::fixture;

#[test]
fn completion_bumps_count_and_reschedules_from_the_new_count() -> Result<()> {
    let fx = fixture()?;
    fx.write_note("notes1.txt", "First\nsecond")?;

    let mut tracker = fx.tracker()?;
    tracker.watch_new()?;
    tracker.scan()?;

    let today = model::today();
    let revisions = tracker.store.list_by_document("notes1.txt", false)?;
    let id = revisions[0].id;
    assert_eq!(revisions[0].completions_done, 0);
    // Fixture intervals are [2, 6, 14] with no jitter.
    assert_eq!(revisions[0].scheduled_date, today + Duration::days(2));

    let after_first = tracker.complete_review(id)?;
    assert_eq!(after_first.completions_done, 1);
    assert_eq!(after_first.scheduled_date, today + Duration::days(6));

    let after_second = tracker.complete_review(id)?;
    assert_eq!(after_second.completions_done, 2);
    assert_eq!(after_second.scheduled_date, today + Duration::days(14));

    // Past the end of the interval table the cadence plateaus.
    let after_third = tracker.complete_review(id)?;
    assert_eq!(after_third.completions_done, 3);
    assert_eq!(after_third.scheduled_date, today + Duration::days(14));
    Ok(())
}

#[test]
fn completing_an_unknown_revision_is_not_found() -> Result<()> {
    let fx = fixture()?;
    let mut tracker = fx.tracker()?;
    let err = tracker.complete_review(RevisionId(999)).unwrap_err();
    assert!(matches!(err, Error::NotFound(RevisionId(999))));
    Ok(())
}

#[test]
fn due_listing_is_boundary_inclusive_and_hides_hidden_revisions() -> Result<()> {
    let fx = fixture()?;
    fx.write_note("notes1.txt", "content")?;

    let mut tracker = fx.tracker()?;
    tracker.watch_new()?;
    tracker.scan()?;

    let today = model::today();
    let scheduled = today + Duration::days(2);

    assert!(tracker.due_for_review(scheduled - Duration::days(1))?.is_empty());

    let due = tracker.due_for_review(scheduled)?;
    assert_eq!(due.len(), 1);
    let id = due[0].id;
    assert!(due[0].payload.is_some());

    tracker.set_hidden(id, true)?;
    assert!(tracker.due_for_review(scheduled)?.is_empty());
    // Hidden revisions stay in storage.
    assert_eq!(tracker.store.list_due_by(scheduled)?.len(), 1);

    tracker.set_hidden(id, false)?;
    assert_eq!(tracker.due_for_review(scheduled)?.len(), 1);
    Ok(())
}

#[test]
fn scheduling_overrides_apply_per_document() -> Result<()> {
    let fx = fixture()?;
    let mut config = fx.config.clone();
    config
        .scheduling_overrides
        .push(revisit::config::ScheduleOverride {
            pattern: "^journal-".to_string(),
            scheduling: revisit::config::ScheduleParams {
                intervals: vec![1],
                jitter: vec![0],
            },
        });

    fx.write_note("journal-monday.txt", "entry")?;
    fx.write_note("notes.txt", "note")?;

    let mut tracker = revisit::tracker::Tracker::open(config).context("open tracker")?;
    tracker.watch_new()?;
    tracker.scan()?;

    let today = model::today();
    let journal = tracker.store.list_by_document("journal-monday.txt", false)?;
    assert_eq!(journal[0].scheduled_date, today + Duration::days(1));
    let notes = tracker.store.list_by_document("notes.txt", false)?;
    assert_eq!(notes[0].scheduled_date, today + Duration::days(2));
    Ok(())
}

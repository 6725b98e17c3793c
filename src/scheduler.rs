//! Expands pattern steps into concrete review dates.
//!
//! Every function here is pure. Steps must already be sorted ascending by step
//! number (which `Pattern::new` guarantees); nothing in this module re-sorts.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::calendar::{add_days, days_between, is_before};
use crate::error::{EngineError, Result};
use crate::models::{Item, OverduePolicy, PatternStep, ReviewDate};

/// One generated repetition, not yet bound to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReview {
    pub id: Uuid,
    pub step_number: u32,
    pub initial_scheduled_date: NaiveDate,
    pub scheduled_date: NaiveDate,
    pub is_completed: bool,
}

impl ScheduledReview {
    pub fn into_review_date(self, item: &Item) -> ReviewDate {
        ReviewDate {
            id: self.id,
            user_id: item.user_id.clone(),
            item_id: item.id,
            category_id: item.category_id,
            box_id: item.box_id,
            step_number: self.step_number,
            initial_scheduled_date: self.initial_scheduled_date,
            scheduled_date: self.scheduled_date,
            is_completed: self.is_completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub reviews: Vec<ScheduledReview>,
    pub item_finished: bool,
}

/// Where review-date ids come from.
#[derive(Debug, Clone, Copy)]
pub enum Identities<'a> {
    Fresh,
    Reuse(&'a [Uuid]),
}

fn check_ids(steps: &[PatternStep], ids: &[Uuid]) -> Result<()> {
    if ids.len() != steps.len() {
        return Err(EngineError::MismatchedIdsAndSteps {
            ids: ids.len(),
            steps: steps.len(),
        });
    }
    Ok(())
}

fn expand(
    steps: &[PatternStep],
    ids: impl Iterator<Item = Uuid>,
    date_for: impl Fn(&PatternStep) -> (NaiveDate, NaiveDate),
    completed: impl Fn(NaiveDate) -> bool,
) -> Vec<ScheduledReview> {
    steps
        .iter()
        .zip(ids)
        .map(|(step, id)| {
            let (initial, scheduled) = date_for(step);
            ScheduledReview {
                id,
                step_number: step.step_number,
                initial_scheduled_date: initial,
                scheduled_date: scheduled,
                is_completed: completed(scheduled),
            }
        })
        .collect()
}

fn completed_from(
    steps: &[PatternStep],
    ids: impl Iterator<Item = Uuid>,
    anchor: NaiveDate,
    today: NaiveDate,
) -> Generated {
    let reviews = expand(
        steps,
        ids,
        |s| {
            let date = add_days(anchor, s.interval_days as i64);
            (date, date)
        },
        |date| is_before(date, today),
    );
    let item_finished = reviews
        .last()
        .is_some_and(|last| is_before(last.scheduled_date, today));
    Generated {
        reviews,
        item_finished,
    }
}

fn incomplete_from(
    steps: &[PatternStep],
    ids: impl Iterator<Item = Uuid>,
    anchor: NaiveDate,
    today: NaiveDate,
) -> Vec<ScheduledReview> {
    let shift = match steps.first() {
        Some(first) => {
            let first_date = add_days(anchor, first.interval_days as i64);
            if is_before(first_date, today) {
                days_between(first_date, today).max(0)
            } else {
                0
            }
        }
        None => 0,
    };
    expand(
        steps,
        ids,
        |s| {
            let date = add_days(anchor, s.interval_days as i64 + shift);
            (date, date)
        },
        |_| false,
    )
}

/// Dates before `today` are born completed; the item is finished when the last
/// step is.
pub fn overdue_completed(steps: &[PatternStep], anchor: NaiveDate, today: NaiveDate) -> Generated {
    completed_from(steps, std::iter::repeat_with(Uuid::new_v4), anchor, today)
}

/// Slides the whole schedule forward so the first step is not overdue. Spacing
/// between steps is preserved and nothing is completed.
pub fn overdue_incomplete(
    steps: &[PatternStep],
    anchor: NaiveDate,
    today: NaiveDate,
) -> Vec<ScheduledReview> {
    incomplete_from(steps, std::iter::repeat_with(Uuid::new_v4), anchor, today)
}

pub fn overdue_completed_with_ids(
    steps: &[PatternStep],
    ids: &[Uuid],
    anchor: NaiveDate,
    today: NaiveDate,
) -> Result<Generated> {
    check_ids(steps, ids)?;
    Ok(completed_from(steps, ids.iter().copied(), anchor, today))
}

pub fn overdue_incomplete_with_ids(
    steps: &[PatternStep],
    ids: &[Uuid],
    anchor: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<ScheduledReview>> {
    check_ids(steps, ids)?;
    Ok(incomplete_from(steps, ids.iter().copied(), anchor, today))
}

/// `initial = anchor + interval`, `scheduled = initial - shift_back`. A negative
/// `shift_back` pushes the scheduled dates later.
pub fn incomplete_for_back_shift(
    steps: &[PatternStep],
    ids: &[Uuid],
    anchor: NaiveDate,
    shift_back: i64,
) -> Result<Vec<ScheduledReview>> {
    check_ids(steps, ids)?;
    Ok(expand(
        steps,
        ids.iter().copied(),
        |s| {
            let initial = add_days(anchor, s.interval_days as i64);
            (initial, add_days(initial, -shift_back))
        },
        |_| false,
    ))
}

/// Picks the generator for a policy and identity source. The incomplete policy
/// never reports the item as finished, even if some generated dates are past.
pub fn generate(
    policy: OverduePolicy,
    steps: &[PatternStep],
    identities: Identities<'_>,
    anchor: NaiveDate,
    today: NaiveDate,
) -> Result<Generated> {
    match (policy, identities) {
        (OverduePolicy::MarkCompleted, Identities::Fresh) => {
            Ok(overdue_completed(steps, anchor, today))
        }
        (OverduePolicy::MarkCompleted, Identities::Reuse(ids)) => {
            overdue_completed_with_ids(steps, ids, anchor, today)
        }
        (OverduePolicy::KeepIncomplete, Identities::Fresh) => Ok(Generated {
            reviews: overdue_incomplete(steps, anchor, today),
            item_finished: false,
        }),
        (OverduePolicy::KeepIncomplete, Identities::Reuse(ids)) => Ok(Generated {
            reviews: overdue_incomplete_with_ids(steps, ids, anchor, today)?,
            item_finished: false,
        }),
    }
}

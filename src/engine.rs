//! Item use cases. Each public method runs in one transaction: the scheduler
//! computes dates, the classifier picks a row plan, the completion rules settle
//! the finished flag, and the stores persist the result.

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::{add_days, days_between, is_before};
use crate::completion::{after_toggle, finished_after_generation};
use crate::error::{EngineError, Result};
use crate::models::{
    Item, ItemUpdate, ItemWithSchedule, NewItem, OverduePolicy, PatternStep, ReviewDate,
    ShiftRequest,
};
use crate::reconcile::{PatternState, Reconciliation, RowChange};
use crate::scheduler::{
    generate, incomplete_for_back_shift, overdue_completed_with_ids,
    overdue_incomplete_with_ids, Identities, ScheduledReview,
};
use crate::store::{
    ItemStore, PatternStepReader, Reference, ReferenceReader, ReviewDateStore, Stores,
    TransactionRunner,
};

pub struct Engine<'a, R: TransactionRunner> {
    runner: &'a R,
    user_id: String,
}

impl<'a, R: TransactionRunner> Engine<'a, R> {
    pub fn new(runner: &'a R, user_id: impl Into<String>) -> Self {
        Self {
            runner,
            user_id: user_id.into(),
        }
    }

    pub fn create_item(&self, new: NewItem, today: NaiveDate) -> Result<ItemWithSchedule> {
        new.validate()?;

        let mut item = Item {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            category_id: new.category_id,
            box_id: new.box_id,
            pattern_id: new.pattern_id,
            name: new.name.trim().to_string(),
            detail: new.detail,
            learned_date: new.learned_date,
            is_finished: false,
            edited_at: String::new(),
        };

        self.runner.run_in_transaction(move |stores| {
            self.check_references(
                stores,
                &[
                    (Reference::Pattern, item.pattern_id),
                    (Reference::Category, item.category_id),
                    (Reference::Box, item.box_id),
                ],
            )?;

            let rows = match item.pattern_id {
                Some(pattern_id) => {
                    let steps = stores.steps_for_pattern(pattern_id)?;
                    let generated = generate(
                        new.policy,
                        &steps,
                        Identities::Fresh,
                        item.learned_date,
                        today,
                    )?;
                    item.is_finished = finished_after_generation(new.policy, &generated);
                    bind(generated.reviews, &item)
                }
                None => vec![],
            };

            stores.insert_item(&item)?;
            stores.insert_review_dates(&rows)?;
            info!(
                item_id = %item.id,
                review_dates = rows.len(),
                finished = item.is_finished,
                "created item"
            );

            snapshot(stores, item.id)
        })
    }

    pub fn update_item(&self, update: ItemUpdate, today: NaiveDate) -> Result<ItemWithSchedule> {
        update.validate()?;

        self.runner.run_in_transaction(|stores| {
            let current = self.owned_item(stores, update.id)?;
            if !update.changes(&current) {
                return Err(EngineError::NoDiff);
            }
            // Unchanged references were accepted when they were set
            let changed = |requested: Option<Uuid>, existing: Option<Uuid>| {
                requested.filter(|_| requested != existing)
            };
            self.check_references(
                stores,
                &[
                    (Reference::Pattern, changed(update.pattern_id, current.pattern_id)),
                    (Reference::Category, changed(update.category_id, current.category_id)),
                    (Reference::Box, changed(update.box_id, current.box_id)),
                ],
            )?;

            let reconciliation = Reconciliation::classify(
                &PatternState {
                    pattern_id: current.pattern_id,
                    learned_date: current.learned_date,
                },
                &PatternState {
                    pattern_id: update.pattern_id,
                    learned_date: update.learned_date,
                },
                |id| stores.steps_for_pattern(id),
            )?;
            let row_change = reconciliation.row_change();
            debug!(
                item_id = %current.id,
                facts = ?reconciliation.facts(),
                row_change = ?row_change,
                "classified item update"
            );

            if reconciliation.requires_no_completed()
                && stores.has_completed_review_date(current.id)?
            {
                return Err(EngineError::HasCompletedReviewDate);
            }

            let mut item = Item {
                category_id: update.category_id,
                box_id: update.box_id,
                pattern_id: update.pattern_id,
                name: update.name.trim().to_string(),
                detail: update.detail.clone(),
                learned_date: update.learned_date,
                ..current.clone()
            };

            match row_change {
                RowChange::Keep => {
                    if item.category_id != current.category_id || item.box_id != current.box_id {
                        stores.reclassify_review_dates(item.id, item.category_id, item.box_id)?;
                    }
                }
                RowChange::DeleteAll => {
                    let removed = stores.delete_review_dates_for_item(item.id)?;
                    info!(item_id = %item.id, removed, "detached pattern");
                }
                RowChange::Insert | RowChange::Replace => {
                    if row_change == RowChange::Replace {
                        let removed = stores.delete_review_dates_for_item(item.id)?;
                        debug!(item_id = %item.id, removed, "dropped old review dates");
                    }
                    let steps = requested_steps(stores, &item)?;
                    let generated = generate(
                        update.policy,
                        &steps,
                        Identities::Fresh,
                        item.learned_date,
                        today,
                    )?;
                    item.is_finished = finished_after_generation(update.policy, &generated);
                    let rows = bind(generated.reviews, &item);
                    stores.insert_review_dates(&rows)?;
                    info!(item_id = %item.id, inserted = rows.len(), "regenerated review dates");
                }
                RowChange::UpdateInPlace => {
                    let steps = requested_steps(stores, &item)?;
                    let ids = stores.review_date_ids_for_item(item.id)?;
                    let generated = generate(
                        update.policy,
                        &steps,
                        Identities::Reuse(&ids),
                        item.learned_date,
                        today,
                    )?;
                    item.is_finished = finished_after_generation(update.policy, &generated);
                    let rows = bind(generated.reviews, &item);
                    stores.update_review_dates(&rows)?;
                    info!(item_id = %item.id, updated = rows.len(), "rescheduled review dates");
                }
            }

            stores.update_item(&item)?;
            snapshot(stores, item.id)
        })
    }

    /// Moves one review date to `requested_date` and recomputes every later
    /// step around it. Earlier steps are untouched.
    pub fn shift_review_date(
        &self,
        request: ShiftRequest,
        today: NaiveDate,
    ) -> Result<ItemWithSchedule> {
        self.runner.run_in_transaction(|stores| {
            let item = self.owned_item(stores, request.item_id)?;
            let rows = stores.review_dates_for_item(item.id)?;
            let target = find_step(&rows, &item, request.step_number)?;

            if is_before(request.requested_date, target.initial_scheduled_date) {
                return Err(EngineError::NewDateBeforeInitial {
                    requested: request.requested_date,
                    initial: target.initial_scheduled_date,
                });
            }

            let steps = requested_steps(stores, &item)?;
            let interval = steps
                .iter()
                .find(|s| s.step_number == request.step_number)
                .map(|s| s.interval_days as i64)
                .ok_or_else(|| step_not_found(&item, request.step_number))?;

            let shift = days_between(target.initial_scheduled_date, request.requested_date);
            let base = add_days(target.initial_scheduled_date, -interval);
            let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
            debug!(
                item_id = %item.id,
                step = request.step_number,
                shift,
                policy = request.policy.as_str(),
                "shifting review date"
            );

            // Only the completed path decides the finished flag
            let (reviews, finished) = match request.policy {
                OverduePolicy::KeepIncomplete => {
                    (incomplete_for_back_shift(&steps, &ids, base, -shift)?, None)
                }
                OverduePolicy::MarkCompleted => {
                    let generated =
                        overdue_completed_with_ids(&steps, &ids, add_days(base, shift), today)?;
                    let reviews = generated
                        .reviews
                        .into_iter()
                        .zip(&steps)
                        .map(|(mut review, step)| {
                            review.initial_scheduled_date =
                                add_days(base, step.interval_days as i64);
                            review
                        })
                        .collect();
                    (reviews, Some(generated.item_finished))
                }
            };

            let tail = tail_from(reviews, request.step_number, &item);
            stores.update_review_dates(&tail)?;
            let finished = finished.unwrap_or(item.is_finished);
            if finished != item.is_finished {
                stores.set_item_finished(item.id, finished)?;
            }
            info!(item_id = %item.id, updated = tail.len(), finished, "shifted review dates");

            snapshot(stores, item.id)
        })
    }

    pub fn complete_review_date(
        &self,
        item_id: Uuid,
        step_number: u32,
    ) -> Result<ItemWithSchedule> {
        self.toggle(item_id, step_number, true)
    }

    pub fn uncomplete_review_date(
        &self,
        item_id: Uuid,
        step_number: u32,
    ) -> Result<ItemWithSchedule> {
        self.toggle(item_id, step_number, false)
    }

    fn toggle(&self, item_id: Uuid, step_number: u32, completed: bool) -> Result<ItemWithSchedule> {
        self.runner.run_in_transaction(|stores| {
            let item = self.owned_item(stores, item_id)?;
            let rows = stores.review_dates_for_item(item.id)?;
            let last_step = rows.iter().map(|r| r.step_number).max().unwrap_or(0);

            let mut row = find_step(&rows, &item, step_number)?.clone();
            if row.is_completed == completed {
                return Err(EngineError::NoDiff);
            }
            row.is_completed = completed;
            stores.update_review_dates(std::slice::from_ref(&row))?;

            let finished = after_toggle(step_number, completed, last_step, item.is_finished)
                .apply(item.is_finished);
            if finished != item.is_finished {
                stores.set_item_finished(item.id, finished)?;
            }
            info!(
                item_id = %item.id,
                step = step_number,
                completed,
                finished,
                "toggled review date"
            );

            snapshot(stores, item.id)
        })
    }

    /// Marks the item finished without touching its review dates.
    pub fn force_finish(&self, item_id: Uuid) -> Result<ItemWithSchedule> {
        self.runner.run_in_transaction(|stores| {
            let item = self.owned_item(stores, item_id)?;
            stores.set_item_finished(item.id, true)?;
            info!(item_id = %item.id, "forced finish");
            snapshot(stores, item.id)
        })
    }

    /// Clears the finished flag. When the first open review date is already
    /// due, the schedule is re-anchored so step 1's slot falls on today and
    /// the rows from that open step on are rewritten. The open step lands on
    /// `today + (its interval - step 1's interval)`.
    pub fn force_resume(&self, item_id: Uuid, today: NaiveDate) -> Result<ItemWithSchedule> {
        self.runner.run_in_transaction(|stores| {
            let item = self.owned_item(stores, item_id)?;
            let rows = stores.review_dates_for_item(item.id)?;

            match rows.iter().find(|r| !r.is_completed) {
                Some(first_open) if !is_before(today, first_open.scheduled_date) => {
                    let steps = requested_steps(stores, &item)?;
                    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
                    let anchor = add_days(
                        item.learned_date,
                        days_between(first_open.initial_scheduled_date, today),
                    );
                    let reviews = overdue_incomplete_with_ids(&steps, &ids, anchor, today)?;
                    let tail = tail_from(reviews, first_open.step_number, &item);
                    stores.update_review_dates(&tail)?;
                    info!(
                        item_id = %item.id,
                        from_step = first_open.step_number,
                        updated = tail.len(),
                        "rescheduled on resume"
                    );
                }
                _ => debug!(item_id = %item.id, "resume without rescheduling"),
            }

            stores.set_item_finished(item.id, false)?;
            snapshot(stores, item.id)
        })
    }

    /// Every set reference must exist and belong to this engine's user.
    fn check_references(
        &self,
        stores: &dyn Stores,
        references: &[(Reference, Option<Uuid>)],
    ) -> Result<()> {
        for (reference, id) in references {
            let Some(id) = id else { continue };
            match stores.reference_owner(*reference, *id)? {
                Some(owner) if owner == self.user_id => {}
                _ => return Err(EngineError::not_found(reference.kind(), id)),
            }
        }
        Ok(())
    }

    fn owned_item(&self, stores: &dyn Stores, id: Uuid) -> Result<Item> {
        match stores.get_item(id)? {
            Some(item) if item.user_id == self.user_id => Ok(item),
            _ => Err(EngineError::not_found("item", id)),
        }
    }
}

fn bind(reviews: Vec<ScheduledReview>, item: &Item) -> Vec<ReviewDate> {
    reviews
        .into_iter()
        .map(|r| r.into_review_date(item))
        .collect()
}

fn tail_from(reviews: Vec<ScheduledReview>, step_number: u32, item: &Item) -> Vec<ReviewDate> {
    reviews
        .into_iter()
        .filter(|r| r.step_number >= step_number)
        .map(|r| r.into_review_date(item))
        .collect()
}

fn requested_steps(stores: &dyn Stores, item: &Item) -> Result<Vec<PatternStep>> {
    match item.pattern_id {
        Some(pattern_id) => stores.steps_for_pattern(pattern_id),
        None => Err(EngineError::Validation(format!(
            "item {} has no pattern",
            item.id
        ))),
    }
}

fn step_not_found(item: &Item, step_number: u32) -> EngineError {
    EngineError::not_found("review date", format!("{} step {}", item.id, step_number))
}

fn find_step<'r>(rows: &'r [ReviewDate], item: &Item, step_number: u32) -> Result<&'r ReviewDate> {
    rows.iter()
        .find(|r| r.step_number == step_number)
        .ok_or_else(|| step_not_found(item, step_number))
}

fn snapshot(stores: &dyn Stores, item_id: Uuid) -> Result<ItemWithSchedule> {
    let item = stores
        .get_item(item_id)?
        .ok_or_else(|| EngineError::not_found("item", item_id))?;
    let review_dates = stores.review_dates_for_item(item_id)?;
    Ok(ItemWithSchedule { item, review_dates })
}

//! Decides what an item edit does to its review dates.
//!
//! An edit is classified once into a [`Transition`] plus a learned-date bit;
//! the blocked check, the regeneration variant and the row plan are all
//! exhaustive matches over that pair.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::PatternStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepComparison {
    SameStructure,
    IntervalsDiffer,
    LengthDiffers,
}

impl StepComparison {
    pub fn of(current: &[PatternStep], requested: &[PatternStep]) -> Self {
        if current.len() != requested.len() {
            return StepComparison::LengthDiffers;
        }
        let same = current
            .iter()
            .zip(requested)
            .all(|(a, b)| a.step_number == b.step_number && a.interval_days == b.interval_days);
        if same {
            StepComparison::SameStructure
        } else {
            StepComparison::IntervalsDiffer
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    /// No pattern before or after.
    Unpatterned,
    Attach,
    Detach,
    /// Same pattern id on both sides.
    Keep,
    Switch(StepComparison),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternState {
    pub pattern_id: Option<Uuid>,
    pub learned_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regeneration {
    None,
    /// New rows with new ids.
    Fresh,
    /// Recompute existing rows, keeping their ids.
    InPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Keep,
    DeleteAll,
    Insert,
    Replace,
    UpdateInPlace,
}

/// The named facts of an edit, flattened for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Facts {
    pub learned_date_changed: bool,
    pub pattern_null_to_set: bool,
    pub pattern_set_to_null: bool,
    pub pattern_set_to_set: bool,
    pub same_pattern_id: bool,
    pub steps_length_differs: bool,
    pub only_intervals_differ: bool,
    pub same_step_structure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub transition: Transition,
    pub learned_date_changed: bool,
}

impl Reconciliation {
    /// `load_steps` is only called when both sides carry different pattern ids.
    pub fn classify<F>(
        current: &PatternState,
        requested: &PatternState,
        mut load_steps: F,
    ) -> Result<Self>
    where
        F: FnMut(Uuid) -> Result<Vec<PatternStep>>,
    {
        let transition = match (current.pattern_id, requested.pattern_id) {
            (None, None) => Transition::Unpatterned,
            (None, Some(_)) => Transition::Attach,
            (Some(_), None) => Transition::Detach,
            (Some(a), Some(b)) if a == b => Transition::Keep,
            (Some(a), Some(b)) => {
                let old_steps = load_steps(a)?;
                let new_steps = load_steps(b)?;
                Transition::Switch(StepComparison::of(&old_steps, &new_steps))
            }
        };
        Ok(Self {
            transition,
            learned_date_changed: current.learned_date != requested.learned_date,
        })
    }

    /// Whether the edit must be refused when any review date is completed.
    pub fn requires_no_completed(&self) -> bool {
        match self.transition {
            Transition::Detach | Transition::Switch(_) => true,
            Transition::Keep => self.learned_date_changed,
            Transition::Unpatterned | Transition::Attach => false,
        }
    }

    pub fn regeneration(&self) -> Regeneration {
        match (self.transition, self.learned_date_changed) {
            (Transition::Attach, _) => Regeneration::Fresh,
            (Transition::Switch(StepComparison::LengthDiffers), _) => Regeneration::Fresh,
            (Transition::Switch(StepComparison::IntervalsDiffer), _) => Regeneration::InPlace,
            (Transition::Switch(StepComparison::SameStructure), true) => Regeneration::InPlace,
            (Transition::Keep, true) => Regeneration::InPlace,
            (Transition::Switch(StepComparison::SameStructure), false)
            | (Transition::Keep, false)
            | (Transition::Unpatterned, _)
            | (Transition::Detach, _) => Regeneration::None,
        }
    }

    pub fn row_change(&self) -> RowChange {
        match (self.transition, self.regeneration()) {
            (Transition::Detach, _) => RowChange::DeleteAll,
            (Transition::Switch(StepComparison::LengthDiffers), _) => RowChange::Replace,
            (Transition::Attach, _) => RowChange::Insert,
            (_, Regeneration::InPlace) => RowChange::UpdateInPlace,
            _ => RowChange::Keep,
        }
    }

    pub fn facts(&self) -> Facts {
        let set_to_set = matches!(self.transition, Transition::Keep | Transition::Switch(_));
        let comparison = match self.transition {
            Transition::Keep => Some(StepComparison::SameStructure),
            Transition::Switch(c) => Some(c),
            _ => None,
        };
        Facts {
            learned_date_changed: self.learned_date_changed,
            pattern_null_to_set: self.transition == Transition::Attach,
            pattern_set_to_null: self.transition == Transition::Detach,
            pattern_set_to_set: set_to_set,
            same_pattern_id: matches!(self.transition, Transition::Keep | Transition::Unpatterned),
            steps_length_differs: comparison == Some(StepComparison::LengthDiffers),
            only_intervals_differ: comparison == Some(StepComparison::IntervalsDiffer),
            same_step_structure: comparison == Some(StepComparison::SameStructure),
        }
    }
}

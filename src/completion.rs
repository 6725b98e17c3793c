use crate::models::OverduePolicy;
use crate::scheduler::Generated;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishedChange {
    Unchanged,
    Finish,
    Reopen,
}

impl FinishedChange {
    pub fn apply(self, is_finished: bool) -> bool {
        match self {
            FinishedChange::Unchanged => is_finished,
            FinishedChange::Finish => true,
            FinishedChange::Reopen => false,
        }
    }
}

/// Finished flag implied by a freshly generated schedule. Only the
/// mark-completed policy can finish an item.
pub fn finished_after_generation(policy: OverduePolicy, generated: &Generated) -> bool {
    policy == OverduePolicy::MarkCompleted && generated.item_finished
}

/// Effect of toggling one review date. Completing the last step finishes the
/// item; un-completing any step of a finished item reopens it.
pub fn after_toggle(
    step_number: u32,
    completed: bool,
    last_step: u32,
    item_finished: bool,
) -> FinishedChange {
    match (completed, item_finished) {
        (true, _) if step_number == last_step => FinishedChange::Finish,
        (false, true) => FinishedChange::Reopen,
        _ => FinishedChange::Unchanged,
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

// Ordered rule list; the first failing rule's message wins
fn check(rules: &[(bool, &str)]) -> Result<()> {
    match rules.iter().find(|(ok, _)| !ok) {
        Some((_, message)) => Err(EngineError::Validation(message.to_string())),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStep {
    pub step_number: u32,
    pub interval_days: u32,
}

impl PatternStep {
    pub fn new(step_number: u32, interval_days: u32) -> Result<Self> {
        check(&[
            (step_number > 0, "step number must be positive"),
            (interval_days > 0, "interval days must be positive"),
        ])?;
        Ok(Self {
            step_number,
            interval_days,
        })
    }
}

/// A named cadence. Construction is the only place step ordering is checked;
/// everything downstream takes `steps` as already sorted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub steps: Vec<PatternStep>,
}

impl Pattern {
    pub fn new(user_id: &str, name: &str, steps: Vec<PatternStep>) -> Result<Self> {
        let consecutive = steps
            .iter()
            .enumerate()
            .all(|(i, s)| s.step_number as usize == i + 1);
        let increasing = steps
            .windows(2)
            .all(|w| w[0].interval_days < w[1].interval_days);

        check(&[
            (!name.trim().is_empty(), "pattern name must not be empty"),
            (!steps.is_empty(), "pattern must have at least one step"),
            (consecutive, "step numbers must be consecutive starting at 1"),
            (increasing, "interval days must be strictly increasing"),
        ])?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            steps,
        })
    }

    /// Builds a pattern from bare intervals, numbering the steps from 1.
    pub fn from_intervals(user_id: &str, name: &str, intervals: &[u32]) -> Result<Self> {
        let steps = intervals
            .iter()
            .enumerate()
            .map(|(i, days)| PatternStep::new(i as u32 + 1, *days))
            .collect::<Result<Vec<_>>>()?;
        Self::new(user_id, name, steps)
    }

    pub fn intervals_label(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.interval_days.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
}

impl Category {
    pub fn new(user_id: &str, name: &str) -> Result<Self> {
        check(&[(!name.trim().is_empty(), "category name must not be empty")])?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyBox {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
}

impl StudyBox {
    pub fn new(user_id: &str, name: &str) -> Result<Self> {
        check(&[(!name.trim().is_empty(), "box name must not be empty")])?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
        })
    }
}

// How generation treats dates that already lie before today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverduePolicy {
    MarkCompleted,
    KeepIncomplete,
}

impl OverduePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverduePolicy::MarkCompleted => "mark_completed",
            OverduePolicy::KeepIncomplete => "keep_incomplete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mark_completed" | "completed" | "1" | "true" | "yes" => {
                Some(OverduePolicy::MarkCompleted)
            }
            "keep_incomplete" | "incomplete" | "0" | "false" | "no" => {
                Some(OverduePolicy::KeepIncomplete)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub user_id: String,
    pub category_id: Option<Uuid>,
    pub box_id: Option<Uuid>,
    pub pattern_id: Option<Uuid>,
    pub name: String,
    pub detail: String,
    pub learned_date: NaiveDate,
    pub is_finished: bool,
    pub edited_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDate {
    pub id: Uuid,
    pub user_id: String,
    pub item_id: Uuid,
    pub category_id: Option<Uuid>,
    pub box_id: Option<Uuid>,
    pub step_number: u32,
    pub initial_scheduled_date: NaiveDate,
    pub scheduled_date: NaiveDate,
    pub is_completed: bool,
}

// Request to register a new item
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub detail: String,
    pub learned_date: NaiveDate,
    pub category_id: Option<Uuid>,
    pub box_id: Option<Uuid>,
    pub pattern_id: Option<Uuid>,
    pub policy: OverduePolicy,
}

impl NewItem {
    pub fn new(name: &str, learned_date: NaiveDate) -> Result<Self> {
        check(&[(!name.trim().is_empty(), "item name must not be empty")])?;
        Ok(Self {
            name: name.trim().to_string(),
            detail: String::new(),
            learned_date,
            category_id: None,
            box_id: None,
            pattern_id: None,
            policy: OverduePolicy::KeepIncomplete,
        })
    }

    pub fn validate(&self) -> Result<()> {
        check(&[(!self.name.trim().is_empty(), "item name must not be empty")])
    }
}

/// The full requested state of an item. Start from `ItemUpdate::from_item` and
/// overwrite what changes.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub id: Uuid,
    pub name: String,
    pub detail: String,
    pub learned_date: NaiveDate,
    pub category_id: Option<Uuid>,
    pub box_id: Option<Uuid>,
    pub pattern_id: Option<Uuid>,
    pub policy: OverduePolicy,
}

impl ItemUpdate {
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            detail: item.detail.clone(),
            learned_date: item.learned_date,
            category_id: item.category_id,
            box_id: item.box_id,
            pattern_id: item.pattern_id,
            policy: OverduePolicy::KeepIncomplete,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check(&[(!self.name.trim().is_empty(), "item name must not be empty")])
    }

    pub fn changes(&self, item: &Item) -> bool {
        self.name != item.name
            || self.detail != item.detail
            || self.learned_date != item.learned_date
            || self.category_id != item.category_id
            || self.box_id != item.box_id
            || self.pattern_id != item.pattern_id
    }
}

// Push one review date (and every later step) to a new date
#[derive(Debug, Clone)]
pub struct ShiftRequest {
    pub item_id: Uuid,
    pub step_number: u32,
    pub requested_date: NaiveDate,
    pub policy: OverduePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOverview {
    pub item: Item,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub next_review: Option<NaiveDate>,
}

impl ItemOverview {
    pub fn status_label(&self) -> &'static str {
        if self.item.is_finished {
            "Finished"
        } else if self.total_steps == 0 {
            "No pattern"
        } else {
            "Active"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemWithSchedule {
    pub item: Item,
    pub review_dates: Vec<ReviewDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueReview {
    pub item_name: String,
    pub review_date: ReviewDate,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_message(r: Result<impl std::fmt::Debug>) -> String {
        match r {
            Err(EngineError::Validation(m)) => m,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    mod pattern_step_tests {
        use super::*;

        #[test]
        fn accepts_positive_values() {
            let s = PatternStep::new(1, 3).unwrap();
            assert_eq!(s.step_number, 1);
            assert_eq!(s.interval_days, 3);
        }

        #[test]
        fn rejects_zero_step_number_first() {
            // Both fields are invalid; the step number rule comes first
            let msg = validation_message(PatternStep::new(0, 0));
            assert_eq!(msg, "step number must be positive");
        }

        #[test]
        fn rejects_zero_interval() {
            let msg = validation_message(PatternStep::new(2, 0));
            assert_eq!(msg, "interval days must be positive");
        }
    }

    mod pattern_tests {
        use super::*;

        fn step(n: u32, days: u32) -> PatternStep {
            PatternStep::new(n, days).unwrap()
        }

        #[test]
        fn from_intervals_numbers_steps() {
            let p = Pattern::from_intervals("local", "Classic", &[1, 3, 7]).unwrap();
            assert_eq!(p.steps, vec![step(1, 1), step(2, 3), step(3, 7)]);
            assert_eq!(p.intervals_label(), "1, 3, 7");
        }

        #[test]
        fn trims_name() {
            let p = Pattern::from_intervals("local", "  Weekly ", &[7]).unwrap();
            assert_eq!(p.name, "Weekly");
        }

        #[test]
        fn rejects_empty_name() {
            let msg = validation_message(Pattern::from_intervals("local", "  ", &[1]));
            assert_eq!(msg, "pattern name must not be empty");
        }

        #[test]
        fn rejects_no_steps() {
            let msg = validation_message(Pattern::new("local", "P", vec![]));
            assert_eq!(msg, "pattern must have at least one step");
        }

        #[test]
        fn rejects_gap_in_step_numbers() {
            let msg = validation_message(Pattern::new("local", "P", vec![step(1, 1), step(3, 4)]));
            assert_eq!(msg, "step numbers must be consecutive starting at 1");
        }

        #[test]
        fn rejects_steps_not_starting_at_one() {
            let msg = validation_message(Pattern::new("local", "P", vec![step(2, 1)]));
            assert_eq!(msg, "step numbers must be consecutive starting at 1");
        }

        #[test]
        fn rejects_non_increasing_intervals() {
            let msg = validation_message(Pattern::from_intervals("local", "P", &[3, 3]));
            assert_eq!(msg, "interval days must be strictly increasing");

            let msg = validation_message(Pattern::from_intervals("local", "P", &[5, 2]));
            assert_eq!(msg, "interval days must be strictly increasing");
        }

        #[test]
        fn zero_interval_reported_before_ordering() {
            let msg = validation_message(Pattern::from_intervals("local", "P", &[0, 2]));
            assert_eq!(msg, "interval days must be positive");
        }
    }

    mod named_entity_tests {
        use super::*;

        #[test]
        fn category_requires_name() {
            assert!(Category::new("local", "Languages").is_ok());
            let msg = validation_message(Category::new("local", ""));
            assert_eq!(msg, "category name must not be empty");
        }

        #[test]
        fn box_requires_name() {
            assert!(StudyBox::new("local", "Box A").is_ok());
            let msg = validation_message(StudyBox::new("local", " "));
            assert_eq!(msg, "box name must not be empty");
        }
    }

    mod item_tests {
        use super::*;

        fn date() -> NaiveDate {
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        }

        fn item() -> Item {
            Item {
                id: Uuid::new_v4(),
                user_id: "local".to_string(),
                category_id: None,
                box_id: None,
                pattern_id: None,
                name: "Kanji N5".to_string(),
                detail: String::new(),
                learned_date: date(),
                is_finished: false,
                edited_at: String::new(),
            }
        }

        #[test]
        fn new_item_defaults() {
            let n = NewItem::new(" Kanji ", date()).unwrap();
            assert_eq!(n.name, "Kanji");
            assert!(n.pattern_id.is_none());
            assert_eq!(n.policy, OverduePolicy::KeepIncomplete);
        }

        #[test]
        fn new_item_rejects_blank_name() {
            let msg = validation_message(NewItem::new("", date()));
            assert_eq!(msg, "item name must not be empty");
        }

        #[test]
        fn update_from_item_has_no_changes() {
            let i = item();
            let u = ItemUpdate::from_item(&i);
            assert!(!u.changes(&i));
        }

        #[test]
        fn update_detects_each_field() {
            let i = item();

            let mut u = ItemUpdate::from_item(&i);
            u.detail = "radicals".to_string();
            assert!(u.changes(&i));

            let mut u = ItemUpdate::from_item(&i);
            u.pattern_id = Some(Uuid::new_v4());
            assert!(u.changes(&i));

            let mut u = ItemUpdate::from_item(&i);
            u.learned_date = date().succ_opt().unwrap();
            assert!(u.changes(&i));
        }

        #[test]
        fn policy_is_not_a_change() {
            let i = item();
            let mut u = ItemUpdate::from_item(&i);
            u.policy = OverduePolicy::MarkCompleted;
            assert!(!u.changes(&i));
        }

        #[test]
        fn overview_status_label() {
            let mut o = ItemOverview {
                item: item(),
                completed_steps: 0,
                total_steps: 0,
                next_review: None,
            };
            assert_eq!(o.status_label(), "No pattern");
            o.total_steps = 3;
            assert_eq!(o.status_label(), "Active");
            o.item.is_finished = true;
            assert_eq!(o.status_label(), "Finished");
        }
    }

    mod overdue_policy_tests {
        use super::*;

        #[test]
        fn from_str_variants() {
            for v in ["mark_completed", "completed", "YES", "1", "true"] {
                assert_eq!(
                    OverduePolicy::from_str(v),
                    Some(OverduePolicy::MarkCompleted),
                    "{}",
                    v
                );
            }
            for v in ["keep_incomplete", "incomplete", "No", "0", "false"] {
                assert_eq!(
                    OverduePolicy::from_str(v),
                    Some(OverduePolicy::KeepIncomplete),
                    "{}",
                    v
                );
            }
            assert_eq!(OverduePolicy::from_str("maybe"), None);
        }

        #[test]
        fn as_str_round_trips() {
            for p in [OverduePolicy::MarkCompleted, OverduePolicy::KeepIncomplete] {
                assert_eq!(OverduePolicy::from_str(p.as_str()), Some(p));
            }
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn ok_with_string() {
            let output = JsonOutput::ok("test data");
            assert!(output.success);
            assert_eq!(output.data, Some("test data"));
            assert!(output.error.is_none());
        }

        #[test]
        fn err_with_string() {
            let output = JsonOutput::<()>::err("something went wrong");
            assert!(!output.success);
            assert!(output.data.is_none());
            assert_eq!(output.error, Some("something went wrong".to_string()));
        }

        #[test]
        fn serializes_dates_as_plain_days() {
            let step = PatternStep::new(1, 2).unwrap();
            let json = serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                "step": step,
                "date": NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            })))
            .unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"date\":\"2024-01-02\""));
            assert!(json.contains("\"interval_days\":2"));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}

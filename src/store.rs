//! Persistence contracts the engine calls through. `db::SqliteStore` is the
//! real implementation; anything else that satisfies these traits works too.

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Item, PatternStep, ReviewDate};

pub trait PatternStepReader {
    /// Steps sorted ascending by step number. Unknown patterns are an error.
    fn steps_for_pattern(&self, pattern_id: Uuid) -> Result<Vec<PatternStep>>;
}

pub trait ItemStore {
    fn get_item(&self, id: Uuid) -> Result<Option<Item>>;
    fn insert_item(&self, item: &Item) -> Result<()>;
    /// Writes every column and refreshes `edited_at`.
    fn update_item(&self, item: &Item) -> Result<()>;
    fn set_item_finished(&self, id: Uuid, finished: bool) -> Result<()>;
}

pub trait ReviewDateStore {
    fn insert_review_dates(&self, rows: &[ReviewDate]) -> Result<()>;
    /// Full-row update keyed by id.
    fn update_review_dates(&self, rows: &[ReviewDate]) -> Result<()>;
    fn delete_review_dates_for_item(&self, item_id: Uuid) -> Result<usize>;
    /// Sorted ascending by step number.
    fn review_dates_for_item(&self, item_id: Uuid) -> Result<Vec<ReviewDate>>;
    /// Sorted ascending by step number.
    fn review_date_ids_for_item(&self, item_id: Uuid) -> Result<Vec<Uuid>>;
    fn has_completed_review_date(&self, item_id: Uuid) -> Result<bool>;
    fn reclassify_review_dates(
        &self,
        item_id: Uuid,
        category_id: Option<Uuid>,
        box_id: Option<Uuid>,
    ) -> Result<()>;
}

/// Things an item can point at besides itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Pattern,
    Category,
    Box,
}

impl Reference {
    pub fn kind(self) -> &'static str {
        match self {
            Reference::Pattern => "pattern",
            Reference::Category => "category",
            Reference::Box => "box",
        }
    }
}

pub trait ReferenceReader {
    /// Owning user of the referenced row, `None` when it does not exist.
    fn reference_owner(&self, reference: Reference, id: Uuid) -> Result<Option<String>>;
}

pub trait Stores: PatternStepReader + ReferenceReader + ItemStore + ReviewDateStore {}

impl<T: PatternStepReader + ReferenceReader + ItemStore + ReviewDateStore> Stores for T {}

pub trait TransactionRunner {
    /// Runs `f` against transactional stores. Any error from `f` rolls back
    /// every write it made.
    fn run_in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Stores) -> Result<T>;
}

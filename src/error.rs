use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("item has a completed review date; this change would discard review progress")]
    HasCompletedReviewDate,

    #[error("got {ids} review date ids for {steps} pattern steps")]
    MismatchedIdsAndSteps { ids: usize, steps: usize },

    #[error("requested date {requested} is before the initial scheduled date {initial}")]
    NewDateBeforeInitial {
        requested: NaiveDate,
        initial: NaiveDate,
    },

    #[error("nothing to update")]
    NoDiff,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Errors the user caused by asking for something the engine refuses to do,
    /// as opposed to broken input or a failing store.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::HasCompletedReviewDate | Self::NewDateBeforeInitial { .. } | Self::NoDiff
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

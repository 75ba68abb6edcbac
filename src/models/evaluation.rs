//! Evaluation model: one like/dislike vote per user and Bude

use serde::{Deserialize, Serialize};

/// Vote submission; `id` is the Bude being evaluated
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationInput {
    pub id: String,
    pub like: bool,
}

/// The caller's own vote; `like` is `None` when they have not voted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnEvaluation {
    pub like: Option<bool>,
}

/// Vote tally for a Bude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub likes: i64,
    pub dislikes: i64,
    /// `None` for anonymous callers
    pub own: Option<OwnEvaluation>,
}

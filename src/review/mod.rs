pub mod result;
pub mod service;

pub use result::{AnalysisOutcome, ExplanationResult, Issue, ReviewApproach, ReviewOutcome, ReviewResult};
pub use service::CodeReviewService;

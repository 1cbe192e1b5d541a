pub mod formatters;

pub use formatters::{formatter_for, JsonFormatter, MarkdownFormatter, ReportFormatter};

use serde_json::{json, Map, Value};

use crate::infrastructure::error::ReviewError;
use crate::review::result::{AnalysisOutcome, ReviewApproach, ReviewOutcome};

/// 报告格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Json,
    Markdown,
}

/// 一次调用的输出：成功结果或失败信息
#[derive(Debug, Clone)]
pub enum Report {
    Review(ReviewOutcome),
    Analysis(AnalysisOutcome),
    Failure {
        approach: ReviewApproach,
        /// 自动分析时的用户指令
        instruction: Option<String>,
        error: ReviewError,
    },
}

impl Report {
    pub fn failure(approach: ReviewApproach, error: ReviewError) -> Self {
        Report::Failure {
            approach,
            instruction: None,
            error,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Report::Failure { .. })
    }

    /// 输出信封
    ///
    /// - 审查成功：`{"response", "approach", "parsing_required"}`
    /// - 自动分析成功：`{"response", "function_called", "parsing_required", "automatic_intent_detection"}`，
    ///   两个函数都被调用时 `response` 为 `{"review", "explanation"}`
    /// - 失败：`{"error", "raw_response"?, "automatic_intent_detection"?, "parsing_failed"?}`
    pub fn envelope(&self) -> Value {
        match self {
            Report::Review(outcome) => json!({
                "response": outcome.result,
                "approach": outcome.approach.as_str(),
                "parsing_required": outcome.parsing_required(),
            }),
            Report::Analysis(outcome) => {
                let response = match (&outcome.review, &outcome.explanation) {
                    (Some(review), None) => json!(review),
                    (None, Some(explanation)) => json!(explanation),
                    (review, explanation) => json!({
                        "review": review,
                        "explanation": explanation,
                    }),
                };
                json!({
                    "response": response,
                    "function_called": outcome.function_called,
                    "parsing_required": false,
                    "automatic_intent_detection": true,
                })
            }
            Report::Failure { approach, error, .. } => {
                let mut envelope = Map::new();
                envelope.insert("error".to_string(), json!(error.to_string()));
                if let Some(raw) = error.raw_response() {
                    envelope.insert("raw_response".to_string(), json!(raw));
                }
                if *approach == ReviewApproach::AutoIntent {
                    envelope.insert("automatic_intent_detection".to_string(), json!(true));
                }
                if error.is_parsing_failure() {
                    envelope.insert("parsing_failed".to_string(), json!(true));
                }
                Value::Object(envelope)
            }
        }
    }
}

impl From<ReviewOutcome> for Report {
    fn from(outcome: ReviewOutcome) -> Self {
        Report::Review(outcome)
    }
}

impl From<AnalysisOutcome> for Report {
    fn from(outcome: AnalysisOutcome) -> Self {
        Report::Analysis(outcome)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::ai::intent::AnalysisType;
    use crate::review::result::{
        AnalysisOutcome, Complexity, DocumentationIssue, ExplanationResult, Issue, ReviewApproach,
        ReviewOutcome, ReviewResult,
    };

    pub fn review() -> ReviewResult {
        ReviewResult {
            code_issues: vec![Issue {
                issue_type: "Logical error".to_string(),
                description: "Loop uses indices instead of iterating".to_string(),
                criticality_level: 2,
            }],
            security_vulnerability_issues: vec![],
            engineering_practices_issues: vec![Issue {
                issue_type: "Naming".to_string(),
                description: "Variable `i` is unclear".to_string(),
                criticality_level: 1,
            }],
            documentation_issues: vec![DocumentationIssue {
                issue_description: "Missing docstring".to_string(),
            }],
            review_score: 72.5,
            refactored_code: "def calculate_sum(numbers):\n    return sum(numbers)".to_string(),
            performance_optimization_issues: vec![],
            scalability_issues: vec![],
        }
    }

    pub fn explanation() -> ExplanationResult {
        ExplanationResult {
            purpose: "Sum a list of numbers".to_string(),
            components: vec!["calculate_sum".to_string()],
            algorithm: "Iterate and accumulate".to_string(),
            complexity: Complexity {
                time: "O(n)".to_string(),
                space: "O(1)".to_string(),
            },
            edge_cases: vec!["empty list".to_string()],
        }
    }

    pub fn review_outcome(approach: ReviewApproach) -> ReviewOutcome {
        ReviewOutcome {
            result: review(),
            approach,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            response_time_ms: 1200,
            reviewed_at: Utc::now(),
        }
    }

    pub fn analysis_outcome(review: bool, explanation: bool) -> AnalysisOutcome {
        let analysis_type = match (review, explanation) {
            (true, true) => AnalysisType::Both,
            (false, true) => AnalysisType::Explanation,
            _ => AnalysisType::Review,
        };
        AnalysisOutcome {
            review: review.then(self::review),
            explanation: explanation.then(self::explanation),
            function_called: match analysis_type {
                AnalysisType::Both => "both",
                AnalysisType::Explanation => "code_explanation",
                AnalysisType::Review => "code_review",
            }
            .to_string(),
            analysis_type,
            detected_intent: Some(analysis_type),
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            reviewed_at: Utc::now(),
        }
    }
}

//! 意图识别与多函数结果合并。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ai::functions::{
    code_explanation_function, code_review_function, FunctionDefinition, CODE_EXPLANATION_FUNCTION,
    CODE_REVIEW_FUNCTION,
};
use crate::ai::manager::FunctionCall;
use crate::ai::result_processor::{explanation_from_arguments, review_from_arguments};
use crate::infrastructure::error::ReviewError;
use crate::review::result::{ExplanationResult, ReviewResult};

pub const BOTH_LABEL: &str = "both";

/// 分析类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Review,
    Explanation,
    Both,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Review => "review",
            AnalysisType::Explanation => "explanation",
            AnalysisType::Both => BOTH_LABEL,
        }
    }

    /// 该分析类型对应的函数声明
    pub fn functions(&self) -> Vec<FunctionDefinition> {
        match self {
            AnalysisType::Review => vec![code_review_function()],
            AnalysisType::Explanation => vec![code_explanation_function()],
            AnalysisType::Both => vec![code_review_function(), code_explanation_function()],
        }
    }
}

static REVIEW_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(review\w*|audit\w*|critique|issues?|bugs?|problems?|errors?|flaws?|vulnerab\w*|secur\w*|refactor\w*|improv\w*|optimi[sz]\w*|lint\w*|score|rate|feedback|code smells?|best practices?|what'?s wrong)\b",
    )
    .expect("Failed to compile review keywords regex")
});

static EXPLAIN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(explain\w*|explanation|describe\w*|description|walk(?:\s+me)?\s+through|understand\w*|clarify|what\s+(?:does|is)|how\s+(?:does|do|is)|how\s+(?:it|this)\s+works?|works?\s+how|purpose|meaning|break\s+(?:it\s+)?down|teach)\b",
    )
    .expect("Failed to compile explanation keywords regex")
});

static BOTH_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(both|as\s+well\s+as|everything|full\s+analysis)\b")
        .expect("Failed to compile both keywords regex")
});

/// 根据用户指令识别意图
///
/// 同时命中审查与解释关键词时返回 `Both`；显式写了 "both" 之类的词且命中其一时也返回 `Both`；
/// 都没命中返回 `None`，此时两个函数都提供给模型，由模型决定。
pub fn detect_intent(instruction: &str) -> Option<AnalysisType> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return None;
    }

    let wants_review = REVIEW_KEYWORDS.is_match(instruction);
    let wants_explanation = EXPLAIN_KEYWORDS.is_match(instruction);
    let wants_both = BOTH_KEYWORDS.is_match(instruction);

    match (wants_review, wants_explanation) {
        (true, true) => Some(AnalysisType::Both),
        (true, false) if wants_both => Some(AnalysisType::Both),
        (false, true) if wants_both => Some(AnalysisType::Both),
        (true, false) => Some(AnalysisType::Review),
        (false, true) => Some(AnalysisType::Explanation),
        (false, false) if wants_both => Some(AnalysisType::Both),
        (false, false) => None,
    }
}

/// 提供给模型的函数：识别出意图时只提供对应的函数
pub fn functions_for_intent(intent: Option<AnalysisType>) -> Vec<FunctionDefinition> {
    intent.unwrap_or(AnalysisType::Both).functions()
}

/// 合并后的函数调用结果
#[derive(Debug, Clone)]
pub struct RoutedCalls {
    pub review: Option<ReviewResult>,
    pub explanation: Option<ExplanationResult>,
}

impl RoutedCalls {
    pub fn analysis_type(&self) -> AnalysisType {
        match (&self.review, &self.explanation) {
            (Some(_), Some(_)) => AnalysisType::Both,
            (None, Some(_)) => AnalysisType::Explanation,
            _ => AnalysisType::Review,
        }
    }

    /// `code_review`、`code_explanation` 或 `both`
    pub fn function_called(&self) -> &'static str {
        match self.analysis_type() {
            AnalysisType::Review => CODE_REVIEW_FUNCTION,
            AnalysisType::Explanation => CODE_EXPLANATION_FUNCTION,
            AnalysisType::Both => BOTH_LABEL,
        }
    }
}

/// 把模型返回的函数调用合并为一条结果
///
/// 每个函数名取第一次调用；未知函数名忽略；一个可识别的调用都没有时返回 `NoFunctionCall`。
/// 任一被采用的调用参数校验失败即整体返回该错误，不会退化为只返回另一个函数的结果。
pub fn route_function_calls(calls: &[FunctionCall]) -> Result<RoutedCalls, ReviewError> {
    let mut review = None;
    let mut explanation = None;

    for call in calls {
        match call.name.as_str() {
            CODE_REVIEW_FUNCTION => {
                if review.is_some() {
                    tracing::warn!("ignoring duplicate {} call", CODE_REVIEW_FUNCTION);
                    continue;
                }
                review = Some(review_from_arguments(call.arguments.clone())?);
            }
            CODE_EXPLANATION_FUNCTION => {
                if explanation.is_some() {
                    tracing::warn!("ignoring duplicate {} call", CODE_EXPLANATION_FUNCTION);
                    continue;
                }
                explanation = Some(explanation_from_arguments(call.arguments.clone())?);
            }
            other => tracing::warn!(function = other, "ignoring unknown function call"),
        }
    }

    if review.is_none() && explanation.is_none() {
        return Err(ReviewError::NoFunctionCall {
            message: "No valid analysis result found".to_string(),
            raw_response: None,
        });
    }

    Ok(RoutedCalls { review, explanation })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ai::intent::AnalysisType;
use crate::infrastructure::error::ReviewError;

/// 单个问题（代码、安全、工程实践、性能、可扩展性共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub issue_type: String,
    pub description: String,
    /// 0 (低) - 5 (高)
    #[serde(deserialize_with = "deserialize_criticality")]
    pub criticality_level: u8,
}

/// 接受 `3`、`3.0` 和 `"3"`，拒绝负数、小数和其他类型
fn deserialize_criticality<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&n) => Ok(n as u8),
        _ => Err(D::Error::custom(format!(
            "invalid criticalityLevel {value}, expected an integer between 0 and {MAX_CRITICALITY}"
        ))),
    }
}

/// 文档问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationIssue {
    pub issue_description: String,
}

/// 代码审查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub code_issues: Vec<Issue>,
    pub security_vulnerability_issues: Vec<Issue>,
    pub engineering_practices_issues: Vec<Issue>,
    pub documentation_issues: Vec<DocumentationIssue>,
    /// 百分制总分
    pub review_score: f64,
    pub refactored_code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performance_optimization_issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scalability_issues: Vec<Issue>,
}

pub const MAX_CRITICALITY: u8 = 5;
pub const MAX_REVIEW_SCORE: f64 = 100.0;

impl ReviewResult {
    /// 所有带严重程度的问题分类，按 wire 字段名
    pub fn issue_categories(&self) -> Vec<(&'static str, &[Issue])> {
        vec![
            ("codeIssues", self.code_issues.as_slice()),
            ("securityVulnerabilityIssues", self.security_vulnerability_issues.as_slice()),
            ("engineeringPracticesIssues", self.engineering_practices_issues.as_slice()),
            ("performanceOptimizationIssues", self.performance_optimization_issues.as_slice()),
            ("scalabilityIssues", self.scalability_issues.as_slice()),
        ]
    }

    pub fn total_issues(&self) -> usize {
        self.issue_categories()
            .iter()
            .map(|(_, issues)| issues.len())
            .sum::<usize>()
            + self.documentation_issues.len()
    }

    /// 最高的严重程度，没有问题时为 None
    pub fn max_criticality(&self) -> Option<u8> {
        self.issue_categories()
            .iter()
            .flat_map(|(_, issues)| issues.iter().map(|issue| issue.criticality_level))
            .max()
    }

    /// 取值范围校验
    pub fn validate(&self) -> Result<(), ReviewError> {
        if !self.review_score.is_finite() || !(0.0..=MAX_REVIEW_SCORE).contains(&self.review_score) {
            return Err(ReviewError::validation(
                format!("reviewScore must be between 0 and 100, got {}", self.review_score),
                Some("reviewScore".to_string()),
            ));
        }

        for (field, issues) in self.issue_categories() {
            if let Some((index, issue)) = issues
                .iter()
                .enumerate()
                .find(|(_, issue)| issue.criticality_level > MAX_CRITICALITY)
            {
                return Err(ReviewError::validation(
                    format!(
                        "criticalityLevel must be between 0 and {}, got {}",
                        MAX_CRITICALITY, issue.criticality_level
                    ),
                    Some(format!("{field}[{index}].criticalityLevel")),
                ));
            }
        }

        Ok(())
    }
}

/// 时间与空间复杂度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub space: String,
}

/// 代码解释结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationResult {
    pub purpose: String,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub edge_cases: Vec<String>,
}

impl ExplanationResult {
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.purpose.trim().is_empty() {
            return Err(ReviewError::validation(
                "purpose must not be empty",
                Some("purpose".to_string()),
            ));
        }
        Ok(())
    }
}

/// 三种调用方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewApproach {
    /// 提示词工程 + 手动 JSON 解析
    Prompt,
    /// schema 约束的函数调用
    FunctionCalling,
    /// 多函数调用 + 自动意图识别
    AutoIntent,
}

impl ReviewApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewApproach::Prompt => "prompt",
            ReviewApproach::FunctionCalling => "function_calling",
            ReviewApproach::AutoIntent => "auto_intent",
        }
    }

    /// 是否需要手动解析模型文本
    pub fn parsing_required(&self) -> bool {
        matches!(self, ReviewApproach::Prompt)
    }
}

/// 单次审查调用的结果
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub result: ReviewResult,
    pub approach: ReviewApproach,
    pub provider: String,
    pub model: String,
    pub response_time_ms: u64,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewOutcome {
    pub fn parsing_required(&self) -> bool {
        self.approach.parsing_required()
    }
}

/// 自动分析的合并结果
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub review: Option<ReviewResult>,
    pub explanation: Option<ExplanationResult>,
    /// `code_review`、`code_explanation` 或 `both`
    pub function_called: String,
    pub analysis_type: AnalysisType,
    /// 本地关键词识别出的意图，未识别时由模型决定
    pub detected_intent: Option<AnalysisType>,
    pub provider: String,
    pub model: String,
    pub reviewed_at: DateTime<Utc>,
}

use std::fmt::Write;

use super::{utils, ReportFormatter};
use crate::report::Report;
use crate::review::result::{
    AnalysisOutcome, ExplanationResult, Issue, ReviewOutcome, ReviewResult, MAX_REVIEW_SCORE,
};
use anyhow::Result;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Markdown 格式化器
#[derive(Debug, Default)]
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    /// 创建新的 Markdown 格式化器
    pub fn new() -> Self {
        Self
    }

    fn write_issue_table(&self, out: &mut String, title: &str, issues: &[Issue]) -> std::fmt::Result {
        writeln!(out, "### {} ({})\n", title, issues.len())?;
        if issues.is_empty() {
            writeln!(out, "_No issues found._\n")?;
            return Ok(());
        }

        writeln!(out, "| Severity | Type | Description |")?;
        writeln!(out, "|----------|------|-------------|")?;
        for issue in issues {
            writeln!(
                out,
                "| {} {} ({}) | {} | {} |",
                utils::criticality_to_emoji(issue.criticality_level),
                utils::criticality_label(issue.criticality_level),
                issue.criticality_level,
                utils::escape_cell(&issue.issue_type),
                utils::escape_cell(&issue.description)
            )?;
        }
        writeln!(out)
    }

    fn write_review(&self, out: &mut String, review: &ReviewResult) -> std::fmt::Result {
        let ratio = review.review_score / MAX_REVIEW_SCORE;
        writeln!(
            out,
            "**Review Score:** {:.1}/100 {}\n",
            review.review_score,
            utils::generate_progress_bar(ratio, 20)
        )?;
        writeln!(out, "**Total Issues:** {}", review.total_issues())?;
        if let Some(level) = review.max_criticality() {
            writeln!(
                out,
                "**Highest Severity:** {} {}",
                utils::criticality_to_emoji(level),
                utils::criticality_label(level)
            )?;
        }
        writeln!(out)?;

        self.write_issue_table(out, "Code Issues", &review.code_issues)?;
        self.write_issue_table(out, "Security Vulnerabilities", &review.security_vulnerability_issues)?;
        self.write_issue_table(out, "Engineering Practices", &review.engineering_practices_issues)?;
        if !review.performance_optimization_issues.is_empty() {
            self.write_issue_table(out, "Performance Optimization", &review.performance_optimization_issues)?;
        }
        if !review.scalability_issues.is_empty() {
            self.write_issue_table(out, "Scalability", &review.scalability_issues)?;
        }

        writeln!(out, "### Documentation ({})\n", review.documentation_issues.len())?;
        if review.documentation_issues.is_empty() {
            writeln!(out, "_No issues found._\n")?;
        } else {
            for issue in &review.documentation_issues {
                writeln!(out, "- {}", issue.issue_description)?;
            }
            writeln!(out)?;
        }

        if !review.refactored_code.trim().is_empty() {
            let code = review.refactored_code.trim_end();
            let fence = utils::code_fence(code);
            writeln!(out, "### Refactored Code\n")?;
            writeln!(out, "{fence}\n{code}\n{fence}\n")?;
        }
        Ok(())
    }

    fn write_explanation(&self, out: &mut String, explanation: &ExplanationResult) -> std::fmt::Result {
        writeln!(out, "**Purpose:** {}\n", explanation.purpose)?;

        if !explanation.components.is_empty() {
            writeln!(out, "### Components\n")?;
            for component in &explanation.components {
                writeln!(out, "- {component}")?;
            }
            writeln!(out)?;
        }

        if !explanation.algorithm.trim().is_empty() {
            writeln!(out, "### Algorithm\n\n{}\n", explanation.algorithm.trim())?;
        }

        let complexity = &explanation.complexity;
        if !complexity.time.is_empty() || !complexity.space.is_empty() {
            writeln!(out, "### Complexity\n")?;
            if !complexity.time.is_empty() {
                writeln!(out, "- Time: {}", complexity.time)?;
            }
            if !complexity.space.is_empty() {
                writeln!(out, "- Space: {}", complexity.space)?;
            }
            writeln!(out)?;
        }

        if !explanation.edge_cases.is_empty() {
            writeln!(out, "### Edge Cases\n")?;
            for case in &explanation.edge_cases {
                writeln!(out, "- {case}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn render_review(&self, outcome: &ReviewOutcome) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "# 📋 Code Review Report\n")?;
        writeln!(
            out,
            "- Approach: `{}`\n- Provider: {} ({})\n- Parsing required: {}\n- Response time: {} ms\n- Reviewed at: {}\n",
            outcome.approach.as_str(),
            outcome.provider,
            outcome.model,
            if outcome.parsing_required() { "yes" } else { "no" },
            outcome.response_time_ms,
            outcome.reviewed_at.format(TIMESTAMP_FORMAT)
        )?;
        self.write_review(&mut out, &outcome.result)?;
        Ok(out)
    }

    fn render_analysis(&self, outcome: &AnalysisOutcome) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "# 🔍 Code Analysis Report\n")?;
        writeln!(
            out,
            "- Function called: `{}`\n- Detected intent: {}\n- Provider: {} ({})\n- Reviewed at: {}\n",
            outcome.function_called,
            outcome
                .detected_intent
                .map(|intent| intent.as_str())
                .unwrap_or("decided by model"),
            outcome.provider,
            outcome.model,
            outcome.reviewed_at.format(TIMESTAMP_FORMAT)
        )?;

        if let Some(review) = &outcome.review {
            writeln!(out, "## Review\n")?;
            self.write_review(&mut out, review)?;
        }
        if let Some(explanation) = &outcome.explanation {
            writeln!(out, "## Explanation\n")?;
            self.write_explanation(&mut out, explanation)?;
        }
        Ok(out)
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &Report) -> Result<String> {
        match report {
            Report::Review(outcome) => self.render_review(outcome),
            Report::Analysis(outcome) => self.render_analysis(outcome),
            Report::Failure {
                approach,
                instruction,
                error,
            } => {
                let mut out = String::new();
                writeln!(out, "# ❌ Code Review Failed\n")?;
                writeln!(out, "- Approach: `{}`", approach.as_str())?;
                if let Some(instruction) = instruction {
                    writeln!(out, "- Instruction: {instruction}")?;
                }
                writeln!(out, "- Error: {error}")?;
                if error.is_parsing_failure() {
                    writeln!(out, "- Parsing failed: yes")?;
                }
                if let Some(raw) = error.raw_response() {
                    let raw = raw.trim_end();
                    let fence = utils::code_fence(raw);
                    writeln!(out, "\n## Raw Response\n\n{fence}\n{raw}\n{fence}")?;
                }
                Ok(out)
            }
        }
    }
}

use super::ReportFormatter;
use crate::report::Report;
use anyhow::Result;

/// JSON 格式化器，输出调用信封
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// 创建新的 JSON 格式化器
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// 单行输出
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> Result<String> {
        let envelope = report.envelope();

        // 序列化为 JSON
        let json_string = if self.pretty {
            serde_json::to_string_pretty(&envelope)?
        } else {
            serde_json::to_string(&envelope)?
        };

        Ok(json_string)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::error::ReviewError;
    use crate::report::test_support::*;
    use crate::review::result::ReviewApproach;

    #[test]
    fn test_json_formatting() {
        let report = Report::from(review_outcome(ReviewApproach::FunctionCalling));
        let output = JsonFormatter::new().format(&report).unwrap();

        assert!(output.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["approach"], "function_calling");
        assert_eq!(parsed["response"]["codeIssues"][0]["criticalityLevel"], 2);
    }

    #[test]
    fn test_compact_formatting() {
        let report = Report::from(analysis_outcome(true, true));
        let output = JsonFormatter::compact().format(&report).unwrap();

        assert!(!output.contains('\n'));
        assert!(output.contains("\"function_called\":\"both\""));
    }

    #[test]
    fn test_failure_formatting() {
        let report = Report::failure(
            ReviewApproach::Prompt,
            ReviewError::parsing("no JSON object found in model response", "Sorry, I can't help"),
        );
        let parsed: serde_json::Value =
            serde_json::from_str(&JsonFormatter::default().format(&report).unwrap()).unwrap();
        assert_eq!(parsed["raw_response"], "Sorry, I can't help");
        assert_eq!(parsed["parsing_failed"], true);
    }
}

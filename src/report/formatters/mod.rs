pub mod json;
pub mod markdown;

pub use json::JsonFormatter;
pub use markdown::MarkdownFormatter;

use anyhow::Result;

use crate::report::{Report, ReportFormat};

/// 报告格式化器 trait
pub trait ReportFormatter: Send + Sync {
    /// 格式化报告
    fn format(&self, report: &Report) -> Result<String>;
}

/// 按格式选择格式化器
pub fn formatter_for(format: ReportFormat) -> Box<dyn ReportFormatter> {
    match format {
        ReportFormat::Json => Box::new(JsonFormatter::new()),
        ReportFormat::Markdown => Box::new(MarkdownFormatter::new()),
    }
}

/// 格式化辅助函数
pub mod utils {
    /// 严重程度（0-5）对应的标签
    pub fn criticality_label(level: u8) -> &'static str {
        match level {
            5 => "Critical",
            4 => "High",
            3 => "Medium",
            1 | 2 => "Low",
            _ => "Info",
        }
    }

    /// 严重程度对应的表情符号
    pub fn criticality_to_emoji(level: u8) -> &'static str {
        match level {
            5 => "🔴",
            4 => "🟠",
            3 => "🟡",
            1 | 2 => "🔵",
            _ => "ℹ️",
        }
    }

    /// 生成进度条
    pub fn generate_progress_bar(value: f64, width: usize) -> String {
        let filled = ((value.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
        let empty = width - filled;
        format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
    }

    /// 比内容中最长的连续反引号多一个的代码围栏，至少三个
    pub fn code_fence(content: &str) -> String {
        let longest = content
            .split(|c| c != '`')
            .map(str::len)
            .max()
            .unwrap_or(0);
        "`".repeat((longest + 1).max(3))
    }

    /// 表格单元格中转义竖线并压平换行
    pub fn escape_cell(text: &str) -> String {
        text.replace('|', "\\|").replace(['\r', '\n'], " ")
    }
}

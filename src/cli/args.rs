use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::infrastructure::logging::LogFormat;
use crate::report::ReportFormat;
use crate::review::result::ReviewApproach;

/// 自动分析在未指定指令时依次运行的示例指令
pub const DEFAULT_INSTRUCTIONS: [&str; 3] = [
    "Please review this code for potential issues",
    "Can you explain how this code works?",
    "Give both a review and an explanation of this code",
];

/// 命令行选择的调用方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ApproachArg {
    /// 提示词 + 手动 JSON 解析
    #[default]
    Prompt,
    /// schema 约束的函数调用
    Function,
    /// 多函数调用 + 自动意图识别
    Auto,
}

impl From<ApproachArg> for ReviewApproach {
    fn from(arg: ApproachArg) -> Self {
        match arg {
            ApproachArg::Prompt => ReviewApproach::Prompt,
            ApproachArg::Function => ReviewApproach::FunctionCalling,
            ApproachArg::Auto => ReviewApproach::AutoIntent,
        }
    }
}

/// 日志格式参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "ai-review",
    version,
    about = "AI 代码审查工具 - 对比提示词解析、函数调用和自动意图识别三种方式",
    long_about = "ai-review 将一段代码发送给大模型进行审查或解释。支持三种方式：提示词 + 手动 JSON 解析、schema 约束的函数调用、多函数调用 + 自动意图识别。支持 Gemini、OpenAI、Azure OpenAI、DeepSeek 和 Ollama。"
)]
pub struct Args {
    /// 调用方式
    #[arg(short, long, value_enum, default_value_t = ApproachArg::Prompt)]
    pub approach: ApproachArg,

    /// 待审查的代码文件
    #[arg(short, long, default_value = "sample_code.txt")]
    pub file: String,

    /// 自动分析的用户指令（可重复；未指定时运行三条示例指令）
    #[arg(short, long = "instruction", value_name = "TEXT")]
    pub instructions: Vec<String>,

    /// AI provider to use (gemini, openai, azure, deepseek or ollama)
    #[arg(short = 'P', long, default_value = "")] // 空字符串表示未指定
    pub provider: String,

    /// Model to use (default: provider's default model)
    #[arg(short, long, default_value = "")] // 空字符串表示未指定
    pub model: String,

    /// 温度参数 (0-2)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// 输出格式
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    /// 日志格式
    #[arg(long = "log-format", value_enum, default_value_t = LogFormatArg::Compact)]
    pub log_format: LogFormatArg,

    /// 日志追加写入该文件而不是 stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, default_value_t = false)]
    pub debug: bool,

    /// 列出可用的 AI 提供商
    #[arg(long = "list-providers", default_value_t = false)]
    pub list_providers: bool,
}

impl Args {
    /// 自动分析要运行的指令
    pub fn effective_instructions(&self) -> Vec<String> {
        if self.instructions.is_empty() {
            DEFAULT_INSTRUCTIONS.iter().map(|s| s.to_string()).collect()
        } else {
            self.instructions.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["ai-review"]);
        assert_eq!(args.approach, ApproachArg::Prompt);
        assert_eq!(args.file, "sample_code.txt");
        assert!(args.provider.is_empty());
        assert_eq!(args.format, ReportFormat::Json);
        assert_eq!(args.temperature, None);
        assert_eq!(args.log_file, None);
        assert_eq!(args.effective_instructions().len(), 3);
    }

    #[test]
    fn test_auto_with_instructions() {
        let args = Args::parse_from([
            "ai-review",
            "--approach",
            "auto",
            "-i",
            "Explain this",
            "--instruction",
            "Find bugs",
            "-P",
            "ollama",
            "--format",
            "markdown",
            "--log-format",
            "json",
            "--log-file",
            "logs/review.log",
        ]);
        assert_eq!(ReviewApproach::from(args.approach), ReviewApproach::AutoIntent);
        assert_eq!(args.effective_instructions(), vec!["Explain this", "Find bugs"]);
        assert_eq!(args.provider, "ollama");
        assert_eq!(args.format, ReportFormat::Markdown);
        assert_eq!(LogFormat::from(args.log_format), LogFormat::Json);
        assert_eq!(args.log_file, Some(PathBuf::from("logs/review.log")));
    }

    #[test]
    fn test_function_approach_and_temperature() {
        let args = Args::parse_from(["ai-review", "-a", "function", "-t", "0.2", "-d"]);
        assert_eq!(ReviewApproach::from(args.approach), ReviewApproach::FunctionCalling);
        assert_eq!(args.temperature, Some(0.2));
        assert!(args.debug);
    }

    #[test]
    fn test_rejects_unknown_approach() {
        assert!(Args::try_parse_from(["ai-review", "--approach", "magic"]).is_err());
    }
}

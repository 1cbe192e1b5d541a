use std::io;
use std::path::PathBuf;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    pub include_file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            include_file_location: false,
        }
    }
}

impl LoggingConfig {
    /// 调试模式：DEBUG 级别并带文件位置
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_file_location: true,
            ..Self::default()
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读的格式
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式
    Json,
}

/// 日志输出目标
///
/// 默认写 stderr，stdout 只留给审查报告。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// 追加写入文件（`--log-file`）
    File(PathBuf),
}

impl LogOutput {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(LogOutput::Stderr, LogOutput::File)
    }
}

/// 设置日志系统
pub fn setup_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::from_default_env().add_directive(format!("ai_review={}", config.level).parse()?);

    let layer = match &config.output {
        LogOutput::Stderr => create_fmt_layer(&config, io::stderr, true),
        LogOutput::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            create_fmt_layer(&config, std::sync::Mutex::new(file), false)
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

fn create_fmt_layer<W>(
    config: &LoggingConfig,
    make_writer: W,
    ansi: bool,
) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let mut layer = fmt::layer()
        .with_writer(make_writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true);

    if config.include_file_location {
        layer = layer.with_file(true).with_line_number(true);
    }

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// 审查操作跟踪
///
/// 每次审查调用生成一个 operation id，开始、阶段和结束都带着它记录日志。
pub struct ReviewTracker {
    operation_id: String,
    operation: String,
    start_time: Instant,
}

impl ReviewTracker {
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        let operation_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            operation = %operation,
            operation_id = %operation_id,
            "review operation started"
        );

        Self {
            operation_id,
            operation,
            start_time: Instant::now(),
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn log_stage(&self, stage: &str) {
        tracing::debug!(
            operation = %self.operation,
            operation_id = %self.operation_id,
            stage,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "review stage"
        );
    }

    pub fn log_error(&self, stage: &str, error: &dyn std::error::Error) {
        tracing::error!(
            operation = %self.operation,
            operation_id = %self.operation_id,
            stage,
            error = %error,
            "review operation failed"
        );
    }

    pub fn complete(self, success: bool) {
        let duration_ms = self.start_time.elapsed().as_millis() as u64;
        if success {
            tracing::info!(
                operation = %self.operation,
                operation_id = %self.operation_id,
                duration_ms,
                "review operation completed"
            );
        } else {
            tracing::warn!(
                operation = %self.operation,
                operation_id = %self.operation_id,
                duration_ms,
                "review operation finished without a result"
            );
        }
    }
}

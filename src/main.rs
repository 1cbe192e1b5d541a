use ai_review::cli::args::Args;
use ai_review::cli::run_reviews;
use ai_review::config::providers::ProviderRegistry;
use ai_review::config::Config;
use ai_review::infrastructure::logging::{setup_logging, LogOutput, LoggingConfig};
use ai_review::report::{formatter_for, Report, ReportFormat};
use ai_review::review::result::ReviewApproach;
use ai_review::review::CodeReviewService;
use anyhow::Context;
use clap::Parser;

fn print_providers() {
    println!("可用的 AI 提供商:");
    for name in ProviderRegistry::list_providers() {
        if let Some(info) = ProviderRegistry::get_provider(name) {
            let key_hint = if info.requires_api_key {
                format!("需要 {}", info.api_key_env_var())
            } else {
                "无需 API Key".to_string()
            };
            println!(
                "  {:<10} {} (默认模型: {}, {})",
                info.name, info.display_name, info.default_model, key_hint
            );
        }
    }
    println!();
    println!("{}", ProviderRegistry::get_config_info());
}

fn print_reports(reports: &[Report], format: ReportFormat) -> anyhow::Result<()> {
    let formatter = formatter_for(format);
    let separator = match format {
        ReportFormat::Json => "\n",
        ReportFormat::Markdown => "\n---\n",
    };

    let mut rendered = Vec::with_capacity(reports.len());
    for report in reports {
        rendered.push(formatter.format(report)?);
    }
    println!("{}", rendered.join(separator));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logging = if args.debug {
        LoggingConfig::debug()
    } else {
        LoggingConfig::default()
    };
    logging.format = args.log_format.into();
    logging.output = LogOutput::from_path(args.log_file.clone());
    setup_logging(logging)?;

    if args.list_providers {
        print_providers();
        return Ok(());
    }

    let mut config = Config::new();
    config.update_from_args(&args);

    let approach = ReviewApproach::from(args.approach);
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read code file: {}", args.file))?;

    let service = match CodeReviewService::from_config(&config) {
        Ok(service) => service,
        Err(error) => {
            tracing::error!(error = %error, provider = %config.provider, "failed to initialize review service");
            print_reports(&[Report::failure(approach, error)], args.format)?;
            std::process::exit(1);
        }
    };

    if config.debug {
        tracing::debug!(
            provider = service.provider_name(),
            model = %config.effective_model(),
            approach = approach.as_str(),
            "review service ready"
        );
    }

    let reports = run_reviews(&service, approach, &code, &args.effective_instructions()).await;
    print_reports(&reports, args.format)?;

    if reports.iter().any(Report::is_failure) {
        std::process::exit(1);
    }
    Ok(())
}

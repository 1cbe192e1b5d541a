pub mod args;

use crate::report::Report;
use crate::review::result::ReviewApproach;
use crate::review::CodeReviewService;

/// 按选定方式运行审查，每次调用生成一份报告
///
/// 自动分析对每条指令各调用一次；单次失败不会中断后续指令。
pub async fn run_reviews(
    service: &CodeReviewService,
    approach: ReviewApproach,
    code: &str,
    instructions: &[String],
) -> Vec<Report> {
    match approach {
        ReviewApproach::AutoIntent => {
            let mut reports = Vec::with_capacity(instructions.len());
            for instruction in instructions {
                tracing::info!(instruction = %instruction, "running automatic analysis");
                let report = match service.analyze_auto(code, instruction).await {
                    Ok(outcome) => Report::from(outcome),
                    Err(error) => Report::Failure {
                        approach,
                        instruction: Some(instruction.clone()),
                        error,
                    },
                };
                reports.push(report);
            }
            reports
        }
        _ => {
            tracing::info!(approach = approach.as_str(), "running code review");
            let report = match service.review(approach, code).await {
                Ok(outcome) => Report::from(outcome),
                Err(error) => Report::failure(approach, error),
            };
            vec![report]
        }
    }
}

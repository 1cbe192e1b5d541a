use std::sync::Arc;

use chrono::Utc;

use crate::ai::functions::{code_review_function, CODE_REVIEW_FUNCTION};
use crate::ai::intent::{detect_intent, functions_for_intent, route_function_calls};
use crate::ai::manager::{AIProvider, AIRequest, AIResponse};
use crate::ai::prompt::{
    auto_analysis_prompt, function_review_prompt, review_prompt, AUTO_SYSTEM_PROMPT, REVIEW_SYSTEM_PROMPT,
};
use crate::ai::providers::create_provider;
use crate::ai::result_processor::{parse_review_text, review_from_arguments};
use crate::config::Config;
use crate::infrastructure::error::ReviewError;
use crate::infrastructure::logging::ReviewTracker;
use crate::review::result::{AnalysisOutcome, ReviewApproach, ReviewOutcome};

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// 代码审查服务：三种调用方式共用一个提供商
///
/// 每次调用只发一个请求，不重试；所有错误原样返回给调用方。
pub struct CodeReviewService {
    provider: Arc<dyn AIProvider>,
    model: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl CodeReviewService {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self {
            provider,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    /// 校验配置并创建对应的提供商
    pub fn from_config(config: &Config) -> Result<Self, ReviewError> {
        config.validate()?;
        let provider = create_provider(config)?;
        let model = config.effective_model();

        Ok(Self::new(provider)
            .with_model((!model.is_empty()).then_some(model))
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens))
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn ensure_code(code: &str) -> Result<(), ReviewError> {
        if code.trim().is_empty() {
            return Err(ReviewError::validation(
                "code to review must not be empty",
                Some("code".to_string()),
            ));
        }
        Ok(())
    }

    fn prepare(&self, request: AIRequest) -> AIRequest {
        let request = request
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    async fn send(&self, tracker: &ReviewTracker, request: AIRequest) -> Result<AIResponse, ReviewError> {
        tracker.log_stage("request");
        let response = self.provider.chat(&self.prepare(request)).await?;

        tracing::debug!(
            operation_id = tracker.operation_id(),
            provider = %response.provider,
            model = %response.model,
            response_time_ms = response.response_time_ms,
            function_calls = response.function_calls.len(),
            "received model response"
        );
        Ok(response)
    }

    fn finish<T>(tracker: ReviewTracker, stage: &str, result: Result<T, ReviewError>) -> Result<T, ReviewError> {
        if let Err(e) = &result {
            tracker.log_error(stage, e);
        }
        tracker.complete(result.is_ok());
        result
    }

    /// 提示词方式：模型返回自由文本，手动提取 JSON
    pub async fn review_with_prompt(&self, code: &str) -> Result<ReviewOutcome, ReviewError> {
        Self::ensure_code(code)?;
        let tracker = ReviewTracker::new("review_with_prompt");

        let request = AIRequest::prompt_review(REVIEW_SYSTEM_PROMPT, review_prompt(code));
        let response = match self.send(&tracker, request).await {
            Ok(response) => response,
            Err(e) => return Self::finish(tracker, "request", Err(e)),
        };

        tracker.log_stage("parse");
        let result = match response.text() {
            Some(text) => parse_review_text(text),
            None => Err(ReviewError::parsing(
                "Invalid response format",
                response.content.clone().unwrap_or_default(),
            )),
        };

        Self::finish(tracker, "parse", result).map(|result| ReviewOutcome {
            result,
            approach: ReviewApproach::Prompt,
            provider: response.provider,
            model: response.model,
            response_time_ms: response.response_time_ms,
            reviewed_at: Utc::now(),
        })
    }

    /// 函数调用方式：强制调用 `code_review`，参数按 schema 校验
    pub async fn review_with_function(&self, code: &str) -> Result<ReviewOutcome, ReviewError> {
        Self::ensure_code(code)?;
        let tracker = ReviewTracker::new("review_with_function");

        let request = AIRequest::function_review(REVIEW_SYSTEM_PROMPT, function_review_prompt(code), code_review_function());
        let response = match self.send(&tracker, request).await {
            Ok(response) => response,
            Err(e) => return Self::finish(tracker, "request", Err(e)),
        };

        tracker.log_stage("validate");
        let result = match response.function_call(CODE_REVIEW_FUNCTION) {
            Some(call) => review_from_arguments(call.arguments.clone()),
            None => Err(ReviewError::NoFunctionCall {
                message: "No valid review result found".to_string(),
                raw_response: response.text().map(str::to_string),
            }),
        };

        Self::finish(tracker, "validate", result).map(|result| ReviewOutcome {
            result,
            approach: ReviewApproach::FunctionCalling,
            provider: response.provider,
            model: response.model,
            response_time_ms: response.response_time_ms,
            reviewed_at: Utc::now(),
        })
    }

    /// 自动分析：按指令识别意图，合并模型的函数调用
    pub async fn analyze_auto(&self, code: &str, instruction: &str) -> Result<AnalysisOutcome, ReviewError> {
        Self::ensure_code(code)?;
        let tracker = ReviewTracker::new("analyze_auto");

        let detected_intent = detect_intent(instruction);
        tracing::info!(
            operation_id = tracker.operation_id(),
            instruction,
            intent = detected_intent.map(|i| i.as_str()).unwrap_or("undetermined"),
            "detected analysis intent"
        );

        let request = AIRequest::auto_analysis(
            AUTO_SYSTEM_PROMPT,
            auto_analysis_prompt(code, instruction),
            functions_for_intent(detected_intent),
        );
        let response = match self.send(&tracker, request).await {
            Ok(response) => response,
            Err(e) => return Self::finish(tracker, "request", Err(e)),
        };

        tracker.log_stage("route");
        let result = route_function_calls(&response.function_calls).map_err(|e| match response.text() {
            Some(text) => e.with_raw_response(text),
            None => e,
        });

        Self::finish(tracker, "route", result).map(|routed| AnalysisOutcome {
            function_called: routed.function_called().to_string(),
            analysis_type: routed.analysis_type(),
            review: routed.review,
            explanation: routed.explanation,
            detected_intent,
            provider: response.provider,
            model: response.model,
            reviewed_at: Utc::now(),
        })
    }

    /// 按方式执行审查
    pub async fn review(&self, approach: ReviewApproach, code: &str) -> Result<ReviewOutcome, ReviewError> {
        match approach {
            ReviewApproach::Prompt => self.review_with_prompt(code).await,
            ReviewApproach::FunctionCalling => self.review_with_function(code).await,
            ReviewApproach::AutoIntent => Err(ReviewError::validation(
                "the auto approach needs an instruction, use analyze_auto",
                Some("approach".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::intent::AnalysisType;
    use crate::ai::manager::{FunctionCall, FunctionChoice};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// 返回固定响应并记录收到的请求
    struct StubProvider {
        response: Result<AIResponse, ReviewError>,
        requests: Mutex<Vec<AIRequest>>,
    }

    impl StubProvider {
        fn replying(response: AIResponse) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(response),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: ReviewError) -> Arc<Self> {
            Arc::new(Self {
                response: Err(error),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> AIRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AIProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn chat(&self, request: &AIRequest) -> Result<AIResponse, ReviewError> {
            self.requests.lock().unwrap().push(request.clone());
            self.response.clone()
        }

        fn is_available(&self) -> bool {
            true
        }

        fn supported_models(&self) -> Vec<String> {
            vec!["stub-model".to_string()]
        }
    }

    fn review_arguments() -> serde_json::Value {
        json!({
            "codeIssues": [{"issueType": "Logical error", "description": "Index loop", "criticalityLevel": 2}],
            "securityVulnerabilityIssues": [],
            "engineeringPracticesIssues": [],
            "documentationIssues": [{"issueDescription": "Missing docstring"}],
            "reviewScore": 80,
            "refactoredCode": "def calculate_sum(numbers):\n    return sum(numbers)"
        })
    }

    fn text_response(text: &str) -> AIResponse {
        AIResponse {
            content: Some(text.to_string()),
            model: "stub-model".to_string(),
            provider: "stub".to_string(),
            ..Default::default()
        }
    }

    fn calls_response(calls: Vec<FunctionCall>) -> AIResponse {
        AIResponse {
            function_calls: calls,
            model: "stub-model".to_string(),
            provider: "stub".to_string(),
            ..Default::default()
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            arguments,
        }
    }

    const CODE: &str = "def calculate_sum(numbers):\n    total = 0\n    return total";

    #[tokio::test]
    async fn test_review_with_prompt_parses_fenced_json() {
        let text = format!("Here is the review:\n```json\n{}\n```", review_arguments());
        let provider = StubProvider::replying(text_response(&text));
        let service = CodeReviewService::new(provider.clone()).with_model(Some("m".to_string()));

        let outcome = service.review_with_prompt(CODE).await.unwrap();
        assert_eq!(outcome.approach, ReviewApproach::Prompt);
        assert!(outcome.parsing_required());
        assert_eq!(outcome.result.review_score, 80.0);

        let request = provider.last_request();
        assert!(request.functions.is_empty());
        assert_eq!(request.model.as_deref(), Some("m"));
        assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
        assert!(request.messages[1].content.contains("total = 0"));
    }

    #[tokio::test]
    async fn test_review_with_prompt_empty_content() {
        let provider = StubProvider::replying(text_response("   "));
        let service = CodeReviewService::new(provider);

        let err = service.review_with_prompt(CODE).await.unwrap_err();
        assert!(matches!(err, ReviewError::Parsing { ref message, .. } if message == "Invalid response format"));
    }

    #[tokio::test]
    async fn test_review_with_prompt_missing_fields_keeps_raw() {
        let provider = StubProvider::replying(text_response(r#"{"codeIssues": [], "reviewScore": 50}"#));
        let service = CodeReviewService::new(provider);

        let err = service.review_with_prompt(CODE).await.unwrap_err();
        match &err {
            ReviewError::MissingFields { fields, .. } => {
                assert!(fields.contains(&"refactoredCode".to_string()));
                assert!(!fields.contains(&"codeIssues".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.raw_response().unwrap().contains("reviewScore"));
    }

    #[tokio::test]
    async fn test_review_with_function() {
        let provider = StubProvider::replying(calls_response(vec![call("code_review", review_arguments())]));
        let service = CodeReviewService::new(provider.clone()).with_temperature(0.1);

        let outcome = service.review_with_function(CODE).await.unwrap();
        assert_eq!(outcome.approach, ReviewApproach::FunctionCalling);
        assert!(!outcome.parsing_required());
        assert_eq!(outcome.result.code_issues[0].criticality_level, 2);

        let request = provider.last_request();
        assert_eq!(request.function_names(), vec!["code_review"]);
        assert_eq!(request.function_choice, FunctionChoice::Required);
        assert_eq!(request.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_review_with_function_without_call() {
        let provider = StubProvider::replying(text_response("I cannot call functions"));
        let service = CodeReviewService::new(provider);

        let err = service.review_with_function(CODE).await.unwrap_err();
        assert!(matches!(err, ReviewError::NoFunctionCall { .. }));
        assert_eq!(err.raw_response(), Some("I cannot call functions"));
    }

    #[tokio::test]
    async fn test_review_with_function_rejects_extra_fields() {
        let mut arguments = review_arguments();
        arguments["mood"] = json!("grumpy");
        let provider = StubProvider::replying(calls_response(vec![call("code_review", arguments)]));
        let service = CodeReviewService::new(provider);

        let err = service.review_with_function(CODE).await.unwrap_err();
        assert!(matches!(err, ReviewError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn test_analyze_auto_review_intent() {
        let provider = StubProvider::replying(calls_response(vec![call("code_review", review_arguments())]));
        let service = CodeReviewService::new(provider.clone());

        let outcome = service
            .analyze_auto(CODE, "Please review this code for potential issues")
            .await
            .unwrap();
        assert_eq!(outcome.detected_intent, Some(AnalysisType::Review));
        assert_eq!(outcome.function_called, "code_review");
        assert!(outcome.explanation.is_none());
        assert_eq!(provider.last_request().function_names(), vec!["code_review"]);
    }

    #[tokio::test]
    async fn test_analyze_auto_merges_both() {
        let provider = StubProvider::replying(calls_response(vec![
            call("code_review", review_arguments()),
            call("code_explanation", json!({"purpose": "Sums numbers", "edgeCases": ["empty list"]})),
        ]));
        let service = CodeReviewService::new(provider.clone());

        let outcome = service
            .analyze_auto(CODE, "Give both a review and an explanation of this code")
            .await
            .unwrap();
        assert_eq!(outcome.analysis_type, AnalysisType::Both);
        assert_eq!(outcome.function_called, "both");
        assert_eq!(outcome.explanation.unwrap().edge_cases, vec!["empty list"]);
        assert_eq!(
            provider.last_request().function_names(),
            vec!["code_review", "code_explanation"]
        );
    }

    #[tokio::test]
    async fn test_analyze_auto_without_calls() {
        let provider = StubProvider::replying(text_response("The code sums numbers."));
        let service = CodeReviewService::new(provider);

        let err = service.analyze_auto(CODE, "hello").await.unwrap_err();
        assert!(matches!(err, ReviewError::NoFunctionCall { .. }));
        assert_eq!(err.raw_response(), Some("The code sums numbers."));
    }

    #[tokio::test]
    async fn test_empty_code_skips_request() {
        let provider = StubProvider::replying(text_response("{}"));
        let service = CodeReviewService::new(provider.clone());

        for result in [
            service.review_with_prompt("  ").await.map(|_| ()),
            service.review_with_function("").await.map(|_| ()),
            service.analyze_auto("\n", "review").await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(ReviewError::Validation { .. })));
        }
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let provider = StubProvider::failing(ReviewError::ai_service("stub", "rate limited", Some(429)));
        let service = CodeReviewService::new(provider.clone());

        let err = service.review(ReviewApproach::Prompt, CODE).await.unwrap_err();
        assert!(err.is_retryable());
        // 不重试
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_review_rejects_auto_approach() {
        let service = CodeReviewService::new(StubProvider::replying(text_response("{}")));
        assert!(service.review(ReviewApproach::AutoIntent, CODE).await.is_err());
    }
}

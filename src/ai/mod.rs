pub(crate) mod api_error;
pub mod functions;
pub mod intent;
pub mod manager;
pub mod prompt;
pub mod providers;
pub mod result_processor;

pub use functions::{code_explanation_function, code_review_function, FunctionDefinition};
pub use intent::{detect_intent, AnalysisType};
pub use manager::{AIProvider, AIRequest, AIResponse, ChatMessage, FunctionCall, FunctionChoice, TokenUsage};
pub use providers::create_provider;

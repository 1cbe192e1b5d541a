use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

/// OpenAI、Azure、Gemini 和 Ollama 的错误结构都能落到这里
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        status: Option<String>,
        code: Option<Value>,
    },
    Plain(String),
}

fn code_to_string(code: &Value) -> Option<String> {
    match code {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 从错误响应体中提取可读的错误信息，无法识别时原样返回
pub(crate) fn extract_api_error(body: &str) -> String {
    let Ok(ErrorEnvelope { error: Some(error) }) = serde_json::from_str::<ErrorEnvelope>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            "empty error response".to_string()
        } else {
            trimmed.to_string()
        };
    };

    match error {
        ErrorBody::Plain(message) => message,
        ErrorBody::Detailed {
            message,
            kind,
            status,
            code,
        } => {
            let message = message.unwrap_or_else(|| "unknown error".to_string());
            let mut details = Vec::new();
            if let Some(kind) = kind {
                details.push(format!("type={kind}"));
            }
            if let Some(status) = status {
                details.push(format!("status={status}"));
            }
            if let Some(code) = code.as_ref().and_then(code_to_string) {
                details.push(format!("code={code}"));
            }
            if details.is_empty() {
                message
            } else {
                format!("{} ({})", message, details.join(", "))
            }
        }
    }
}

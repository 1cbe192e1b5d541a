//! 模型输出的提取与校验。
//!
//! 提示词方式下，模型返回的是夹杂说明文字、可能带 Markdown 代码块的文本，
//! 需要从中找出 JSON 对象；函数调用方式下，参数已经是结构化的，
//! 但仍然要按声明的 schema 检查缺失字段、多余字段和类型。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ai::functions::{code_explanation_function, code_review_function, FunctionDefinition};
use crate::infrastructure::error::ReviewError;
use crate::review::result::{ExplanationResult, ReviewResult};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```$")
        .expect("Failed to compile code fence regex")
});

/// 去掉包裹整段文本的 Markdown 代码块标记
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match CODE_FENCE.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// 找出文本中所有括号平衡的 `{...}` 片段
///
/// 只在对象内部跟踪字符串与转义，避免正文里的引号打乱状态。
pub fn extract_json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('{') {
        let begin = pos + offset;
        match balanced_object_end(text, begin) {
            Some(end) => {
                candidates.push(&text[begin..=end]);
                pos = end + 1;
            }
            // 未闭合的 `{` 可能只是正文里的字符，从下一个 `{` 重新扫描
            None => pos = begin + 1,
        }
    }

    candidates
}

/// 从 `begin` 处的 `{` 开始，返回与之配对的 `}` 的位置
fn balanced_object_end(text: &str, begin: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[begin..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(begin + idx);
                }
            }
            _ => {}
        }
    }

    None
}

/// 去掉 `}` 或 `]` 之前多余的逗号（字符串内部不动）
pub fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// 从模型的自由文本中提取第一个可解析的 JSON 对象
pub fn extract_json_object(raw: &str) -> Result<Value, ReviewError> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(ReviewError::parsing("model response is empty", raw));
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let candidates = extract_json_candidates(text);
    if candidates.is_empty() {
        let message = if text.contains('{') {
            "unterminated JSON object in model response"
        } else {
            "no JSON object found in model response"
        };
        return Err(ReviewError::parsing(message, raw));
    }

    let mut first_error = None;
    for candidate in &candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => {
                let repaired = remove_trailing_commas(candidate);
                if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                    tracing::debug!("repaired trailing commas in model JSON");
                    return Ok(value);
                }
                first_error.get_or_insert(e);
            }
        }
    }

    let detail = first_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    Err(ReviewError::parsing(
        format!("Error decoding JSON response: {detail}"),
        raw,
    ))
}

/// 解码以字符串形式返回的函数参数（OpenAI 的 `arguments`）
pub fn decode_arguments(function: &str, arguments: &str) -> Result<Value, ReviewError> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(trimmed).map_err(|e| {
        ReviewError::parsing(
            format!("failed to parse {function} arguments: {e}"),
            arguments,
        )
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_json_type(expected: &str, value: &Value) -> bool {
    match expected {
        "array" => value.is_array(),
        "object" => value.is_object(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.as_f64().map_or(false, |n| n.fract() == 0.0),
        "boolean" => value.is_boolean(),
        _ => true,
    }
}

/// 缺失（或为 null）的必需字段，按 schema 声明顺序
fn missing_required_fields(definition: &FunctionDefinition, object: &serde_json::Map<String, Value>) -> Vec<String> {
    definition
        .required_fields()
        .into_iter()
        .filter(|field| object.get(*field).map_or(true, Value::is_null))
        .map(str::to_string)
        .collect()
}

/// 类型不匹配的顶层字段：(字段名, 期望类型, 实际类型)
fn type_mismatches<'a>(
    definition: &'a FunctionDefinition,
    object: &serde_json::Map<String, Value>,
) -> Vec<(&'a str, &'a str, &'static str)> {
    let Some(properties) = definition.properties() else {
        return Vec::new();
    };
    properties
        .iter()
        .filter_map(|(name, schema)| {
            let expected = schema.get("type").and_then(Value::as_str)?;
            let value = object.get(name).filter(|v| !v.is_null())?;
            (!matches_json_type(expected, value)).then(|| (name.as_str(), expected, json_type_name(value)))
        })
        .collect()
}

/// 去掉值为 null 的可选字段，交给 serde 默认值处理
fn drop_null_fields(mut value: Value) -> Value {
    if let Value::Object(object) = &mut value {
        object.retain(|_, v| !v.is_null());
    }
    value
}

/// 按函数声明的 schema 校验结构化参数
///
/// 缺失必需字段返回 `MissingFields`；未声明的字段、错误的顶层类型或非对象参数返回 `SchemaMismatch`。
pub fn validate_function_arguments(definition: &FunctionDefinition, arguments: &Value) -> Result<(), ReviewError> {
    let Some(object) = arguments.as_object() else {
        return Err(ReviewError::schema_mismatch(
            &definition.name,
            format!("arguments must be a JSON object, got {}", json_type_name(arguments)),
        ));
    };

    let missing = missing_required_fields(definition, object);
    if !missing.is_empty() {
        return Err(ReviewError::MissingFields {
            fields: missing,
            raw_response: None,
        });
    }

    if let Some(properties) = definition.properties() {
        let mut unexpected: Vec<&str> = object
            .keys()
            .filter(|key| !properties.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort_unstable();
            return Err(ReviewError::schema_mismatch(
                &definition.name,
                format!("unexpected fields: {}", unexpected.join(", ")),
            ));
        }
    }

    if let Some((field, expected, actual)) = type_mismatches(definition, object).into_iter().next() {
        return Err(ReviewError::schema_mismatch(
            &definition.name,
            format!("field {field} expected {expected}, got {actual}"),
        ));
    }

    Ok(())
}

fn typed_from_arguments<T: DeserializeOwned>(definition: &FunctionDefinition, arguments: Value) -> Result<T, ReviewError> {
    validate_function_arguments(definition, &arguments)?;
    serde_json::from_value(drop_null_fields(arguments))
        .map_err(|e| ReviewError::schema_mismatch(&definition.name, e.to_string()))
}

/// 函数调用方式：由 `code_review` 的参数得到审查结果
pub fn review_from_arguments(arguments: Value) -> Result<ReviewResult, ReviewError> {
    let result: ReviewResult = typed_from_arguments(&code_review_function(), arguments)?;
    result.validate()?;
    Ok(result)
}

/// 函数调用方式：由 `code_explanation` 的参数得到解释结果
pub fn explanation_from_arguments(arguments: Value) -> Result<ExplanationResult, ReviewError> {
    let result: ExplanationResult = typed_from_arguments(&code_explanation_function(), arguments)?;
    result.validate()?;
    Ok(result)
}

/// 提示词方式：从模型的自由文本中解析审查结果
///
/// 容忍 JSON 前后的说明文字、代码块标记和多余字段；
/// 找不到 JSON 或 JSON 非法时返回 `Parsing`，缺少必需字段时返回 `MissingFields`。
pub fn parse_review_text(raw: &str) -> Result<ReviewResult, ReviewError> {
    let value = extract_json_object(raw)?;
    let definition = code_review_function();
    let Value::Object(object) = &value else {
        return Err(ReviewError::parsing("model response is not a JSON object", raw));
    };

    let missing = missing_required_fields(&definition, object);
    if !missing.is_empty() {
        return Err(ReviewError::MissingFields {
            fields: missing,
            raw_response: Some(raw.to_string()),
        });
    }

    if let Some((field, expected, actual)) = type_mismatches(&definition, object).into_iter().next() {
        return Err(ReviewError::validation(
            format!("field {field} expected {expected}, got {actual}"),
            Some(field.to_string()),
        ));
    }

    let result: ReviewResult = serde_json::from_value(drop_null_fields(value))
        .map_err(|e| ReviewError::validation(e.to_string(), None))?;
    result.validate()?;
    Ok(result)
}

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CODE_REVIEW_FUNCTION: &str = "code_review";
pub const CODE_EXPLANATION_FUNCTION: &str = "code_explanation";

/// 函数声明（JSON schema 形式的参数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionDefinition {
    /// schema 中声明的必需字段，保持声明顺序
    pub fn required_fields(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// schema 中声明的所有属性
    pub fn properties(&self) -> Option<&serde_json::Map<String, Value>> {
        self.parameters.get("properties").and_then(Value::as_object)
    }

    /// OpenAI / Ollama 的 `tools` 条目
    pub fn to_openai_tool(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }

    /// Gemini 的 `functionDeclarations` 条目
    pub fn to_gemini_declaration(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters
        })
    }
}

fn issue_list_schema(type_hint: &str, description_hint: &str, criticality_hint: &str) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "issueType": {
                    "type": "string",
                    "description": type_hint
                },
                "description": {
                    "type": "string",
                    "description": description_hint
                },
                "criticalityLevel": {
                    "type": "integer",
                    "description": criticality_hint
                }
            },
            "required": ["issueType", "description", "criticalityLevel"]
        }
    })
}

/// 代码审查函数
pub fn code_review_function() -> FunctionDefinition {
    FunctionDefinition {
        name: CODE_REVIEW_FUNCTION.to_string(),
        description: "Review code and provide detailed analysis".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "codeIssues": issue_list_schema(
                    "Type of the code issue (e.g., logic error, redundancy, performance bottleneck)",
                    "Detailed description of the issue",
                    "Criticality level of the issue (0 - low, 5 - high)"
                ),
                "securityVulnerabilityIssues": issue_list_schema(
                    "Type of security vulnerability (e.g., SQL injection, XSS, hardcoded credentials)",
                    "Description of the vulnerability",
                    "Criticality level (0-5)"
                ),
                "engineeringPracticesIssues": issue_list_schema(
                    "Type of engineering practice issue (e.g., naming conventions, meaningful function names)",
                    "Detailed description of the issue along with relevant code context",
                    "Criticality level (0 = low, 5 = high)"
                ),
                "documentationIssues": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "issueDescription": {
                                "type": "string",
                                "description": "Description of documentation issue (e.g., missing class-level comments, lack of function docstrings, unclear inline comments)"
                            }
                        },
                        "required": ["issueDescription"]
                    }
                },
                "reviewScore": {
                    "type": "number",
                    "description": "Overall code review score in percentage (0-100)"
                },
                "refactoredCode": {
                    "type": "string",
                    "description": "Refactored version of the input code with improvements applied"
                },
                "performanceOptimizationIssues": issue_list_schema(
                    "Type of performance issue (e.g., redundant loop, needless allocation)",
                    "Description of the optimization opportunity",
                    "Criticality level (0-5)"
                ),
                "scalabilityIssues": issue_list_schema(
                    "Type of scalability issue (e.g., unbounded memory growth, blocking I/O)",
                    "Description of the scalability concern",
                    "Criticality level (0-5)"
                )
            },
            "required": [
                "codeIssues",
                "securityVulnerabilityIssues",
                "engineeringPracticesIssues",
                "documentationIssues",
                "reviewScore",
                "refactoredCode"
            ]
        }),
    }
}

/// 代码解释函数
pub fn code_explanation_function() -> FunctionDefinition {
    FunctionDefinition {
        name: CODE_EXPLANATION_FUNCTION.to_string(),
        description: "Explain code in detail".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "purpose": {
                    "type": "string",
                    "description": "What the code is for"
                },
                "components": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Main functions, classes or blocks and their roles"
                },
                "algorithm": {
                    "type": "string",
                    "description": "Step by step description of how the code works"
                },
                "complexity": {
                    "type": "object",
                    "properties": {
                        "time": {"type": "string"},
                        "space": {"type": "string"}
                    }
                },
                "edgeCases": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Inputs or situations the code may not handle"
                }
            },
            "required": ["purpose"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_function_required_fields_in_order() {
        let function = code_review_function();
        assert_eq!(
            function.required_fields(),
            vec![
                "codeIssues",
                "securityVulnerabilityIssues",
                "engineeringPracticesIssues",
                "documentationIssues",
                "reviewScore",
                "refactoredCode"
            ]
        );
        let properties = function.properties().unwrap();
        assert_eq!(properties["reviewScore"]["type"], "number");
        assert!(properties.contains_key("scalabilityIssues"));
    }

    #[test]
    fn test_explanation_function_only_requires_purpose() {
        let function = code_explanation_function();
        assert_eq!(function.required_fields(), vec!["purpose"]);
        assert_eq!(function.properties().unwrap()["complexity"]["type"], "object");
    }

    #[test]
    fn test_openai_tool_shape() {
        let tool = code_review_function().to_openai_tool();
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["function"]["name"], CODE_REVIEW_FUNCTION);
        assert_eq!(tool["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_gemini_declaration_shape() {
        let declaration = code_explanation_function().to_gemini_declaration();
        assert_eq!(declaration["name"], CODE_EXPLANATION_FUNCTION);
        assert!(declaration.get("type").is_none());
    }
}

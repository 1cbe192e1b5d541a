use std::env;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::ai::functions::CODE_REVIEW_FUNCTION;

pub const PROMPT_PATH_ENV: &str = "AI_REVIEW_PROMPT_PATH";
const CODE_PLACEHOLDER: &str = "{{code}}";
const BUILTIN_REVIEW_TEMPLATE: &str = include_str!("../../prompts/review-prompt.txt");

pub const REVIEW_SYSTEM_PROMPT: &str = "You are an expert code reviewer.";
pub const AUTO_SYSTEM_PROMPT: &str =
    "You are an expert code reviewer and explainer. Use function calling based on user's intent.";

// 审查提示模板（仅加载一次）
static REVIEW_TEMPLATE: Lazy<String> = Lazy::new(|| load_review_template(env::var(PROMPT_PATH_ENV).ok()));

/// 加载审查提示模板，外部文件不可用时使用内置模板
fn load_review_template(custom_path: Option<String>) -> String {
    let Some(path) = custom_path.filter(|p| !p.trim().is_empty()) else {
        return BUILTIN_REVIEW_TEMPLATE.to_owned();
    };

    if !Path::new(&path).exists() {
        tracing::warn!(path = %path, "prompt template not found, using built-in template");
        return BUILTIN_REVIEW_TEMPLATE.to_owned();
    }

    match fs::read_to_string(&path) {
        Ok(content) if content.contains(CODE_PLACEHOLDER) => content,
        Ok(_) => {
            tracing::warn!(path = %path, "prompt template is missing the code placeholder, using built-in template");
            BUILTIN_REVIEW_TEMPLATE.to_owned()
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "failed to read prompt template, using built-in template");
            BUILTIN_REVIEW_TEMPLATE.to_owned()
        }
    }
}

/// 提示词方式：要求模型按 JSON 示例返回审查结果
pub fn review_prompt(code: &str) -> String {
    REVIEW_TEMPLATE.replace(CODE_PLACEHOLDER, code)
}

/// 函数调用方式：只允许通过 `code_review` 返回
pub fn function_review_prompt(code: &str) -> String {
    format!(
        "You are an expert code reviewer.\n\
         Analyze the following code and respond using the function '{CODE_REVIEW_FUNCTION}'.\n\
         Only use function calling to return your result. Do not include plain text.\n\
         Code to review:\n\n{code}"
    )
}

/// 自动分析：由用户请求决定审查、解释或两者都做
pub fn auto_analysis_prompt(code: &str, instruction: &str) -> String {
    format!(
        "You are an expert code reviewer and programmer.\n\n\
         User request: {instruction}\n\n\
         Code:\n{code}\n\n\
         Based on the user request, either:\n\
         - Review the code and return issues\n\
         - Explain the code in detail\n\
         - Or do both\n\
         Use only structured function calling to respond appropriately. \
         Response must follow JSON format using the defined functions."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_review_prompt_embeds_code_and_example() {
        let prompt = review_prompt("def add(a, b): return a + b");

        assert!(prompt.contains("def add(a, b): return a + b"));
        assert!(!prompt.contains(CODE_PLACEHOLDER));
        assert!(prompt.contains("\"refactoredCode\""));
        assert!(prompt.contains("return an empty array"));
    }

    #[test]
    fn test_function_prompt_names_function() {
        let prompt = function_review_prompt("x = 1");
        assert!(prompt.contains("'code_review'"));
        assert!(prompt.ends_with("x = 1"));
    }

    #[test]
    fn test_auto_prompt_embeds_instruction() {
        let prompt = auto_analysis_prompt("x = 1", "Explain this");
        assert!(prompt.contains("User request: Explain this"));
        assert!(prompt.contains("Code:\nx = 1"));
    }

    #[test]
    fn test_custom_template() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Review:\n{{{{code}}}}\nJSON only").unwrap();

        let template = load_review_template(Some(file.path().to_string_lossy().into_owned()));
        assert_eq!(template, "Review:\n{{code}}\nJSON only");
    }

    #[test]
    fn test_custom_template_fallbacks() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "no placeholder here").unwrap();

        let template = load_review_template(Some(file.path().to_string_lossy().into_owned()));
        assert_eq!(template, BUILTIN_REVIEW_TEMPLATE);

        let template = load_review_template(Some("/nonexistent/prompt.txt".to_string()));
        assert_eq!(template, BUILTIN_REVIEW_TEMPLATE);

        assert_eq!(load_review_template(None), BUILTIN_REVIEW_TEMPLATE);
    }
}

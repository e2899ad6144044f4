//! Prompt templates for Savor.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts and fixed phrases for grounded answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// System persona and answering rules.
    pub system: String,
    /// User message template with `{{context}}` and `{{question}}` slots.
    pub user: String,
    /// Context text used when retrieval returns nothing.
    pub no_context: String,
    /// The phrase the model must use when the context does not cover the question.
    pub ignorance_phrase: String,
    /// Assistant text shown when an answer could not be produced.
    pub apology: String,
    /// First assistant message of a chat session.
    pub greeting: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"你是一個餐廳的知識檢索助手，負責回答關於菜品與酒品的問題。
規則：
- 僅能根據使用者訊息中的 Context 回答問題，不可自行補充 Context 以外的資訊
- 如果問題與 Context 無關，或 Context 中沒有答案，請只回答："{{ignorance_phrase}}"
- Context 中標示為「無」或「未提供」的欄位代表店家沒有提供該資訊，請如實說明
- 回答請簡潔、口語化，適合直接朗讀給客人聽"#
                .to_string(),

            user: r#"Context: """
{{context}}
"""

User Question: """
{{question}}
""""#
                .to_string(),

            no_context: "No relevant context found.".to_string(),
            ignorance_phrase: "我不知道".to_string(),
            apology: "抱歉，發生了一點問題...".to_string(),
            greeting: "你好！我是你的 AI 助理，請問有關菜單的任何問題嗎？".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The system prompt with the ignorance phrase filled in.
    pub fn system_prompt(&self) -> String {
        let mut vars = HashMap::new();
        vars.insert(
            "ignorance_phrase".to_string(),
            self.rag.ignorance_phrase.clone(),
        );
        self.render_with_custom(&self.rag.system, &vars)
    }
}

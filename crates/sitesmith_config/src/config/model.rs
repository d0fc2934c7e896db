use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{merge_value, validate_http_url, Config, MergeError, ValidationError};

/// The default instruction sent as the first message of every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a web developer building a small static website together with the user.
Reply with short explanations and put every file you create or change in a block of the form

---<file name>---
<file content>
---<file name> end---

File names may only contain letters, digits, '.', '-', '_' and '/'.
Always keep a file called sitemap that lists every file of the website, one per line, as
- <file name>
Always send the complete content of a file, never a diff. The entry page is index.html.";

/// The directive used to compress the conversation once it no longer fits the context window.
pub const DEFAULT_SUMMARY_DIRECTIVE: &str = "Please summarize previous messages. Make sure to include latest user input and website outline. It should be enough info to rebuild website.";

fn default_api_url() -> Url {
    Url::parse("https://api.openai.com/v1/chat/completions").expect("valid default url")
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_summary_directive() -> String {
    DEFAULT_SUMMARY_DIRECTIVE.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ModelConfig {
    /// The chat completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// The model to request completions from.
    #[serde(default = "default_model")]
    pub model: String,

    /// The environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// The system instruction that describes the artifact format to the model.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// The directive that asks the model to summarize the conversation.
    #[serde(default = "default_summary_directive")]
    pub summary_directive: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            system_prompt: default_system_prompt(),
            summary_directive: default_summary_directive(),
        }
    }
}

impl ModelConfig {
    pub fn is_default(&self) -> bool {
        ModelConfig::default() == *self
    }
}

impl Config for ModelConfig {
    fn get_extension_name(&self) -> String {
        "model".to_string()
    }

    fn merge_config(self, other: &Self) -> Result<Self, MergeError> {
        let default = ModelConfig::default();
        Ok(Self {
            api_url: merge_value(self.api_url, &other.api_url, &default.api_url),
            model: merge_value(self.model, &other.model, &default.model),
            api_key_env: merge_value(self.api_key_env, &other.api_key_env, &default.api_key_env),
            system_prompt: merge_value(
                self.system_prompt,
                &other.system_prompt,
                &default.system_prompt,
            ),
            summary_directive: merge_value(
                self.summary_directive,
                &other.summary_directive,
                &default.summary_directive,
            ),
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_http_url("model.api-url", &self.api_url)?;
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField(
                "model.model".to_string(),
            ));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField(
                "model.api-key-env".to_string(),
            ));
        }
        if self.summary_directive.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField(
                "model.summary-directive".to_string(),
            ));
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        vec![
            "api-url".to_string(),
            "model".to_string(),
            "api-key-env".to_string(),
            "system-prompt".to_string(),
            "summary-directive".to_string(),
        ]
    }
}

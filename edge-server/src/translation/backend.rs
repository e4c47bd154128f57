//! Translation backend client.
//!
//! Speaks the OpenAI-compatible chat completions protocol. Two prompt styles
//! are supported: a general chat model steered by a system prompt and one
//! worked example, or a dedicated machine-translation model that takes the
//! raw text plus `translation_options`.

use crate::config::{BackendMode, TranslationConfig};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use edge_types::TextKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROMPT_PREAMBLE: &str = "You are an asistant of a Minecraft mod developer. You are asked to translate the mod description into different languages by locale code.";

const MARKDOWN_PROMPT: &str = "I'm going to give you markdown text. You should give me translated markdown text. Do not wrap extra markdown code block (```) to the output, and do not add locale prefix to output.";

const HTML_PROMPT: &str = "I'm going to give you html text. You should give me translated html text. Do not add locale prefix to output.";

const PLAIN_PROMPT: &str = "Please do not add locale prefix to output.";

const MACHINE_DOMAINS: &str = "The content is about Minecraft Mod/ResourcePack/Modpack/ShaderPack or other Minecraft related resources. Please keep the language style delightful for gamers.";

/// Longest error body kept in [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Something that can translate one chunk of text.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `chunk` into `locale`, preserving `kind` markup.
    async fn translate(&self, chunk: &str, locale: &str, kind: TextKind) -> BackendResult<String>;
}

/// Chat completions client.
pub struct ChatBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    mode: BackendMode,
}

impl std::fmt::Debug for ChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBackend")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl ChatBackend {
    /// Create a client with an explicit API key.
    pub fn new(config: &TranslationConfig, api_key: Option<String>) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.backend_url.clone(),
            model: config.model.clone(),
            api_key,
            mode: config.mode,
        })
    }

    /// Create a client reading the API key from `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MissingApiKey`] if the variable is unset or empty.
    pub fn from_config(config: &TranslationConfig) -> BackendResult<Self> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BackendError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, Some(key))
    }

    fn build_request<'a>(
        &'a self,
        chunk: &'a str,
        locale: &'a str,
        kind: TextKind,
    ) -> ChatRequest<'a> {
        match self.mode {
            BackendMode::Chat => ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage::new("system", system_prompt(kind)),
                    ChatMessage::new("user", instruction("zh-CN", "Hello World")),
                    ChatMessage::new("assistant", "你好世界".to_string()),
                    ChatMessage::new("user", instruction(locale, chunk)),
                ],
                translation_options: None,
            },
            BackendMode::Machine => ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage::new("user", chunk.to_string())],
                translation_options: Some(TranslationOptions {
                    source_lang: "auto",
                    target_lang: locale,
                    domains: MACHINE_DOMAINS,
                }),
            },
        }
    }
}

#[async_trait]
impl TranslationBackend for ChatBackend {
    async fn translate(&self, chunk: &str, locale: &str, kind: TextKind) -> BackendResult<String> {
        let body = self.build_request(chunk, locale, kind);

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&text) {
                return Err(envelope.error.into());
            }
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let reply: ChatReply = serde_json::from_str(&text)?;
        if let Some(error) = reply.error {
            return Err(error.into());
        }

        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(BackendError::EmptyReply)?;

        Ok(match self.mode {
            BackendMode::Chat => unwrap_reply(&content, locale).to_string(),
            BackendMode::Machine => content,
        })
    }
}

fn instruction(locale: &str, text: &str) -> String {
    format!("Translate following text into {locale}:\n{text}")
}

fn system_prompt(kind: TextKind) -> String {
    let instructions = match kind {
        TextKind::Markdown => MARKDOWN_PROMPT,
        TextKind::Html => HTML_PROMPT,
        TextKind::Plain => PLAIN_PROMPT,
    };
    format!("{PROMPT_PREAMBLE} {instructions}")
}

/// Strip a ```` ```{locale} ```` fence or a bare locale prefix that chat
/// models add despite being told not to.
fn unwrap_reply<'a>(content: &'a str, locale: &str) -> &'a str {
    if locale.is_empty() {
        return content;
    }

    let mut content = content;

    if let Some(rest) = content
        .strip_prefix("```")
        .and_then(|rest| rest.strip_prefix(locale))
    {
        let rest = rest.strip_prefix('\n').unwrap_or(rest);
        let trimmed = rest.trim_end();
        content = trimmed
            .strip_suffix("\n```")
            .or_else(|| trimmed.strip_suffix("```"))
            .unwrap_or(trimmed);
    }

    content.strip_prefix(locale).unwrap_or(content)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation_options: Option<TranslationOptions<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn new(role: &'static str, content: String) -> Self {
        Self { role, content }
    }
}

#[derive(Debug, Serialize)]
struct TranslationOptions<'a> {
    source_lang: &'static str,
    target_lang: &'a str,
    domains: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<ApiError> for BackendError {
    fn from(error: ApiError) -> Self {
        let code = match error.code {
            Some(serde_json::Value::String(code)) => code,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        BackendError::Api {
            code,
            message: error.message,
            kind: error.kind.unwrap_or_default(),
        }
    }
}

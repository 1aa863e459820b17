use crate::config::Config;
use crate::language::LanguagePair;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// A source paragraph and its candidate translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphPair {
    pub index: usize,
    pub source: String,
    pub target: String,
}

/// Build the system prompt establishing the bilingual alignment task
fn build_system_prompt(languages: &LanguagePair) -> String {
    format!(
        "You are a highly proficient bilingual assistant capable of aligning {} and {} text \
         for use in a Translation Memory file.",
        languages.source.name(),
        languages.target.name()
    )
}

/// Build the user prompt embedding both paragraphs and the expected fragment shape
fn build_user_prompt(pair: &ParagraphPair, languages: &LanguagePair) -> String {
    let source_name = languages.source.name();
    let target_name = languages.target.name();

    format!(
        "Please align this {source_name} paragraph with the provided {target_name} translation \
         so it would be useful as Translation Memory.\n\
         Here is the {source_name} text in paragraph form:\n{source}\n\
         Here is the {target_name} translation of that same paragraph:\n{target}\n\n\
         Do not comment, do not provide a new translation but use what I gave you in the \
         paragraphs, do not modify or cut short the provided sentences. Only give me the \
         sentences or phrases I provided, aligned in a JSON-like format exactly like this: \
         {{\"{source_key}\": \"Introduction\", \"{target_key}\": \"...\"}}.",
        source = pair.source,
        target = pair.target,
        source_key = languages.source.field_key(),
        target_key = languages.target.field_key(),
    )
}

/// Chat-completion client that asks the service to align one paragraph pair.
///
/// Every failure degrades to an empty reply; callers never see an error.
#[derive(Debug, Clone)]
pub struct AlignmentClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AlignmentClient {
    /// Build a client whose requests are each bounded by `request_timeout`
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(Duration::from_secs(30)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.openai_api_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.request_timeout(),
        )
    }

    /// Ask the service to align one paragraph pair.
    ///
    /// Returns the raw reply text, or an empty string if the request failed,
    /// timed out, returned any status other than 200, or carried no choices.
    pub async fn align(&self, pair: &ParagraphPair, languages: &LanguagePair) -> String {
        match self.request_alignment(pair, languages).await {
            Ok(text) => {
                debug!(
                    "Paragraph {}: received {} bytes of alignment",
                    pair.index,
                    text.len()
                );
                text
            }
            Err(e) => {
                warn!("Paragraph {}: alignment unavailable: {:#}", pair.index, e);
                String::new()
            }
        }
    }

    async fn request_alignment(
        &self,
        pair: &ParagraphPair,
        languages: &LanguagePair,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_system_prompt(languages),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(pair, languages),
                },
            ],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            anyhow::bail!("OpenAI API error ({}): {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("OpenAI response contained no choices")
    }
}

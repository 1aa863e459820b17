use crate::language::{LanguagePair, LanguageSpec};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";

#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,
    pub request_timeout_secs: u64,

    // Languages
    pub source_lang_name: String,
    pub source_lang_code: String,
    pub target_lang_name: String,
    pub target_lang_code: String,
    pub admin_lang: String,

    // Output
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // OpenAI
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY not set")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_API_URL.to_string()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),

            // Languages
            source_lang_name: std::env::var("SOURCE_LANG_NAME")
                .unwrap_or_else(|_| "English".to_string()),
            source_lang_code: std::env::var("SOURCE_LANG_CODE")
                .unwrap_or_else(|_| "EN".to_string()),
            target_lang_name: std::env::var("TARGET_LANG_NAME")
                .unwrap_or_else(|_| "Khmer".to_string()),
            target_lang_code: std::env::var("TARGET_LANG_CODE")
                .unwrap_or_else(|_| "KM".to_string()),
            admin_lang: std::env::var("ADMIN_LANG").unwrap_or_else(|_| "en".to_string()),

            // Output
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
        })
    }

    /// Build the validated language pair from the configured names and codes
    pub fn languages(&self) -> Result<LanguagePair> {
        let source = LanguageSpec::new(&self.source_lang_name, &self.source_lang_code)
            .context("Invalid source language")?;
        let target = LanguageSpec::new(&self.target_lang_name, &self.target_lang_code)
            .context("Invalid target language")?;
        LanguagePair::new(source, target)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check everything a run needs before any request is made
    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        if self.admin_lang.trim().is_empty() {
            anyhow::bail!("ADMIN_LANG is empty");
        }
        self.languages()?;
        Ok(())
    }
}

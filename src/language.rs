//! Language identities used for prompting, fragment extraction and TMX tagging.
//!
//! A language carries two independent identifiers: the natural-language
//! `name` the generation service sees in prompts (e.g. "English") and the
//! `code` written into `xml:lang` attributes (e.g. "EN").

use anyhow::{bail, Result};

/// One side of an alignment: the language's display name and its TMX code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSpec {
    name: String,
    code: String,
}

impl LanguageSpec {
    /// Create a language from a name and code, trimming both.
    ///
    /// # Returns
    /// * `Err` if either the name or the code is empty after trimming
    pub fn new(name: &str, code: &str) -> Result<Self> {
        let name = name.trim();
        let code = code.trim();

        if name.is_empty() {
            bail!("Language name must not be empty");
        }
        if code.is_empty() {
            bail!("Language code for '{}' must not be empty", name);
        }

        Ok(Self {
            name: name.to_string(),
            code: code.to_string(),
        })
    }

    /// Natural-language name (e.g. "English").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Code written into `xml:lang` (e.g. "EN").
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Key used for this language inside a structured response fragment.
    ///
    /// The prompt asks for `{"english": "...", "khmer": "..."}`, so the key is
    /// the lowercased name.
    pub fn field_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// The source and target languages of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: LanguageSpec,
    pub target: LanguageSpec,
}

impl LanguagePair {
    /// Pair two languages.
    ///
    /// # Returns
    /// * `Err` if the codes or the fragment keys of both sides collide, since
    ///   every translation unit needs two distinct language identifiers
    pub fn new(source: LanguageSpec, target: LanguageSpec) -> Result<Self> {
        if source.code.eq_ignore_ascii_case(&target.code) {
            bail!(
                "Source and target language codes must differ (both '{}')",
                source.code
            );
        }
        if source.field_key() == target.field_key() {
            bail!(
                "Source and target language names must differ (both '{}')",
                source.name
            );
        }
        Ok(Self { source, target })
    }
}

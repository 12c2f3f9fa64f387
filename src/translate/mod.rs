//! Best-effort title translation.
//!
//! Translation is cosmetic: a failure never blocks delivery. Providers report
//! what happened through [`Translation`], so a fallback can't be mistaken for
//! a real translation without looking.

pub mod mymemory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::settings::TranslateSettings;

pub use mymemory::MyMemoryTranslator;

/// Source and target language codes, e.g. `en` → `ru`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangPair {
    pub source: String,
    pub target: String,
}

impl LangPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LangPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Translated(String),
    /// Nothing to translate (empty input, or translation switched off).
    Unchanged(String),
    /// The provider failed; `original` is passed through.
    Degraded { original: String, reason: String },
}

impl Translation {
    pub fn text(&self) -> &str {
        match self {
            Translation::Translated(t) | Translation::Unchanged(t) => t,
            Translation::Degraded { original, .. } => original,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Translation::Translated(t) | Translation::Unchanged(t) => t,
            Translation::Degraded { original, .. } => original,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Translation::Degraded { .. })
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Single attempt, never fails. Empty input returns `Unchanged` without a call.
    async fn translate(&self, text: &str, pair: &LangPair) -> Translation;
    fn name(&self) -> &'static str;
}

/// Used when translation is disabled in config.
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, text: &str, _pair: &LangPair) -> Translation {
        Translation::Unchanged(text.to_string())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Build the configured translator; a disabled config yields [`NoopTranslator`].
pub fn from_settings(cfg: &TranslateSettings) -> anyhow::Result<Arc<dyn Translator>> {
    if !cfg.enabled {
        tracing::info!("translation disabled");
        return Ok(Arc::new(NoopTranslator));
    }
    Ok(Arc::new(MyMemoryTranslator::from_settings(cfg)?))
}

//! Configuration for an assembly run.
//!
//! Every knob lives in [`AssemblyConfig`], built via its
//! [`AssemblyConfigBuilder`], so a config can be shared, logged and diffed as
//! one value. Callers set only what they care about and rely on the defaults
//! for the rest.

use crate::error::Scan2PdfError;
use crate::pipeline::layout::PageFormat;
use crate::progress::AssemblyObserver;
use std::fmt;
use std::sync::Arc;

/// Configuration for cleaning and assembling one upload sequence.
///
/// # Example
/// ```rust
/// use scan2pdf::AssemblyConfig;
///
/// let config = AssemblyConfig::builder()
///     .model("gemini-2.5-flash-image-preview")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AssemblyConfig {
    /// Page size and margin in layout units. Default: A4 with a 10-unit
    /// margin (190×277 content rectangle).
    pub page: PageFormat,

    /// Cleanup model identifier. Default: `gemini-2.5-flash-image-preview`.
    pub model: String,

    /// Override for the cleanup instruction sent with each image.
    /// If `None`, [`crate::prompts::DEFAULT_CLEANUP_PROMPT`] is used.
    pub cleanup_prompt: Option<String>,

    /// Per-cleanup-call HTTP timeout in seconds. Default: 120.
    ///
    /// The original surface had no timeout at all and a hung call hung the
    /// whole run; the bound here is an enhancement, not a preserved contract.
    pub api_timeout_secs: u64,

    /// Optional observer mirroring progress updates outward.
    pub observer: Option<Arc<dyn AssemblyObserver>>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            page: PageFormat::A4,
            model: "gemini-2.5-flash-image-preview".to_string(),
            cleanup_prompt: None,
            api_timeout_secs: 120,
            observer: None,
        }
    }
}

impl fmt::Debug for AssemblyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyConfig")
            .field("page", &self.page)
            .field("model", &self.model)
            .field("cleanup_prompt", &self.cleanup_prompt.as_ref().map(|_| "<custom>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn AssemblyObserver>"))
            .finish()
    }
}

impl AssemblyConfig {
    /// Create a new builder for `AssemblyConfig`.
    pub fn builder() -> AssemblyConfigBuilder {
        AssemblyConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AssemblyConfig`].
#[derive(Debug)]
pub struct AssemblyConfigBuilder {
    config: AssemblyConfig,
}

impl AssemblyConfigBuilder {
    pub fn page(mut self, page: PageFormat) -> Self {
        self.config.page = page;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn cleanup_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.cleanup_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn AssemblyObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssemblyConfig, Scan2PdfError> {
        let page = &self.config.page;
        if page.width <= 0.0 || page.height <= 0.0 {
            return Err(Scan2PdfError::InvalidConfig(format!(
                "page size must be positive, got {}x{}",
                page.width, page.height
            )));
        }
        if page.margin < 0.0 || 2.0 * page.margin >= page.width.min(page.height) {
            return Err(Scan2PdfError::InvalidConfig(format!(
                "margin {} leaves no content area on a {}x{} page",
                page.margin, page.width, page.height
            )));
        }
        if self.config.model.trim().is_empty() {
            return Err(Scan2PdfError::InvalidConfig("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fixed_page_contract() {
        let config = AssemblyConfig::default();
        assert_eq!(config.page, PageFormat::A4);
        assert_eq!(config.page.content_width(), 190.0);
        assert_eq!(config.page.content_height(), 277.0);
        assert_eq!(config.api_timeout_secs, 120);
        assert!(config.cleanup_prompt.is_none());
    }

    #[test]
    fn builder_rejects_margin_swallowing_the_page() {
        let result = AssemblyConfig::builder()
            .page(PageFormat {
                width: 100.0,
                height: 100.0,
                margin: 50.0,
            })
            .build();
        assert!(matches!(result, Err(Scan2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_empty_model() {
        let result = AssemblyConfig::builder().model("  ").build();
        assert!(matches!(result, Err(Scan2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn timeout_is_clamped_to_at_least_one_second() {
        let config = AssemblyConfig::builder().api_timeout_secs(0).build().unwrap();
        assert_eq!(config.api_timeout_secs, 1);
    }
}

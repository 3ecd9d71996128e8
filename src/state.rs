//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::html::{CommandConverter, ConvertError, PlainTextConverter};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build text converter: {0}")]
    TextConverter(#[from] regex::Error),

    #[error("Invalid MARKDOWN_COMMAND: {0}")]
    MarkdownCommand(#[from] ConvertError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    text: PlainTextConverter,
    markdown: Option<CommandConverter>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StateError> {
        let text = PlainTextConverter::new()?;
        let markdown = config
            .conversion
            .markdown_command
            .as_deref()
            .map(CommandConverter::parse)
            .transpose()?;

        if let Some(converter) = &markdown {
            tracing::info!("Markdown output enabled via {}", converter.program());
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                text,
                markdown,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn text_converter(&self) -> &PlainTextConverter {
        &self.inner.text
    }

    /// External Markdown converter, when configured
    pub fn markdown_converter(&self) -> Option<&CommandConverter> {
        self.inner.markdown.as_ref()
    }
}

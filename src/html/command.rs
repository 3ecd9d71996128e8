//! External command converter
//!
//! Pipes chapter markup through an external program over stdin/stdout, e.g.
//! `pandoc -f html -t gfm` for Markdown output.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use epub_chapters::html::{CommandConverter, MarkupConverter};
//!
//! let converter = CommandConverter::parse("pandoc -f html -t gfm")?;
//! let markdown = converter.convert("<h1>Title</h1>").await?;
//! ```

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ConvertError, MarkupConverter};

/// Default time allowed for one conversion
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Converter backed by an external program
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from a whitespace-separated command line
    pub fn parse(command_line: &str) -> Result<Self, ConvertError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ConvertError::Command("empty converter command".to_string()))?;

        Ok(Self::new(program, parts.collect()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, markup: &str) -> Result<String, ConvertError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConvertError::Command(format!("Failed to spawn {}: {}", self.program, e)))?;

        // Feed stdin from a separate task so a chatty child can't fill its
        // stdout pipe while we are still writing
        let writer = child.stdin.take().map(|mut stdin| {
            let input = markup.as_bytes().to_vec();
            tokio::spawn(async move {
                stdin.write_all(&input).await?;
                stdin.shutdown().await
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ConvertError::Command(format!("Failed to wait for {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ConvertError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(ConvertError::Command(format!(
                        "Failed to write to {} stdin: {}",
                        self.program, e
                    )))
                }
                Err(e) => return Err(ConvertError::Command(format!("stdin task failed: {}", e))),
            }
        }

        String::from_utf8(output.stdout).map_err(|_| ConvertError::InvalidOutput)
    }
}

#[async_trait]
impl MarkupConverter for CommandConverter {
    fn name(&self) -> &str {
        &self.program
    }

    async fn convert(&self, markup: &str) -> Result<String, ConvertError> {
        tokio::time::timeout(self.timeout, self.run(markup))
            .await
            .map_err(|_| ConvertError::Timeout(self.timeout.as_secs()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let converter = CommandConverter::parse("pandoc -f html -t gfm").unwrap();
        assert_eq!(converter.program(), "pandoc");
        assert_eq!(converter.args, vec!["-f", "html", "-t", "gfm"]);
    }

    #[test]
    fn test_parse_empty_command() {
        assert!(matches!(
            CommandConverter::parse("   "),
            Err(ConvertError::Command(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let converter = CommandConverter::new("definitely-not-a-real-converter-binary", vec![]);
        assert!(matches!(
            converter.convert("<p>x</p>").await,
            Err(ConvertError::Command(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pipes_through_cat() {
        let converter = CommandConverter::new("cat", vec![]);
        assert_eq!(converter.convert("<p>x</p>").await.unwrap(), "<p>x</p>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let converter = CommandConverter::new("false", vec![]);
        assert!(matches!(
            converter.convert("<p>x</p>").await,
            Err(ConvertError::Command(_))
        ));
    }
}

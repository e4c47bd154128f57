//! Translation cache records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ContentHash, TypesError};

/// Markup flavour of a document submitted for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextKind {
    /// `text/markdown`
    #[serde(rename = "text/markdown")]
    Markdown,
    /// `text/html`
    #[serde(rename = "text/html")]
    Html,
    /// `text/plain`
    #[serde(rename = "text/plain")]
    Plain,
}

impl TextKind {
    /// The MIME type used for this kind in headers and storage.
    pub fn mime(&self) -> &'static str {
        match self {
            TextKind::Markdown => "text/markdown",
            TextKind::Html => "text/html",
            TextKind::Plain => "text/plain",
        }
    }
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for TextKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text/markdown" | "markdown" => Ok(TextKind::Markdown),
            "text/html" | "html" => Ok(TextKind::Html),
            "text/plain" | "plain" => Ok(TextKind::Plain),
            other => Err(TypesError::UnknownTextKind(other.to_string())),
        }
    }
}

/// Which part of a project listing the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    /// Short one-line summary.
    Summary,
    /// Full long-form description body.
    #[default]
    Description,
}

impl DescriptionKind {
    /// Lowercase name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionKind::Summary => "summary",
            DescriptionKind::Description => "description",
        }
    }
}

impl fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptionKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(DescriptionKind::Summary),
            "description" => Ok(DescriptionKind::Description),
            other => Err(TypesError::UnknownDescriptionKind(other.to_string())),
        }
    }
}

/// Outcome of a translation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TranslationStatus {
    /// A complete cached translation.
    Ready {
        /// The translated text.
        content: String,
        /// Markup flavour the entry was translated as.
        text_kind: TextKind,
    },
    /// Work is queued or in flight; poll again later.
    Pending,
}

impl TranslationStatus {
    /// Check if the translation is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, TranslationStatus::Ready { .. })
    }
}

/// An immutable translation cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTranslation {
    /// Key: hash of source text + locale.
    pub hash: ContentHash,
    /// The full translated document.
    pub content: String,
    /// Target locale.
    pub locale: String,
    /// Markup flavour of the content.
    pub text_kind: TextKind,
    /// Logical type of the source text.
    pub kind: DescriptionKind,
    /// Unix timestamp (seconds) when the entry was written.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_kind_parses_mime_and_short_names() {
        assert_eq!("text/markdown".parse::<TextKind>().unwrap(), TextKind::Markdown);
        assert_eq!("html".parse::<TextKind>().unwrap(), TextKind::Html);
        assert!("application/pdf".parse::<TextKind>().is_err());
    }

    #[test]
    fn text_kind_serializes_as_mime() {
        let json = serde_json::to_string(&TextKind::Html).unwrap();
        assert_eq!(json, "\"text/html\"");
    }

    #[test]
    fn description_kind_defaults_to_description() {
        assert_eq!(DescriptionKind::default(), DescriptionKind::Description);
        assert_eq!("summary".parse::<DescriptionKind>().unwrap(), DescriptionKind::Summary);
    }

    #[test]
    fn status_serializes_with_tag() {
        let ready = TranslationStatus::Ready {
            content: "你好".to_string(),
            text_kind: TextKind::Markdown,
        };
        assert_eq!(
            serde_json::to_string(&ready).unwrap(),
            r#"{"status":"ready","content":"你好","text_kind":"text/markdown"}"#
        );
        assert_eq!(
            serde_json::to_string(&TranslationStatus::Pending).unwrap(),
            r#"{"status":"pending"}"#
        );
    }
}

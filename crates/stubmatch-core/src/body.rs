//! Body type detection
//!
//! Picks the comparison and normalization strategy for a payload from its
//! first non-whitespace character. No parsing happens here.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Detected (or declared) content format of a text payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// Starts with `{`
    #[default]
    Json,
    /// Starts with `<`
    Xml,
    /// Anything else, including blank
    Text,
}

impl BodyType {
    /// Classify a payload by its leading character.
    ///
    /// - blank → `Text`
    /// - `{` → `Json`
    /// - `<` → `Xml`
    /// - otherwise → `Text`
    #[must_use]
    pub fn classify(text: &str) -> Self {
        match text.trim_start().chars().next() {
            Some('{') => Self::Json,
            Some('<') => Self::Xml,
            _ => Self::Text,
        }
    }

    /// Label used in report headings, e.g. `[equalToJson]`
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Json => "Json",
            Self::Xml => "Xml",
            Self::Text => "Text",
        }
    }

    /// Upper-case tag used in mixed-type report headings, e.g. `[actualXML]`
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Text => "TEXT",
        }
    }

    /// MIME type served for a response body of this type
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Text => "text/plain",
        }
    }
}

impl std::fmt::Display for BodyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Text => "text",
        })
    }
}

/// Declared format name that is not `json`, `xml` or `text`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported format: {0}")]
pub struct UnsupportedFormat(pub String);

impl FromStr for BodyType {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "text" | "txt" | "plain" => Ok(Self::Text),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for BodyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Shorthand for [`BodyType::classify`].
#[must_use]
pub fn classify(text: &str) -> BodyType {
    BodyType::classify(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_text() {
        assert_eq!(classify(""), BodyType::Text);
        assert_eq!(classify("   \n\t"), BodyType::Text);
    }

    #[test]
    fn leading_brace_is_json() {
        assert_eq!(classify(r#"{"id":1}"#), BodyType::Json);
        assert_eq!(classify("\n   {"), BodyType::Json);
    }

    #[test]
    fn leading_angle_is_xml() {
        assert_eq!(classify("<ping/>"), BodyType::Xml);
        assert_eq!(classify("  <?xml version=\"1.0\"?><a/>"), BodyType::Xml);
    }

    #[test]
    fn arrays_and_words_are_text() {
        // Only objects count as JSON for template matching
        assert_eq!(classify("[1, 2]"), BodyType::Text);
        assert_eq!(classify("hello"), BodyType::Text);
    }

    #[test]
    fn labels_and_tags() {
        assert_eq!(BodyType::Json.label(), "Json");
        assert_eq!(BodyType::Xml.tag(), "XML");
        assert_eq!(BodyType::Text.tag(), "TEXT");
    }

    #[test]
    fn mime_types() {
        assert_eq!(BodyType::Json.mime(), "application/json");
        assert_eq!(BodyType::Xml.mime(), "application/xml");
        assert_eq!(BodyType::Text.mime(), "text/plain");
    }

    #[test]
    fn format_hint_serialization() {
        let parsed: BodyType = serde_json::from_str("\"xml\"").unwrap();
        assert_eq!(parsed, BodyType::Xml);
        assert_eq!(serde_json::to_string(&BodyType::Text).unwrap(), "\"text\"");
        let upper: BodyType = serde_json::from_str("\"JSON\"").unwrap();
        assert_eq!(upper, BodyType::Json);
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let err = serde_json::from_str::<BodyType>("\"csv\"").unwrap_err();
        assert!(err.to_string().contains("Unsupported format: csv"));
        assert_eq!(
            "yaml".parse::<BodyType>(),
            Err(UnsupportedFormat("yaml".into()))
        );
    }
}

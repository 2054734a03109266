//! Connection configuration
//!
//! [`ConnectionOptions`] is the construction-time configuration (it can be
//! loaded from JSON); [`Attribute`] is a single option read or written at run
//! time through `set_attribute` / `attribute`.

use super::error::Result;
use super::error_mode::ErrorMode;
use super::fetch::{FetchMode, FetchStyle};
use serde::{Deserialize, Serialize};

/// Construction-time connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionOptions {
    /// How failures are surfaced
    pub error_mode: ErrorMode,
    /// Applied to the native connection immediately
    pub autocommit: bool,
    /// Buffer results client-side instead of streaming them
    pub buffered: bool,
    /// Style used when a fetch call does not name one
    pub default_fetch: FetchStyle,
    /// Statement executed once right after connecting (skipped when empty)
    pub init_command: String,
    /// Reuse a pooled native link (adds the `p:` host prefix)
    pub persistent: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Silent,
            autocommit: true,
            buffered: true,
            default_fetch: FetchStyle::Both,
            init_command: String::new(),
            persistent: false,
        }
    }
}

impl ConnectionOptions {
    /// Parse options from a JSON object; absent keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn with_autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    pub fn with_buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    pub fn with_default_fetch(mut self, style: FetchStyle) -> Self {
        self.default_fetch = style;
        self
    }

    pub fn with_init_command<S: Into<String>>(mut self, sql: S) -> Self {
        self.init_command = sql.into();
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Reject values that cannot be used as configured defaults
    pub fn validate(&self) -> Result<()> {
        FetchMode::try_from(self.default_fetch).map(|_| ())
    }

    /// Current value of one option
    pub fn get(&self, kind: AttributeKind) -> Attribute {
        match kind {
            AttributeKind::ErrorMode => Attribute::ErrorMode(self.error_mode),
            AttributeKind::Autocommit => Attribute::Autocommit(self.autocommit),
            AttributeKind::Buffered => Attribute::Buffered(self.buffered),
            AttributeKind::DefaultFetch => Attribute::DefaultFetch(self.default_fetch),
            AttributeKind::InitCommand => Attribute::InitCommand(self.init_command.clone()),
            AttributeKind::Persistent => Attribute::Persistent(self.persistent),
        }
    }

    /// Store one option; native side effects are the caller's concern
    pub fn set(&mut self, attribute: Attribute) -> Result<()> {
        match attribute {
            Attribute::ErrorMode(mode) => self.error_mode = mode,
            Attribute::Autocommit(enabled) => self.autocommit = enabled,
            Attribute::Buffered(buffered) => self.buffered = buffered,
            Attribute::DefaultFetch(style) => {
                FetchMode::try_from(style)?;
                self.default_fetch = style;
            }
            Attribute::InitCommand(sql) => self.init_command = sql,
            Attribute::Persistent(persistent) => self.persistent = persistent,
        }
        Ok(())
    }
}

/// Name of a runtime-settable option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    ErrorMode,
    Autocommit,
    Buffered,
    DefaultFetch,
    InitCommand,
    Persistent,
}

/// One option together with its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "attribute", content = "value")]
pub enum Attribute {
    ErrorMode(ErrorMode),
    Autocommit(bool),
    Buffered(bool),
    DefaultFetch(FetchStyle),
    InitCommand(String),
    Persistent(bool),
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::ErrorMode(_) => AttributeKind::ErrorMode,
            Attribute::Autocommit(_) => AttributeKind::Autocommit,
            Attribute::Buffered(_) => AttributeKind::Buffered,
            Attribute::DefaultFetch(_) => AttributeKind::DefaultFetch,
            Attribute::InitCommand(_) => AttributeKind::InitCommand,
            Attribute::Persistent(_) => AttributeKind::Persistent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.error_mode, ErrorMode::Silent);
        assert!(options.autocommit);
        assert!(options.buffered);
        assert_eq!(options.default_fetch, FetchStyle::Both);
        assert!(options.init_command.is_empty());
        assert!(!options.persistent);
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            ConnectionOptions::from_json(r#"{"error_mode": "exception", "default_fetch": "assoc"}"#)
                .unwrap();
        assert_eq!(options.error_mode, ErrorMode::Exception);
        assert_eq!(options.default_fetch, FetchStyle::Assoc);
        assert!(options.autocommit);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(ConnectionOptions::from_json(r#"{"error_mode": "loud"}"#).is_err());
        assert!(ConnectionOptions::from_json(r#"{"unknown": 1}"#).is_err());
        assert!(ConnectionOptions::from_json(r#"{"default_fetch": "func"}"#).is_err());
    }

    #[test]
    fn test_get_and_set() {
        let mut options = ConnectionOptions::default();
        options.set(Attribute::Buffered(false)).unwrap();
        assert_eq!(options.get(AttributeKind::Buffered), Attribute::Buffered(false));

        assert!(options.set(Attribute::DefaultFetch(FetchStyle::Into)).is_err());
        assert_eq!(options.default_fetch, FetchStyle::Both);

        let attribute = Attribute::InitCommand("SET NAMES utf8".to_string());
        assert_eq!(attribute.kind(), AttributeKind::InitCommand);
        options.set(attribute.clone()).unwrap();
        assert_eq!(options.get(AttributeKind::InitCommand), attribute);
    }

    #[test]
    fn test_builder_style() {
        let options = ConnectionOptions::default()
            .with_error_mode(ErrorMode::Warning)
            .with_autocommit(false)
            .with_persistent(true)
            .with_init_command("PRAGMA foreign_keys = ON");
        assert_eq!(options.error_mode, ErrorMode::Warning);
        assert!(!options.autocommit);
        assert!(options.persistent);
        assert_eq!(options.init_command, "PRAGMA foreign_keys = ON");
    }
}

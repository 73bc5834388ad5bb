//! Generator configuration.
//!
//! Everything here is a property of the target calculator or of the
//! textual container the program is shipped in; none of it changes how
//! expressions are simplified.

use serde::{Deserialize, Serialize};

use crate::error::GenError;

/// Separator placed between emitted lines in the materialized program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSeparator {
    /// One instruction per text line.
    #[default]
    Newline,
    /// The calculator's own `:` statement separator.
    Colon,
}

impl LineSeparator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newline => "\n",
            Self::Colon => ":",
        }
    }
}

/// Localized keyword set of the target calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    French,
    English,
}

impl Dialect {
    /// Infix joiner for logical and (spaces included).
    pub fn and_joiner(self) -> &'static str {
        match self {
            Self::French => " et ",
            Self::English => " and ",
        }
    }

    /// Infix joiner for logical or (spaces included).
    pub fn or_joiner(self) -> &'static str {
        match self {
            Self::French => " ou ",
            Self::English => " or ",
        }
    }

    /// Opening token of the logical-not function.
    pub fn not_open(self) -> &'static str {
        match self {
            Self::French => "non(",
            Self::English => "not(",
        }
    }

    /// Implicit slot holding the result of the last evaluation or program.
    pub fn last_result(self) -> &'static str {
        match self {
            Self::French => "Rep",
            Self::English => "Ans",
        }
    }

    /// Opening token of the integer-part function.
    pub fn int_part_open(self) -> &'static str {
        match self {
            Self::French => "partEnt(",
            Self::English => "int(",
        }
    }
}

/// Default number of memory-bank slots (`⌊RAM(1)`..`⌊RAM(999)`).
pub const DEFAULT_BANK_SLOTS: u32 = 999;
/// Default number of string slots (`Chn0`..`Chn9`).
pub const DEFAULT_STRING_SLOTS: u32 = 10;

/// Configuration of a code-generation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    pub line_separator: LineSeparator,
    pub dialect: Dialect,
    pub bank_slots: u32,
    pub string_slots: u32,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            line_separator: LineSeparator::default(),
            dialect: Dialect::default(),
            bank_slots: DEFAULT_BANK_SLOTS,
            string_slots: DEFAULT_STRING_SLOTS,
        }
    }
}

impl GenConfig {
    pub fn with_separator(mut self, separator: LineSeparator) -> Self {
        self.line_separator = separator;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserialize from JSON; missing fields take their defaults.
    pub fn from_json(data: &str) -> Result<Self, GenError> {
        serde_json::from_str(data).map_err(|e| GenError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_target_machine() {
        let config = GenConfig::default();
        assert_eq!(config.line_separator, LineSeparator::Newline);
        assert_eq!(config.dialect, Dialect::French);
        assert_eq!(config.bank_slots, 999);
        assert_eq!(config.string_slots, 10);
    }

    #[test]
    fn round_trip_json() {
        let config = GenConfig::default()
            .with_separator(LineSeparator::Colon)
            .with_dialect(Dialect::English);
        let json = config.to_json();
        assert!(json.contains("\"colon\""));
        assert!(json.contains("\"english\""));
        assert_eq!(GenConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = GenConfig::from_json(r#"{"line_separator":"colon"}"#).unwrap();
        assert_eq!(config.line_separator, LineSeparator::Colon);
        assert_eq!(config.dialect, Dialect::French);
        assert_eq!(config.bank_slots, DEFAULT_BANK_SLOTS);
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = GenConfig::from_json(r#"{"line_separator":"semicolon"}"#).unwrap_err();
        assert!(matches!(err, GenError::Config(_)));
    }

    #[test]
    fn dialect_tokens() {
        assert_eq!(Dialect::French.and_joiner(), " et ");
        assert_eq!(Dialect::English.or_joiner(), " or ");
        assert_eq!(Dialect::French.last_result(), "Rep");
        assert_eq!(Dialect::English.int_part_open(), "int(");
        assert_eq!(LineSeparator::Colon.as_str(), ":");
    }
}

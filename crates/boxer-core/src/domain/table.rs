//! TableName - outbox テーブル名
//!
//! SQL に直接埋め込むので識別子として検証する。

use std::fmt;
use std::str::FromStr;

use super::errors::ConfigError;

const MAX_LEN: usize = 64;

/// Validated SQL identifier of the outbox table (`[A-Za-z_][A-Za-z0-9_]*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub const DEFAULT: &'static str = "message_outbox";

    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_head || !valid_tail || name.len() > MAX_LEN {
            return Err(ConfigError::InvalidTableName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl FromStr for TableName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("message_outbox")]
    #[case("_outbox2")]
    #[case("Outbox")]
    fn accepts_identifiers(#[case] name: &str) {
        assert_eq!(TableName::new(name).unwrap().as_str(), name);
    }

    #[rstest]
    #[case("")]
    #[case("1outbox")]
    #[case("outbox; DROP TABLE users")]
    #[case("schema.outbox")]
    #[case("`outbox`")]
    fn rejects_non_identifiers(#[case] name: &str) {
        assert_eq!(
            TableName::new(name),
            Err(ConfigError::InvalidTableName(name.to_string()))
        );
    }

    #[test]
    fn rejects_overlong_names() {
        assert!(TableName::new("a".repeat(MAX_LEN + 1)).is_err());
    }

    #[test]
    fn default_is_message_outbox() {
        assert_eq!(TableName::default().as_str(), "message_outbox");
    }
}

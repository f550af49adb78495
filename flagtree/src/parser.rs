//! Tokenizes a raw value sequence into flags and residual positional values,
//! honouring each flag's elision contract as declared by the current mux node.

use std::collections::{HashMap, VecDeque};

use crate::error::ParseError;
use crate::spec::Elide;

/// The classification of a single raw program argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Zero-length value.
    Empty,
    /// Does not begin with `-`, or is exactly `"-"`.
    Str,
    /// Exactly `"--"`.
    Delim,
    /// Exactly two characters, first is `-`, second is not `-`.
    FlagShort,
    /// Length > 3, starts with `--`.
    FlagLong,
    /// Any other `-`-prefixed form.
    Invalid,
    /// No more tokens.
    Eof,
}

/// A classified raw value. `value` is the flag name with its leading dashes
/// stripped for `FlagShort`/`FlagLong`, and the raw value unchanged otherwise.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

fn classify(raw: &str) -> Token {
    if raw.is_empty() {
        return Token {
            kind: TokenKind::Empty,
            value: String::new(),
        };
    }
    if raw == "--" {
        return Token {
            kind: TokenKind::Delim,
            value: raw.to_string(),
        };
    }
    if raw == "-" || !raw.starts_with('-') {
        return Token {
            kind: TokenKind::Str,
            value: raw.to_string(),
        };
    }
    let bytes = raw.as_bytes();
    if raw.len() == 2 && bytes[1] != b'-' {
        return Token {
            kind: TokenKind::FlagShort,
            value: raw[1..].to_string(),
        };
    }
    if raw.len() > 3 && raw.starts_with("--") {
        return Token {
            kind: TokenKind::FlagLong,
            value: raw[2..].to_string(),
        };
    }
    Token {
        kind: TokenKind::Invalid,
        value: raw.to_string(),
    }
}

/// What the parser needs to know about a flag it might encounter: whether it
/// may be given without a following value, and (when it may) which following
/// tokens are actually consumed as that value.
#[derive(Clone)]
pub struct FlagTableEntry {
    pub elide: Elide,
    pub field_type: &'static str,
}

/// The set of flags known at a given point of descent through the command
/// trie, type-erased of the parameter record they were declared on.
#[derive(Clone, Default)]
pub struct FlagTable {
    entries: HashMap<String, FlagTableEntry>,
}

impl FlagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, entry: FlagTableEntry) {
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<&FlagTableEntry> {
        self.entries.get(name)
    }

    /// Merges `other`'s entries into `self`. Under `strict`, a name already
    /// present must also agree on its declared field type; either way, it
    /// must always agree on `elide.allow`. Returns the first conflicting
    /// name encountered.
    pub fn merge_from(&mut self, other: &FlagTable, strict: bool) -> Result<(), String> {
        for (name, entry) in other.entries.iter() {
            match self.entries.get(name) {
                None => {
                    self.entries.insert(name.clone(), entry.clone());
                }
                Some(existing) => {
                    let compatible = existing.elide.allow == entry.elide.allow
                        && (!strict || existing.field_type == entry.field_type);
                    if !compatible {
                        return Err(name.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

/// A restartable cursor over a raw value sequence. Plain owned state, cheaply
/// cloneable (cloning copies the remaining-input cursor, nothing more).
#[derive(Clone)]
pub struct Parser {
    remaining: VecDeque<String>,
}

impl Parser {
    pub fn new(values: Vec<String>) -> Self {
        Parser {
            remaining: values.into(),
        }
    }

    fn peek_raw(&self) -> Option<&String> {
        self.remaining.front()
    }

    pub fn consume_token(&mut self) -> Token {
        match self.remaining.pop_front() {
            Some(raw) => classify(&raw),
            None => Token {
                kind: TokenKind::Eof,
                value: String::new(),
            },
        }
    }

    /// Repeatedly consumes leading flags (skipping `Empty` tokens) until a
    /// `Str`, `Delim`, or `Eof` token is reached — which is left unconsumed.
    pub fn consume_flags(&mut self, known: &FlagTable) -> Result<Vec<(String, String)>, ParseError> {
        let mut out = Vec::new();
        loop {
            let Some(raw) = self.peek_raw() else { break };
            let tok = classify(raw);
            match tok.kind {
                TokenKind::Delim | TokenKind::Str | TokenKind::Eof => break,
                TokenKind::Empty => {
                    self.remaining.pop_front();
                }
                TokenKind::FlagShort | TokenKind::FlagLong => {
                    self.remaining.pop_front();
                    let name = tok.value;
                    let entry = known
                        .get(&name)
                        .ok_or_else(|| ParseError::UnknownFlag { name: name.clone() })?;
                    let value = self.consume_flag_value(entry, &name)?;
                    out.push((name, value));
                }
                TokenKind::Invalid => {
                    return Err(ParseError::InvalidToken { raw: tok.value });
                }
            }
        }
        Ok(out)
    }

    fn consume_flag_value(&mut self, entry: &FlagTableEntry, name: &str) -> Result<String, ParseError> {
        let peek = self.peek_raw().cloned();
        if !entry.elide.allow {
            return match peek {
                None => Err(ParseError::MissingFlagValue {
                    name: name.to_string(),
                }),
                Some(raw) => {
                    self.remaining.pop_front();
                    Ok(raw)
                }
            };
        }
        match peek {
            None => Ok("true".to_string()),
            Some(raw) => {
                if (entry.elide.consumable)(&raw) {
                    self.remaining.pop_front();
                    Ok(raw)
                } else {
                    Ok("true".to_string())
                }
            }
        }
    }

    /// Drains every remaining raw value, unclassified, as positional residue.
    pub fn drain_residue(&mut self) -> Vec<String> {
        self.remaining.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecConfig;
    use rstest::rstest;

    #[rstest]
    #[case("", TokenKind::Empty)]
    #[case("-", TokenKind::Str)]
    #[case("plain", TokenKind::Str)]
    #[case("--", TokenKind::Delim)]
    #[case("-x", TokenKind::FlagShort)]
    #[case("--name", TokenKind::FlagLong)]
    #[case("--x", TokenKind::Invalid)]
    #[case("-xx", TokenKind::Invalid)]
    fn classifies_tokens(#[case] raw: &str, #[case] expected: TokenKind) {
        assert_eq!(classify(raw).kind, expected);
    }

    fn bool_table() -> FlagTable {
        let config = SpecConfig::default();
        let mut table = FlagTable::new();
        table.insert(
            "v".to_string(),
            FlagTableEntry {
                elide: Elide::allow(&config),
                field_type: "bool",
            },
        );
        table
    }

    #[test]
    fn elided_bool_flag_does_not_consume_a_following_positional() {
        let mut parser = Parser::new(vec!["-v".to_string(), "target".to_string()]);
        let flags = parser.consume_flags(&bool_table()).unwrap();
        assert_eq!(flags, vec![("v".to_string(), "true".to_string())]);
        let tok = parser.consume_token();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.value, "target");
    }

    #[test]
    fn elided_bool_flag_with_unconsumable_value_falls_back_to_true() {
        let config = SpecConfig::default().with_default_consumable(|s| s == "yes");
        let mut table = FlagTable::new();
        table.insert(
            "v".to_string(),
            FlagTableEntry {
                elide: Elide::allow(&config),
                field_type: "bool",
            },
        );
        let mut parser = Parser::new(vec!["-v".to_string(), "maybe".to_string()]);
        let flags = parser.consume_flags(&table).unwrap();
        assert_eq!(flags, vec![("v".to_string(), "true".to_string())]);
        assert_eq!(parser.drain_residue(), vec!["maybe".to_string()]);
    }

    #[test]
    fn non_elidable_flag_requires_a_value() {
        let config = SpecConfig::default();
        let mut table = FlagTable::new();
        table.insert(
            "n".to_string(),
            FlagTableEntry {
                elide: Elide::none(&config),
                field_type: "i32",
            },
        );
        let mut parser = Parser::new(vec!["--n".to_string()]);
        let err = parser.consume_flags(&table).unwrap_err();
        assert!(matches!(err, ParseError::MissingFlagValue { .. }));
    }

    #[test]
    fn unknown_flag_name_fails_without_consuming_further() {
        let mut parser = Parser::new(vec!["--wat".to_string(), "x".to_string()]);
        let err = parser.consume_flags(&FlagTable::new()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownFlag { name } if name == "wat"));
    }

    #[test]
    fn delimiter_stops_flag_consumption_without_being_consumed() {
        let mut parser = Parser::new(vec!["--".to_string(), "--looks-like-a-flag".to_string()]);
        let flags = parser.consume_flags(&FlagTable::new()).unwrap();
        assert!(flags.is_empty());
        let tok = parser.consume_token();
        assert_eq!(tok.kind, TokenKind::Delim);
        assert_eq!(parser.drain_residue(), vec!["--looks-like-a-flag".to_string()]);
    }
}

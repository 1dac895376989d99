//! Grok pattern lexer.
//!
//! Splits pattern text like `%{IP:client} \[%{HTTPDATE:ts}\]` into literal
//! regex runs and `%{NAME[:FIELD[:TYPE]]}` references. Literal runs are
//! opaque: they are regex fragments handed to the host engine untouched.

use std::ops::Range;

use super::cast::SemanticType;

/// A parsed `%{NAME[:FIELD[:TYPE]]}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternReference {
    pub name: String,
    pub field: Option<String>,
    pub semantic_type: Option<SemanticType>,
    /// Byte range of the whole token in the lexed text.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Reference(PatternReference),
}

/// A malformed `%{...}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Byte offset of the offending `%{` (or of the bad component inside it).
    pub position: usize,
    pub message: String,
}

impl LexError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn at_reference_start(&self) -> bool {
        let bytes = self.bytes();
        bytes.get(self.pos) == Some(&b'%') && bytes.get(self.pos + 1) == Some(&b'{')
    }

    fn is_name_char(ch: u8) -> bool {
        ch.is_ascii_alphanumeric() || ch == b'_'
    }

    /// Read literal text up to the next `%{` or end of input.
    fn read_literal(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() && !self.at_reference_start() {
            self.pos += 1;
        }
        // `%` and `{` are ASCII, so `pos` always lands on a char boundary.
        self.input[start..self.pos].to_string()
    }

    fn read_reference(&mut self) -> Result<PatternReference, LexError> {
        let start = self.pos;
        self.pos += 2; // %{

        let Some(close_rel) = self.input[self.pos..].find('}') else {
            return Err(LexError::new(start, "unterminated pattern reference"));
        };
        let body_start = self.pos;
        let body_end = self.pos + close_rel;
        let body = &self.input[body_start..body_end];
        self.pos = body_end + 1;

        let mut parts = body.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(LexError::new(start, "empty pattern name"));
        }
        if let Some(bad) = name.bytes().position(|b| !Self::is_name_char(b)) {
            return Err(LexError::new(
                body_start + bad,
                format!("invalid character in pattern name `{name}`"),
            ));
        }

        let field_offset = body_start + name.len() + 1;
        let field = match parts.next() {
            None => None,
            Some("") => return Err(LexError::new(field_offset, "empty field name")),
            Some(f) => Some(f.to_string()),
        };

        let semantic_type = match parts.next() {
            None => None,
            Some(ty) => {
                let type_offset = field_offset + field.as_deref().map_or(0, str::len) + 1;
                match SemanticType::from_str(ty) {
                    Some(t) => Some(t),
                    None => {
                        return Err(LexError::new(
                            type_offset,
                            format!("unknown field type `{ty}`"),
                        ));
                    }
                }
            }
        };

        Ok(PatternReference {
            name: name.to_string(),
            field,
            semantic_type,
            span: start..self.pos,
        })
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while self.pos < self.input.len() {
            if self.at_reference_start() {
                tokens.push(Token::Reference(self.read_reference()?));
            } else {
                tokens.push(Token::Literal(self.read_literal()));
            }
        }

        Ok(tokens)
    }
}

/// Tokenize pattern text in one call.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}

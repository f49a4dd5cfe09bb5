//! Dynamic-expression syntax.
//!
//! An expression is split on runs of whitespace. Tokens starting with `$` are
//! references: the path runs up to the first character that cannot continue
//! a dotted identifier path, and whatever follows is kept as literal text
//! (`"$user.name,"` is the reference `user.name` followed by `","`). All other
//! text, including the separating whitespace, is literal.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::value::Value;

/// Path token that anchors a reference at the context instance itself.
pub const SELF_ANCHOR: &str = "SELF";

static REFERENCE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\$([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)(.*)$")
        .expect("reference token pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static REFERENCE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("reference path pattern is valid")
});

/// Dotted path to another field, interpreted relative to a context instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    path: String,
}

impl Reference {
    pub fn parse(path: &str) -> Result<Self> {
        if !REFERENCE_PATH.is_match(path) {
            return Err(Error::InvalidReference(format!(
                "'{path}' is not a dotted field path"
            )));
        }
        Ok(Self {
            path: path.to_string(),
        })
    }

    /// Reference to the context instance as a whole.
    pub fn self_anchor() -> Self {
        Self {
            path: SELF_ANCHOR.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Literal(String),
    Reference(Reference),
}

/// Parsed dynamic expression: literal text interleaved with references.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    pieces: Vec<Piece>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let mut pieces = Vec::new();
        let mut literal = String::new();

        let mut tokens = Vec::new();
        let mut start = 0;
        for separator in WHITESPACE.find_iter(source) {
            tokens.push((&source[start..separator.start()], separator.as_str()));
            start = separator.end();
        }
        tokens.push((&source[start..], ""));

        for (token, separator) in tokens {
            if !token.starts_with('$') {
                literal.push_str(token);
                literal.push_str(separator);
                continue;
            }

            let captures = REFERENCE_TOKEN.captures(token).ok_or_else(|| {
                Error::InvalidReference(format!(
                    "malformed reference token '{token}' in expression '{source}'"
                ))
            })?;
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Reference(Reference {
                path: captures[1].to_string(),
            }));
            literal.push_str(&captures[2]);
            literal.push_str(separator);
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    /// Expression consisting of a single reference.
    pub fn from_reference(reference: Reference) -> Self {
        Self {
            source: reference.to_string(),
            pieces: vec![Piece::Reference(reference)],
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Reference(reference) => Some(reference),
            Piece::Literal(_) => None,
        })
    }

    /// The reference when the whole expression is exactly one `$` token.
    pub fn sole_reference(&self) -> Option<&Reference> {
        match self.pieces.as_slice() {
            [Piece::Reference(reference)] => Some(reference),
            _ => None,
        }
    }

    /// Substitute references through `lookup`.
    ///
    /// A sole reference yields the referenced value unchanged; anything else
    /// is rendered to text.
    pub fn render<E, F>(&self, mut lookup: F) -> std::result::Result<Value, E>
    where
        F: FnMut(&Reference) -> std::result::Result<Value, E>,
    {
        if let Some(reference) = self.sole_reference() {
            return lookup(reference);
        }

        let mut text = String::with_capacity(self.source.len());
        for piece in &self.pieces {
            match piece {
                Piece::Literal(literal) => text.push_str(literal),
                Piece::Reference(reference) => text.push_str(&lookup(reference)?.to_string()),
            }
        }
        Ok(Value::Text(text))
    }
}

impl std::str::FromStr for Expression {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        Expression::parse(source)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

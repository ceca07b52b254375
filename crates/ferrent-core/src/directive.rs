//! Field directives.
//!
//! Directives are written as a semicolon-delimited string on a field:
//!
//! ```ignore
//! #[orm("pk;not_incr")]
//! #[orm("unique;default:'active'")]
//! #[orm("index(n:by_owner f:lower, n:by_name unique)")]
//! ```
//!
//! Supported tokens: `pk`, `not_incr`, `default:<expr>`, `unique`, `index`,
//! `index(...)`, `type:<override>`, `schema` and `o2m`.

use std::sync::LazyLock;

use regex::Regex;

static INDEX_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^index\((?P<body>.*)\)$").expect("Invalid index list regex"));

/// One entry of an `index(...)` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDirective {
    /// `n:<name>`; the index name without the table prefix.
    pub name: Option<String>,
    /// Whether the entry carries `unique`.
    pub unique: bool,
    /// `f:<func>`, lowercased.
    pub function: Option<String>,
}

/// Parsed directives of a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// `pk`
    pub primary_key: bool,
    /// `not_incr`
    pub not_incr: bool,
    /// `default:<expr>`
    pub default: Option<String>,
    /// `unique`
    pub unique: bool,
    /// `index`
    pub index: bool,
    /// Entries of every `index(...)` token, in declaration order.
    pub indexes: Vec<IndexDirective>,
    /// `type:<override>` with whitespace removed.
    pub type_override: Option<String>,
    /// `schema`
    pub schema: bool,
    /// `o2m`
    pub one_to_many: bool,
}

/// A directive token that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveError {
    /// The offending token.
    pub directive: String,
    /// Why it was rejected.
    pub reason: String,
}

impl DirectiveError {
    fn new(directive: &str, reason: impl Into<String>) -> Self {
        Self {
            directive: directive.to_string(),
            reason: reason.into(),
        }
    }
}

impl Directives {
    /// Parses a directive string. Empty tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectiveError`] for unknown tokens, empty `default:` or
    /// `type:` values and malformed `index(...)` lists.
    pub fn parse(raw: &str) -> Result<Self, DirectiveError> {
        let mut directives = Self::default();
        for token in raw.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            match token {
                "pk" => directives.primary_key = true,
                "not_incr" => directives.not_incr = true,
                "unique" => directives.unique = true,
                "index" => directives.index = true,
                "schema" => directives.schema = true,
                "o2m" => directives.one_to_many = true,
                _ => directives.parse_valued(token)?,
            }
        }
        Ok(directives)
    }

    fn parse_valued(&mut self, token: &str) -> Result<(), DirectiveError> {
        if let Some(expr) = token.strip_prefix("default:") {
            let expr = expr.trim();
            if expr.is_empty() {
                return Err(DirectiveError::new(token, "default expression is empty"));
            }
            self.default = Some(expr.to_string());
        } else if let Some(ty) = token.strip_prefix("type:") {
            let ty: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
            if ty.is_empty() {
                return Err(DirectiveError::new(token, "type override is empty"));
            }
            self.type_override = Some(ty);
        } else if token.starts_with("index(") {
            let captures = INDEX_LIST
                .captures(token)
                .ok_or_else(|| DirectiveError::new(token, "unterminated index list"))?;
            for entry in captures["body"].split(',').map(str::trim) {
                if entry.is_empty() {
                    continue;
                }
                self.indexes.push(parse_index_entry(token, entry)?);
            }
        } else {
            return Err(DirectiveError::new(token, "unknown directive"));
        }
        Ok(())
    }
}

fn parse_index_entry(token: &str, entry: &str) -> Result<IndexDirective, DirectiveError> {
    let mut index = IndexDirective::default();
    for part in entry.split_whitespace() {
        if part == "unique" {
            index.unique = true;
        } else if let Some(name) = part.strip_prefix("n:") {
            if name.is_empty() {
                return Err(DirectiveError::new(token, "index name is empty"));
            }
            index.name = Some(name.to_string());
        } else if let Some(function) = part.strip_prefix("f:") {
            if function.is_empty() {
                return Err(DirectiveError::new(token, "index function is empty"));
            }
            index.function = Some(function.to_lowercase());
        } else {
            return Err(DirectiveError::new(
                token,
                format!("unknown index option `{part}`"),
            ));
        }
    }
    Ok(index)
}

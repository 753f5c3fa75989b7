//! The flat, link-addressed document shape.
//!
//! A [`Document`] maps object links to entries. Entries are records of
//! serialized values, sequences (the array form), or, only under the root
//! link, a bare serialized value when the encoded root was not compound.
//! The types are plain serde data so any structured format can carry them.

use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use vellum_core::error::EngineError;

/// The link of the document root.
pub const ROOT_LINK: &str = "";

/// Record key that stands for the object's class link. A genuine field
/// with this name is stored under [`CONSTRUCTOR_FIELD`] instead.
pub const CLASS_FIELD: &str = "";

/// Reserved record key that carries a genuine `""` field.
pub const CONSTRUCTOR_FIELD: &str = "constructor";

/// One JSON-compatible serialized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedValue {
    /// `null`.
    Null,
    /// A boolean, as-is.
    Bool(bool),
    /// A finite number, as-is.
    Number(f64),
    /// Any tagged string: text, big integer, singleton, symbol or link.
    Tag(String),
}

impl SerializedValue {
    /// Builds the tag form of `tag`.
    #[must_use]
    pub fn tag(tag: &Tag<'_>) -> Self {
        Self::Tag(tag.to_string())
    }

    /// Whether this is the root link `""`.
    #[must_use]
    pub fn is_root_link(&self) -> bool {
        matches!(self, Self::Tag(tag) if tag.is_empty())
    }
}

/// A decoded view of a tagged string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag<'a> {
    /// The root link `""`.
    RootLink,
    /// A non-root object link, including its leading `.`.
    Link(&'a str),
    /// `_` + text.
    String(&'a str),
    /// `rs` + symbol key.
    Symbol(&'a str),
    /// `s` + registry name.
    Singleton(&'a str),
    /// `b` + optional `-` + decimal digits, of any length.
    BigInt(BigInt),
}

impl<'a> Tag<'a> {
    /// Parses a tagged string.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::MalformedDocument` for an unrecognised prefix or
    /// a big integer whose digits do not parse.
    pub fn parse(raw: &'a str) -> Result<Self, EngineError> {
        if raw.is_empty() {
            return Ok(Self::RootLink);
        }
        if raw.starts_with('.') {
            return Ok(Self::Link(raw));
        }
        if let Some(text) = raw.strip_prefix('_') {
            return Ok(Self::String(text));
        }
        if let Some(key) = raw.strip_prefix("rs") {
            return Ok(Self::Symbol(key));
        }
        if let Some(name) = raw.strip_prefix('s') {
            return Ok(Self::Singleton(name));
        }
        if let Some(digits) = raw.strip_prefix('b') {
            let invalid =
                || EngineError::MalformedDocument(format!("invalid big integer tag `{raw}`"));
            let magnitude = digits.strip_prefix('-').unwrap_or(digits);
            if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            return digits.parse::<BigInt>().map(Self::BigInt).map_err(|_| invalid());
        }
        Err(EngineError::MalformedDocument(format!(
            "unrecognised value tag `{raw}`"
        )))
    }
}

impl std::fmt::Display for Tag<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootLink => Ok(()),
            Self::Link(link) => f.write_str(link),
            Self::String(text) => write!(f, "_{text}"),
            Self::Symbol(key) => write!(f, "rs{key}"),
            Self::Singleton(name) => write!(f, "s{name}"),
            Self::BigInt(n) => write!(f, "b{n}"),
        }
    }
}

/// One document entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedEntry {
    /// An object: the class link under `""`, then its fields.
    Record(IndexMap<String, SerializedValue>),
    /// An array, element by element.
    Sequence(Vec<SerializedValue>),
    /// A non-compound root.
    Value(SerializedValue),
}

/// Link-addressed document, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    entries: IndexMap<String, SerializedEntry>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry under `link`.
    #[must_use]
    pub fn get(&self, link: &str) -> Option<&SerializedEntry> {
        self.entries.get(link)
    }

    /// The root entry.
    #[must_use]
    pub fn root(&self) -> Option<&SerializedEntry> {
        self.get(ROOT_LINK)
    }

    /// Inserts or replaces an entry. Replacing keeps the original position.
    pub fn insert(&mut self, link: impl Into<String>, entry: SerializedEntry) {
        self.entries.insert(link.into(), entry);
    }

    /// Whether `link` has an entry.
    #[must_use]
    pub fn contains(&self, link: &str) -> bool {
        self.entries.contains_key(link)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SerializedEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Escapes `\` and `.` in a field name so it can extend a link.
#[must_use]
pub fn escape_field(field: &str) -> String {
    field.replace('\\', "\\\\").replace('.', "\\.")
}

/// The link of `field` inside the compound at `parent`.
#[must_use]
pub fn child_link(parent: &str, field: &str) -> String {
    format!("{parent}.{}", escape_field(field))
}

//! Output syntaxes
//!
//! Every input renders to a [`TokenStream`](crate::tokens::TokenStream)
//! first. [`prettyprint`] turns a stream into indented text; [`nn_serialize`]
//! turns it into words with entity placeholders. [`serialize`] picks the
//! stream (current or legacy syntax) and the renderer for a [`SyntaxType`].

pub mod error;
pub mod nn;
pub mod prettyprint;

pub use error::SerializeError;
pub use nn::nn_serialize;
pub use prettyprint::prettyprint;

use crate::ast::Input;
use crate::config::runtime::SerializationPreferences;
use crate::entities::{AbstractEntityRetriever, SequentialEntityAllocator};
use crate::logging::codes;
use chrono::{DateTime, FixedOffset, Utc};

/// First version whose syntax is the current one
const CURRENT_SYNTAX_VERSION: (u32, u32, u32) = (2, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxType {
    /// Legacy textual syntax
    Legacy,
    /// Legacy syntax, tokenized with entity placeholders
    LegacyNN,
    /// Current textual syntax
    Normal,
    /// Current syntax, tokenized with entity placeholders
    Tokenized,
}

impl SyntaxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxType::Legacy => "legacy",
            SyntaxType::LegacyNN => "legacy-nn",
            SyntaxType::Normal => "normal",
            SyntaxType::Tokenized => "tokenized",
        }
    }

    fn is_tokenized(&self) -> bool {
        matches!(self, SyntaxType::LegacyNN | SyntaxType::Tokenized)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializeOptions {
    /// Version of the consumer; below 2.0.0 the legacy syntax is produced
    pub compatibility: Option<String>,
    /// Offset used to resolve relative dates when allocating entities
    pub timezone: Option<FixedOffset>,
    /// Instant relative dates (`$now`, `$start_of(day)`) resolve against;
    /// the current time when unset
    pub now: Option<DateTime<FixedOffset>>,
    pub include_entity_value: bool,
    /// Write quoted strings inline instead of as placeholders
    pub explicit_strings: bool,
}

impl From<&SerializationPreferences> for SerializeOptions {
    fn from(preferences: &SerializationPreferences) -> Self {
        Self {
            compatibility: preferences.default_compatibility.clone(),
            timezone: None,
            now: None,
            include_entity_value: preferences.include_entity_value,
            explicit_strings: preferences.explicit_strings,
        }
    }
}

impl SerializeOptions {
    /// Reference instant for entity equality and allocation, in `timezone` when set
    pub fn reference_time(&self) -> DateTime<FixedOffset> {
        let now = self.now.unwrap_or_else(|| Utc::now().fixed_offset());
        match self.timezone {
            Some(offset) => now.with_timezone(&offset),
            None => now,
        }
    }

    fn wants_legacy(&self) -> bool {
        match &self.compatibility {
            None => false,
            Some(version) => match parse_version(version) {
                Some(version) => version < CURRENT_SYNTAX_VERSION,
                None => {
                    crate::log_warning!("Ignoring unparsable compatibility version", "version" => version);
                    false
                }
            },
        }
    }
}

/// `major[.minor[.patch]]`, ignoring any pre-release suffix
fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let core = version.trim().split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Serialized {
    Text(String),
    Tokens(Vec<String>),
}

impl Serialized {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Serialized::Text(text) => Some(text),
            Serialized::Tokens(_) => None,
        }
    }

    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            Serialized::Text(_) => None,
            Serialized::Tokens(tokens) => Some(tokens),
        }
    }
}

/// Serialize `input` in the given syntax.
///
/// Tokenized syntaxes resolve constants with `retriever`; without one, a
/// fresh [`SequentialEntityAllocator`] numbers entities in order of appearance.
pub fn serialize(
    input: &Input,
    syntax: SyntaxType,
    retriever: Option<&mut dyn AbstractEntityRetriever>,
    options: &SerializeOptions,
) -> Result<Serialized, SerializeError> {
    crate::log_debug!(
        "Serializing input",
        "kind" => input.kind(),
        "syntax" => syntax.as_str()
    );

    let legacy = matches!(syntax, SyntaxType::Legacy | SyntaxType::LegacyNN) || options.wants_legacy();
    let stream = if legacy {
        input.to_legacy_source()?
    } else {
        input.to_source()
    };

    if !syntax.is_tokenized() {
        let text = prettyprint(&stream);
        crate::log_success!(
            codes::success::SERIALIZATION_COMPLETE,
            "Serialization complete",
            "syntax" => syntax.as_str(),
            "length" => text.len()
        );
        return Ok(Serialized::Text(text));
    }

    let tokens = match retriever {
        Some(retriever) => nn_serialize(&stream, retriever, options.include_entity_value)?,
        None => {
            let mut allocator = SequentialEntityAllocator::default()
                .with_explicit_strings(options.explicit_strings)
                .with_now(options.reference_time());
            nn_serialize(&stream, &mut allocator, options.include_entity_value)?
        }
    };
    Ok(Serialized::Tokens(tokens))
}

//! Mapping values back to entity tokens

use super::error::{EntityError, EntityResult};
use super::{describe, entities_equal, entity_type_of, string_entity_type, string_of, EntityMap};
use crate::ast::values::{format_number, Value};
use crate::serialize::SerializeOptions;
use chrono::{DateTime, FixedOffset, Utc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindEntityOptions {
    /// Return `Ok(None)` instead of failing when nothing matches
    pub ignore_not_found: bool,
    /// Spell out the value of generic entities next to their display name
    pub include_entity_value: bool,
}

impl FindEntityOptions {
    pub fn ignoring_not_found(self) -> Self {
        Self {
            ignore_not_found: true,
            ..self
        }
    }
}

/// Strategy turning constant values into surface tokens.
///
/// Implementors provide `find_literal`, the type-specific lookup;
/// `find_entity` layers the number conventions on top of it.
pub trait AbstractEntityRetriever {
    fn find_literal(
        &mut self,
        entity_type: &str,
        value: &Value,
        options: FindEntityOptions,
    ) -> EntityResult<Option<Vec<String>>>;

    /// Known entities, rendered for error messages
    fn known_entities(&self) -> String {
        String::new()
    }

    fn find_entity(
        &mut self,
        entity_type: &str,
        value: &Value,
        options: FindEntityOptions,
    ) -> EntityResult<Option<Vec<String>>> {
        let found = match (entity_type, value) {
            ("NUMBER", Value::Number(n)) => self.find_number(*n, options)?,
            _ => self.find_literal(entity_type, value, options)?,
        };
        match found {
            Some(tokens) => Ok(Some(tokens)),
            None if options.ignore_not_found => Ok(None),
            None => Err(EntityError::not_found(
                entity_type,
                &value.to_source().to_string(),
                &self.known_entities(),
            )),
        }
    }

    /// Numbers: small integers are bare tokens, negative numbers are a
    /// minus sign before their magnitude, years may match in short form
    fn find_number(&mut self, n: f64, options: FindEntityOptions) -> EntityResult<Option<Vec<String>>> {
        let is_integer = n.fract() == 0.0;
        if is_integer && (0.0..=12.0).contains(&n) {
            return Ok(Some(vec![format_number(n)]));
        }
        if n < 0.0 {
            if let Some(mut tokens) = self.find_number(-n, options.ignoring_not_found())? {
                tokens.insert(0, "-".to_string());
                return Ok(Some(tokens));
            }
        }
        if is_integer && (1950.0..=2050.0).contains(&n) {
            let quiet = options.ignoring_not_found();
            if let Some(tokens) = self.find_literal("NUMBER", &Value::Number(n), quiet)? {
                return Ok(Some(tokens));
            }
            let short = n % 100.0;
            if let Some(tokens) = self.find_literal("NUMBER", &Value::Number(short), quiet)? {
                return Ok(Some(tokens));
            }
            if short <= 12.0 {
                return Ok(Some(vec![format_number(short)]));
            }
        }
        self.find_literal("NUMBER", &Value::Number(n), options)
    }
}

/// Retriever for a known sentence and entity map.
///
/// A value mentioned verbatim in the sentence is copied from it; otherwise
/// the entity map is searched for an equal entity of the same type.
#[derive(Debug, Clone)]
pub struct EntityRetriever {
    sentence: Vec<String>,
    entities: EntityMap,
    explicit_strings: bool,
    now: DateTime<FixedOffset>,
}

impl EntityRetriever {
    pub fn new(sentence: &str, entities: EntityMap) -> Self {
        Self {
            sentence: sentence.split_whitespace().map(str::to_string).collect(),
            entities,
            explicit_strings: false,
            now: Utc::now().fixed_offset(),
        }
    }

    /// Quoted strings must be copied from the sentence, never from the map
    pub fn with_explicit_strings(mut self, explicit_strings: bool) -> Self {
        self.explicit_strings = explicit_strings;
        self
    }

    /// Reference instant for relative dates
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    /// Reference instant and string handling taken from serialization options
    pub fn with_options(self, options: &SerializeOptions) -> Self {
        self.with_now(options.reference_time())
            .with_explicit_strings(options.explicit_strings)
    }

    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }

    fn sentence_contains(&self, words: &[&str]) -> bool {
        !words.is_empty()
            && self
                .sentence
                .windows(words.len())
                .any(|window| window.iter().zip(words).all(|(a, b)| a.eq_ignore_ascii_case(b)))
    }

    fn find_in_sentence(
        &self,
        entity_type: &str,
        value: &Value,
        options: FindEntityOptions,
    ) -> Option<Vec<String>> {
        if let Value::Number(n) = value {
            let number = format_number(*n);
            return self.sentence_contains(&[number.as_str()]).then(|| vec![number]);
        }
        if let Some(kind) = string_entity_type(entity_type) {
            let text = string_of(value)?;
            let words: Vec<&str> = text.split_whitespace().collect();
            if !self.sentence_contains(&words) {
                return None;
            }
            let mut tokens = quoted(&words);
            if !kind.is_empty() {
                tokens.push(format!("^^{}", kind));
            }
            return Some(tokens);
        }
        if let (Some(kind), Value::Entity(entity)) =
            (entity_type.strip_prefix("GENERIC_ENTITY_"), value)
        {
            let display = entity.display.as_deref()?;
            let words: Vec<&str> = display.split_whitespace().collect();
            if !self.sentence_contains(&words) {
                return None;
            }
            let mut tokens = quoted(&words);
            tokens.push(format!("^^{}", kind));
            if let (true, Some(id)) = (options.include_entity_value, &entity.value) {
                tokens.push("(".to_string());
                tokens.extend(quoted(&[id.as_str()]));
                tokens.push(")".to_string());
            }
            return Some(tokens);
        }
        None
    }

    fn find_in_map(&self, entity_type: &str, value: &Value) -> Option<Vec<String>> {
        self.entities
            .iter()
            .find(|(key, entity)| {
                entity_type_of(key) == entity_type && entities_equal(entity_type, value, entity, self.now)
            })
            .map(|(key, _)| vec![key.clone()])
    }
}

pub(crate) fn quoted(words: &[&str]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(words.len() + 2);
    tokens.push("\"".to_string());
    tokens.extend(words.iter().map(|word| word.to_string()));
    tokens.push("\"".to_string());
    tokens
}

impl AbstractEntityRetriever for EntityRetriever {
    fn find_literal(
        &mut self,
        entity_type: &str,
        value: &Value,
        options: FindEntityOptions,
    ) -> EntityResult<Option<Vec<String>>> {
        if let Some(tokens) = self.find_in_sentence(entity_type, value, options) {
            return Ok(Some(tokens));
        }
        if self.explicit_strings && entity_type == "QUOTED_STRING" {
            return Ok(None);
        }
        Ok(self.find_in_map(entity_type, value))
    }

    fn known_entities(&self) -> String {
        describe(&self.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::values::{DateValue, EntityValue};
    use crate::entities::AnyEntity;
    use assert_matches::assert_matches;

    fn retriever() -> EntityRetriever {
        let mut entities = EntityMap::new();
        entities.insert("NUMBER_0".into(), AnyEntity::Number(42.0));
        entities.insert("NUMBER_1".into(), AnyEntity::Number(1999.0));
        entities.insert("QUOTED_STRING_0".into(), AnyEntity::String("hello world".into()));
        entities.insert(
            "GENERIC_ENTITY_tt:device_0".into(),
            AnyEntity::Generic {
                value: Some("com.twitter".into()),
                display: Some("Twitter".into()),
            },
        );
        EntityRetriever::new("post on twitter a tweet saying NUMBER_0 times", entities)
    }

    #[test]
    fn test_numbers() {
        let mut retriever = retriever();
        let options = FindEntityOptions::default();
        assert_eq!(
            retriever.find_entity("NUMBER", &Value::Number(3.0), options).unwrap(),
            Some(vec!["3".to_string()])
        );
        assert_eq!(
            retriever.find_entity("NUMBER", &Value::Number(42.0), options).unwrap(),
            Some(vec!["NUMBER_0".to_string()])
        );
        assert_eq!(
            retriever.find_entity("NUMBER", &Value::Number(-42.0), options).unwrap(),
            Some(vec!["-".to_string(), "NUMBER_0".to_string()])
        );
        assert_eq!(
            retriever.find_entity("NUMBER", &Value::Number(1999.0), options).unwrap(),
            Some(vec!["NUMBER_1".to_string()])
        );
        assert_eq!(
            retriever.find_entity("NUMBER", &Value::Number(2005.0), options).unwrap(),
            Some(vec!["5".to_string()])
        );
    }

    #[test]
    fn test_relative_dates_use_reference_time() {
        let instant = DateTime::parse_from_rfc3339("2024-05-15T10:30:45+02:00").unwrap();
        let mut entities = EntityMap::new();
        entities.insert("DATE_0".into(), AnyEntity::String(instant.to_rfc3339()));
        let now = Value::Date(DateValue::Now);

        let options = SerializeOptions {
            now: Some(instant),
            timezone: FixedOffset::east_opt(3600),
            ..SerializeOptions::default()
        };
        let mut retriever = EntityRetriever::new("remind me now", entities.clone()).with_options(&options);
        for _ in 0..2 {
            assert_eq!(
                retriever.find_entity("DATE", &now, FindEntityOptions::default()).unwrap(),
                Some(vec!["DATE_0".to_string()])
            );
        }

        let later = SerializeOptions {
            now: Some(instant + chrono::Duration::hours(1)),
            ..SerializeOptions::default()
        };
        let mut retriever = EntityRetriever::new("remind me now", entities).with_options(&later);
        assert_matches!(
            retriever.find_entity("DATE", &now, FindEntityOptions::default()),
            Err(EntityError::NotFound { .. })
        );
    }

    #[test]
    fn test_sentence_before_map() {
        let mut retriever = retriever();
        let options = FindEntityOptions::default();
        let device = Value::Entity(EntityValue::new(Some("com.twitter"), "tt:device", Some("twitter")));
        assert_eq!(
            retriever
                .find_entity("GENERIC_ENTITY_tt:device", &device, options)
                .unwrap(),
            Some(vec!["\"".into(), "twitter".into(), "\"".into(), "^^tt:device".into()])
        );

        let string = Value::String("hello world".into());
        assert_eq!(
            retriever.find_entity("QUOTED_STRING", &string, options).unwrap(),
            Some(vec!["QUOTED_STRING_0".to_string()])
        );

        let mut explicit = retriever.with_explicit_strings(true);
        assert_matches!(
            explicit.find_entity("QUOTED_STRING", &string, options),
            Err(EntityError::NotFound { .. })
        );
        assert_eq!(
            explicit
                .find_entity("QUOTED_STRING", &string, options.ignoring_not_found())
                .unwrap(),
            None
        );
    }
}

//! Allocation of fresh entity placeholders

use super::error::{EntityError, EntityResult};
use super::retriever::{quoted, AbstractEntityRetriever, FindEntityOptions};
use super::{describe, entities_equal, entity_type_of, AnyEntity, EntityMap};
use crate::ast::values::Value;
use crate::config::compile_time::entities::MAX_ENTITIES_PER_TYPE;
use crate::logging::codes;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeMap;

/// Retriever that never fails: values it has not seen get the next free
/// placeholder of their type (`NUMBER_0`, `NUMBER_1`, ...), values it has
/// seen get their existing placeholder back.
#[derive(Debug, Clone)]
pub struct SequentialEntityAllocator {
    offsets: BTreeMap<String, usize>,
    entities: EntityMap,
    explicit_strings: bool,
    now: DateTime<FixedOffset>,
}

impl SequentialEntityAllocator {
    /// Start from an existing entity map; numbering continues after its entries
    pub fn new(entities: EntityMap) -> Self {
        let mut offsets: BTreeMap<String, usize> = BTreeMap::new();
        for key in entities.keys() {
            let next = key
                .rsplit_once('_')
                .and_then(|(_, n)| n.parse::<usize>().ok())
                .map(|n| n + 1)
                .unwrap_or(0);
            let offset = offsets.entry(entity_type_of(key).to_string()).or_insert(0);
            *offset = (*offset).max(next);
        }
        Self {
            offsets,
            entities,
            explicit_strings: false,
            now: Utc::now().fixed_offset(),
        }
    }

    /// Write quoted strings inline instead of allocating placeholders for them
    pub fn with_explicit_strings(mut self, explicit_strings: bool) -> Self {
        self.explicit_strings = explicit_strings;
        self
    }

    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }

    pub fn into_entities(self) -> EntityMap {
        self.entities
    }

    pub fn reset(&mut self) {
        self.offsets.clear();
        self.entities.clear();
    }

    fn existing(&self, entity_type: &str, value: &Value) -> Option<String> {
        self.entities
            .iter()
            .find(|(key, entity)| {
                entity_type_of(key) == entity_type && entities_equal(entity_type, value, entity, self.now)
            })
            .map(|(key, _)| key.clone())
    }

    fn allocate(&mut self, entity_type: &str, value: &Value) -> EntityResult<String> {
        let entity = AnyEntity::from_value(entity_type, value, self.now)?;
        let offset = self.offsets.entry(entity_type.to_string()).or_insert(0);
        if *offset >= MAX_ENTITIES_PER_TYPE {
            return Err(EntityError::limit_exceeded(entity_type, MAX_ENTITIES_PER_TYPE));
        }
        let key = format!("{}_{}", entity_type, offset);
        *offset += 1;
        self.entities.insert(key.clone(), entity);
        crate::log_debug!("Allocated entity", "entity" => &key);
        Ok(key)
    }
}

impl Default for SequentialEntityAllocator {
    fn default() -> Self {
        Self::new(EntityMap::new())
    }
}

impl AbstractEntityRetriever for SequentialEntityAllocator {
    fn find_literal(
        &mut self,
        entity_type: &str,
        value: &Value,
        _options: FindEntityOptions,
    ) -> EntityResult<Option<Vec<String>>> {
        if self.explicit_strings && entity_type == "QUOTED_STRING" {
            if let Value::String(s) = value {
                let words: Vec<&str> = s.split_whitespace().collect();
                return Ok(Some(quoted(&words)));
            }
        }
        if let Some(key) = self.existing(entity_type, value) {
            return Ok(Some(vec![key]));
        }
        let key = self.allocate(entity_type, value)?;
        crate::log_success!(
            codes::success::ENTITY_ALLOCATED,
            "New entity placeholder",
            "entity" => &key
        );
        Ok(Some(vec![key]))
    }

    fn known_entities(&self) -> String {
        describe(&self.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn find(allocator: &mut SequentialEntityAllocator, entity_type: &str, value: Value) -> Vec<String> {
        allocator
            .find_entity(entity_type, &value, FindEntityOptions::default())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_reuses_allocated_entities() {
        let mut allocator = SequentialEntityAllocator::default();
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(42.0)), vec!["NUMBER_0"]);
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(42.0)), vec!["NUMBER_0"]);
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(43.0)), vec!["NUMBER_1"]);
        assert_eq!(
            find(&mut allocator, "QUOTED_STRING", Value::String("hi".into())),
            vec!["QUOTED_STRING_0"]
        );
        assert_eq!(allocator.entities()["NUMBER_1"], AnyEntity::Number(43.0));
    }

    #[test]
    fn test_small_numbers_are_not_allocated() {
        let mut allocator = SequentialEntityAllocator::default();
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(7.0)), vec!["7"]);
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(-20.0)), vec!["-", "NUMBER_0"]);
        assert!(allocator.entities().contains_key("NUMBER_0"));
        assert_eq!(allocator.entities().len(), 1);
    }

    #[test]
    fn test_continues_after_existing_entries() {
        let mut entities = EntityMap::new();
        entities.insert("NUMBER_3".into(), AnyEntity::Number(100.0));
        let mut allocator = SequentialEntityAllocator::new(entities);
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(100.0)), vec!["NUMBER_3"]);
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(200.0)), vec!["NUMBER_4"]);
    }

    #[test]
    fn test_reset_and_explicit_strings() {
        let mut allocator = SequentialEntityAllocator::default();
        find(&mut allocator, "NUMBER", Value::Number(42.0));
        allocator.reset();
        assert!(allocator.entities().is_empty());
        assert_eq!(find(&mut allocator, "NUMBER", Value::Number(99.0)), vec!["NUMBER_0"]);

        let mut explicit = SequentialEntityAllocator::default().with_explicit_strings(true);
        assert_eq!(
            find(&mut explicit, "QUOTED_STRING", Value::String("hello world".into())),
            vec!["\"", "hello", "world", "\""]
        );
        assert!(explicit.entities().is_empty());
    }

    #[test]
    fn test_relative_values_cannot_be_allocated() {
        let mut allocator = SequentialEntityAllocator::default();
        let relative = Value::Location(crate::ast::values::LocationValue::Relative("home".into()));
        assert_matches!(
            allocator.find_entity("LOCATION", &relative, FindEntityOptions::default()),
            Err(EntityError::InvalidValue { .. })
        );
    }
}

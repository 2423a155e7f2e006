//! Tokenized ("NN") serialization
//!
//! Layout directives are dropped, literals are split into words and every
//! constant is replaced by the tokens an entity retriever chooses for it.

use super::error::SerializeError;
use crate::ast::values::{format_number, LocationValue, TimeValue, Value};
use crate::config::compile_time::serialization::MAX_TOKENS;
use crate::entities::{AbstractEntityRetriever, FindEntityOptions};
use crate::logging::codes;
use crate::tokens::{ConstantToken, Token, TokenStream};

/// Serialize `stream` as a list of words, resolving constants with `retriever`
pub fn nn_serialize(
    stream: &TokenStream,
    retriever: &mut dyn AbstractEntityRetriever,
    include_entity_value: bool,
) -> Result<Vec<String>, SerializeError> {
    crate::log_debug!("Serializing token stream", "tokens" => stream.len());

    let options = FindEntityOptions {
        ignore_not_found: false,
        include_entity_value,
    };
    let mut output = Vec::new();
    for token in stream {
        match token {
            Token::Layout(_) => {}
            Token::Literal(text) => output.extend(text.split_whitespace().map(str::to_string)),
            Token::Constant(constant) => {
                output.extend(constant_tokens(constant, retriever, options)?);
            }
        }
        if output.len() > MAX_TOKENS {
            return Err(SerializeError::token_limit_exceeded(output.len(), MAX_TOKENS));
        }
    }

    crate::log_success!(
        codes::success::SERIALIZATION_COMPLETE,
        "Tokenized serialization complete",
        "tokens" => output.len()
    );
    Ok(output)
}

fn constant_tokens(
    constant: &ConstantToken,
    retriever: &mut dyn AbstractEntityRetriever,
    options: FindEntityOptions,
) -> Result<Vec<String>, SerializeError> {
    let entity_type = constant.entity_type();
    match &constant.value {
        // A measure is either a whole entity or a number followed by its unit
        Value::Measure(measure) => {
            if let Some(tokens) =
                retriever.find_entity(&entity_type, &constant.value, options.ignoring_not_found())?
            {
                return Ok(tokens);
            }
            let mut tokens = number_tokens(measure.value, retriever, options)?;
            tokens.push(format!("unit:{}", measure.unit));
            Ok(tokens)
        }
        Value::Currency(currency) => {
            if let Some(tokens) =
                retriever.find_entity(&entity_type, &constant.value, options.ignoring_not_found())?
            {
                return Ok(tokens);
            }
            let mut tokens = number_tokens(currency.value, retriever, options)?;
            tokens.push(format!("unit:${}", currency.code));
            Ok(tokens)
        }
        Value::Location(LocationValue::Unresolved { name }) => {
            if let Some(tokens) =
                retriever.find_entity(&entity_type, &constant.value, options.ignoring_not_found())?
            {
                return Ok(tokens);
            }
            let mut tokens = words(&["new", "Location", "(", "\""]);
            tokens.extend(name.split_whitespace().map(str::to_string));
            tokens.extend(words(&["\"", ")"]));
            Ok(tokens)
        }
        Value::Time(TimeValue::Absolute {
            hour,
            minute,
            second,
        }) => {
            if let Some(tokens) =
                retriever.find_entity(&entity_type, &constant.value, options.ignoring_not_found())?
            {
                return Ok(tokens);
            }
            let mut tokens = words(&["new", "Time", "("]);
            tokens.push(hour.to_string());
            tokens.push(",".to_string());
            tokens.push(minute.to_string());
            if *second != 0 {
                tokens.push(",".to_string());
                tokens.push(second.to_string());
            }
            tokens.push(")".to_string());
            Ok(tokens)
        }
        value => match retriever.find_entity(&entity_type, value, options)? {
            Some(tokens) => Ok(tokens),
            None => Ok(constant.render().split_whitespace().map(str::to_string).collect()),
        },
    }
}

fn number_tokens(
    n: f64,
    retriever: &mut dyn AbstractEntityRetriever,
    options: FindEntityOptions,
) -> Result<Vec<String>, SerializeError> {
    Ok(retriever
        .find_entity("NUMBER", &Value::Number(n), options)?
        .unwrap_or_else(|| vec![format_number(n)]))
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AnyEntity, EntityError, EntityMap, EntityRetriever, SequentialEntityAllocator};
    use crate::tokens;
    use crate::tokens::LayoutToken;
    use assert_matches::assert_matches;

    #[test]
    fn test_constants_become_placeholders() {
        let stream = tokens![
            "@com.twitter.post",
            "(",
            "status",
            "=",
            Value::String("hello".into()).to_source(),
            ",",
            "count",
            "=",
            Value::Number(42.0).to_source(),
            ")",
            LayoutToken::Newline,
            ";"
        ];
        let mut allocator = SequentialEntityAllocator::default();
        let output = nn_serialize(&stream, &mut allocator, false).unwrap();
        assert_eq!(
            output.join(" "),
            "@com.twitter.post ( status = QUOTED_STRING_0 , count = NUMBER_0 ) ;"
        );
    }

    #[test]
    fn test_measure_falls_back_to_number_and_unit() {
        let stream = Value::measure(20.0, "C").to_source();
        let mut entities = EntityMap::new();
        entities.insert("NUMBER_0".into(), AnyEntity::Number(20.0));
        let mut retriever = EntityRetriever::new("it is NUMBER_0 degrees", entities);
        let output = nn_serialize(&stream, &mut retriever, false).unwrap();
        assert_eq!(output, vec!["NUMBER_0", "unit:C"]);

        let small = Value::measure(5.0, "km").to_source();
        let output = nn_serialize(&small, &mut retriever, false).unwrap();
        assert_eq!(output, vec!["5", "unit:km"]);
    }

    #[test]
    fn test_missing_entity_fails() {
        let stream = Value::String("not there".into()).to_source();
        let mut retriever = EntityRetriever::new("nothing here", EntityMap::new());
        assert_matches!(
            nn_serialize(&stream, &mut retriever, false),
            Err(SerializeError::Entity(EntityError::NotFound { .. }))
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let stream = tokens![Value::Number(99.0).to_source(), Value::Number(100.0).to_source()];
        let first = nn_serialize(&stream, &mut SequentialEntityAllocator::default(), false).unwrap();
        let second = nn_serialize(&stream, &mut SequentialEntityAllocator::default(), false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["NUMBER_0", "NUMBER_1"]);
    }
}

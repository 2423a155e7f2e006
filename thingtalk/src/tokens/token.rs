//! Token definitions

use crate::ast::values::{
    format_number, DateValue, EntityValue, LocationValue, TimeValue, Value,
};
use std::fmt;

/// Layout directives interpreted by the pretty printer and ignored elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutToken {
    /// Increase indentation by one level
    Indent,
    /// Decrease indentation by one level
    Dedent,
    /// Push the current column as indentation
    SetTab,
    /// Pop the indentation pushed by the last `SetTab`
    ClearTab,
    /// Force a space
    Space,
    /// Line break at the current indentation
    Newline,
    /// Cancel a pending line break
    NoNewline,
}

/// Kind of a constant placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    QuotedString,
    Number,
    Measure,
    Currency,
    Location,
    Date,
    Time,
    Username,
    Hashtag,
    Url,
    PhoneNumber,
    EmailAddress,
    PathName,
    Picture,
    GenericEntity,
}

impl ConstantKind {
    /// Kind used for an entity value of the given entity type
    pub fn for_entity_type(entity_type: &str) -> Self {
        match entity_type {
            "tt:username" => ConstantKind::Username,
            "tt:hashtag" => ConstantKind::Hashtag,
            "tt:url" => ConstantKind::Url,
            "tt:phone_number" => ConstantKind::PhoneNumber,
            "tt:email_address" => ConstantKind::EmailAddress,
            "tt:path_name" => ConstantKind::PathName,
            "tt:picture" => ConstantKind::Picture,
            _ => ConstantKind::GenericEntity,
        }
    }
}

/// A typed constant carrying the value to serialize
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantToken {
    pub kind: ConstantKind,
    pub value: Value,
}

impl ConstantToken {
    pub fn new(kind: ConstantKind, value: Value) -> Self {
        Self { kind, value }
    }

    /// Entity type used for placeholder names (`NUMBER`, `MEASURE_C`, `GENERIC_ENTITY_tt:device`)
    pub fn entity_type(&self) -> String {
        match self.kind {
            ConstantKind::QuotedString => "QUOTED_STRING".to_string(),
            ConstantKind::Number => "NUMBER".to_string(),
            ConstantKind::Measure => match &self.value {
                Value::Measure(measure) => format!("MEASURE_{}", measure.unit),
                _ => "MEASURE".to_string(),
            },
            ConstantKind::Currency => "CURRENCY".to_string(),
            ConstantKind::Location => "LOCATION".to_string(),
            ConstantKind::Date => "DATE".to_string(),
            ConstantKind::Time => "TIME".to_string(),
            ConstantKind::Username => "USERNAME".to_string(),
            ConstantKind::Hashtag => "HASHTAG".to_string(),
            ConstantKind::Url => "URL".to_string(),
            ConstantKind::PhoneNumber => "PHONE_NUMBER".to_string(),
            ConstantKind::EmailAddress => "EMAIL_ADDRESS".to_string(),
            ConstantKind::PathName => "PATH_NAME".to_string(),
            ConstantKind::Picture => "PICTURE".to_string(),
            ConstantKind::GenericEntity => match &self.value {
                Value::Entity(entity) => format!("GENERIC_ENTITY_{}", entity.ty),
                _ => "GENERIC_ENTITY".to_string(),
            },
        }
    }

    /// Human-readable surface form
    pub fn render(&self) -> String {
        match &self.value {
            Value::String(s) => quote(s),
            Value::Number(n) => format_number(*n),
            Value::Measure(m) => format!("{}{}", format_number(m.value), m.unit),
            Value::Currency(c) => format!("{}${}", format_number(c.value), c.code),
            Value::Location(LocationValue::Absolute {
                latitude,
                longitude,
                display,
            }) => match display {
                Some(display) => format!(
                    "new Location({}, {}, {})",
                    format_number(*latitude),
                    format_number(*longitude),
                    quote(display)
                ),
                None => format!(
                    "new Location({}, {})",
                    format_number(*latitude),
                    format_number(*longitude)
                ),
            },
            Value::Location(LocationValue::Unresolved { name }) => {
                format!("new Location({})", quote(name))
            }
            Value::Date(DateValue::Absolute(date)) => {
                format!("new Date({})", quote(&date.to_rfc3339()))
            }
            Value::Time(TimeValue::Absolute {
                hour,
                minute,
                second,
            }) => {
                if *second == 0 {
                    format!("new Time({}, {})", hour, minute)
                } else {
                    format!("new Time({}, {}, {})", hour, minute, second)
                }
            }
            Value::Entity(entity) => render_entity(self.kind, entity),
            other => format!("{:?}", other),
        }
    }
}

fn render_entity(kind: ConstantKind, entity: &EntityValue) -> String {
    match (kind, &entity.value) {
        (ConstantKind::Username, Some(value)) => format!("@{}", value),
        (ConstantKind::Hashtag, Some(value)) => format!("#{}", value),
        (_, value) => {
            let head = match value {
                Some(value) => quote(value),
                None => "null".to_string(),
            };
            match &entity.display {
                Some(display) => format!("{}^^{}({})", head, entity.ty, quote(display)),
                None => format!("{}^^{}", head, entity.ty),
            }
        }
    }
}

/// Double-quoted string with JSON escapes
pub fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// A single element of a token stream
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    Layout(LayoutToken),
    Constant(ConstantToken),
}

impl Token {
    pub fn literal(s: impl Into<String>) -> Self {
        Token::Literal(s.into())
    }

    pub fn is_layout(&self) -> bool {
        matches!(self, Token::Layout(_))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(s) => f.write_str(s),
            Token::Layout(_) => Ok(()),
            Token::Constant(constant) => f.write_str(&constant.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::values::{CurrencyValue, MeasureValue};

    #[test]
    fn test_entity_types() {
        let measure = ConstantToken::new(
            ConstantKind::Measure,
            Value::Measure(MeasureValue::new(5.0, "C")),
        );
        assert_eq!(measure.entity_type(), "MEASURE_C");

        let device = ConstantToken::new(
            ConstantKind::GenericEntity,
            Value::Entity(EntityValue::new(Some("abc"), "tt:device", None)),
        );
        assert_eq!(device.entity_type(), "GENERIC_ENTITY_tt:device");
    }

    #[test]
    fn test_render() {
        let s = ConstantToken::new(ConstantKind::QuotedString, Value::String("say \"hi\"".into()));
        assert_eq!(s.render(), r#""say \"hi\"""#);

        let c = ConstantToken::new(
            ConstantKind::Currency,
            Value::Currency(CurrencyValue::new(5.5, "usd")),
        );
        assert_eq!(c.render(), "5.5$usd");

        let user = ConstantToken::new(
            ConstantKind::Username,
            Value::Entity(EntityValue::new(Some("bob"), "tt:username", None)),
        );
        assert_eq!(user.render(), "@bob");

        let generic = ConstantToken::new(
            ConstantKind::GenericEntity,
            Value::Entity(EntityValue::new(None, "com.spotify:song", Some("hello"))),
        );
        assert_eq!(generic.render(), "null^^com.spotify:song(\"hello\")");
    }
}

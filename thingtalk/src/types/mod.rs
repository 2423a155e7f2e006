//! ThingTalk type system
//!
//! [`Type`] is the static type of values and function arguments. Types
//! serialize to and from their surface syntax (`Measure(C)`,
//! `Entity(tt:email_address)`, `Array(String)`), which is also the format
//! used by schema JSON files.

pub mod units;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Static type of a value or argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Type {
    Any,
    Boolean,
    String,
    Number,
    Currency,
    /// Measure in the given unit; the empty unit is unit-polymorphic
    Measure(String),
    /// Enum with the given entries; `None` accepts any entry
    Enum(Option<Vec<String>>),
    Entity(String),
    Date,
    Time,
    Location,
    RecurrentTimeSpecification,
    ArgMap,
    Array(Box<Type>),
    Compound(BTreeMap<String, Type>),
    Object,
    /// Type variable used by polymorphic operator overloads
    TypeVar(String),
    /// A type name this library does not know about
    Unknown(String),
}

impl Type {
    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn entity(kind: &str) -> Self {
        Type::Entity(kind.to_string())
    }

    pub fn measure(unit: &str) -> Self {
        Type::Measure(unit.to_string())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Number | Type::Currency | Type::Measure(_))
    }

    /// Types with a total order usable by sort and min/max
    pub fn is_comparable(&self) -> bool {
        matches!(
            self,
            Type::Number
                | Type::Currency
                | Type::Measure(_)
                | Type::Date
                | Type::Time
                | Type::String
        )
    }

    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Replace bound type variables and the polymorphic measure unit
    pub fn resolve(&self, scope: &TypeScope) -> Type {
        match self {
            Type::TypeVar(name) => scope
                .vars
                .get(name)
                .map(|bound| bound.resolve(scope))
                .unwrap_or_else(|| self.clone()),
            Type::Measure(unit) if unit.is_empty() => match &scope.unit {
                Some(bound) => Type::Measure(bound.clone()),
                None => self.clone(),
            },
            Type::Array(elem) => Type::Array(Box::new(elem.resolve(scope))),
            Type::Compound(fields) => Type::Compound(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.resolve(scope)))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::Boolean => write!(f, "Boolean"),
            Type::String => write!(f, "String"),
            Type::Number => write!(f, "Number"),
            Type::Currency => write!(f, "Currency"),
            Type::Measure(unit) => write!(f, "Measure({})", unit),
            Type::Enum(None) => write!(f, "Enum(*)"),
            Type::Enum(Some(entries)) => write!(f, "Enum({})", entries.join(",")),
            Type::Entity(kind) => write!(f, "Entity({})", kind),
            Type::Date => write!(f, "Date"),
            Type::Time => write!(f, "Time"),
            Type::Location => write!(f, "Location"),
            Type::RecurrentTimeSpecification => write!(f, "RecurrentTimeSpecification"),
            Type::ArgMap => write!(f, "ArgMap"),
            Type::Array(elem) => write!(f, "Array({})", elem),
            Type::Compound(fields) => {
                write!(f, "{{ ")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, " }}")
            }
            Type::Object => write!(f, "Object"),
            Type::TypeVar(name) => write!(f, "{}", name),
            Type::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// Error for malformed type strings
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid type '{0}'")]
pub struct TypeParseError(pub String);

impl FromStr for Type {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TypeParseError(s.to_string()));
        }

        if let Some(inner) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            let mut fields = BTreeMap::new();
            for field in split_top_level(inner) {
                if field.trim().is_empty() {
                    continue;
                }
                let (name, ty) = field
                    .split_once(':')
                    .ok_or_else(|| TypeParseError(s.to_string()))?;
                fields.insert(name.trim().to_string(), ty.parse()?);
            }
            return Ok(Type::Compound(fields));
        }

        if let Some(open) = s.find('(') {
            let head = &s[..open];
            let inner = s[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| TypeParseError(s.to_string()))?
                .trim();
            return match head {
                "Measure" => Ok(Type::Measure(inner.to_string())),
                "Entity" => Ok(Type::Entity(inner.to_string())),
                "Array" => Ok(Type::Array(Box::new(inner.parse()?))),
                "Enum" if inner == "*" => Ok(Type::Enum(None)),
                "Enum" => Ok(Type::Enum(Some(
                    inner.split(',').map(|e| e.trim().to_string()).collect(),
                ))),
                _ => Err(TypeParseError(s.to_string())),
            };
        }

        Ok(match s {
            "Any" => Type::Any,
            "Boolean" => Type::Boolean,
            "String" => Type::String,
            "Number" => Type::Number,
            "Currency" => Type::Currency,
            "Date" => Type::Date,
            "Time" => Type::Time,
            "Location" => Type::Location,
            "RecurrentTimeSpecification" => Type::RecurrentTimeSpecification,
            "ArgMap" => Type::ArgMap,
            "Object" => Type::Object,
            other => Type::Unknown(other.to_string()),
        })
    }
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' | '{' => depth += 1,
            ')' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl TryFrom<String> for Type {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Type> for String {
    fn from(ty: Type) -> Self {
        ty.to_string()
    }
}

/// Bindings accumulated while unifying one operator overload or one call
#[derive(Debug, Clone, Default)]
pub struct TypeScope {
    pub vars: HashMap<String, Type>,
    /// Unit bound to the polymorphic `Measure()` type
    pub unit: Option<String>,
}

impl TypeScope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether a value of type `ty` can be used where `to` is expected.
///
/// Binds type variables and the polymorphic measure unit in `scope` as a
/// side effect. In lenient mode String and Entity are interchangeable.
pub fn is_assignable(ty: &Type, to: &Type, scope: &mut TypeScope, lenient: bool) -> bool {
    if ty == to && !matches!(ty, Type::TypeVar(_) | Type::Measure(_)) {
        return true;
    }

    match (ty, to) {
        (_, Type::Any) | (Type::Any, _) => true,

        (_, Type::TypeVar(name)) => match scope.vars.get(name).cloned() {
            Some(bound) => is_assignable(ty, &bound, scope, lenient),
            None => {
                scope.vars.insert(name.clone(), ty.clone());
                true
            }
        },
        (Type::TypeVar(name), _) => match scope.vars.get(name).cloned() {
            Some(bound) => is_assignable(&bound, to, scope, lenient),
            None => {
                scope.vars.insert(name.clone(), to.clone());
                true
            }
        },

        (Type::Measure(from_unit), Type::Measure(to_unit)) => {
            match (from_unit.is_empty(), to_unit.is_empty()) {
                (true, true) => true,
                (false, false) => units::same_quantity(from_unit, to_unit),
                (false, true) => bind_unit(scope, from_unit),
                (true, false) => bind_unit(scope, to_unit),
            }
        }

        (Type::Enum(from), Type::Enum(to)) => match (from, to) {
            (None, _) | (_, None) => true,
            (Some(from), Some(to)) => from.iter().all(|entry| to.contains(entry)),
        },

        (Type::Entity(from), Type::Entity(to)) => to == "*" || from == to,
        (Type::String, Type::Entity(_)) | (Type::Entity(_), Type::String) => lenient,

        (Type::Array(from), Type::Array(to)) => is_assignable(from, to, scope, lenient),

        (Type::Compound(from), Type::Compound(to)) => to.iter().all(|(name, to_field)| {
            from.get(name)
                .map(|from_field| is_assignable(from_field, to_field, scope, lenient))
                .unwrap_or(false)
        }),
        (Type::Compound(_), Type::Object) => true,

        _ => false,
    }
}

fn bind_unit(scope: &mut TypeScope, unit: &str) -> bool {
    match &scope.unit {
        Some(bound) => units::same_quantity(bound, unit),
        None => {
            scope.unit = Some(unit.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cases = [
            "Number",
            "Measure(C)",
            "Entity(tt:email_address)",
            "Array(Measure(ms))",
            "Enum(on,off)",
            "Enum(*)",
        ];
        for case in cases {
            let ty: Type = case.parse().unwrap();
            assert_eq!(ty.to_string(), case);
        }

        let compound: Type = "{ a: Number, b: Array(String) }".parse().unwrap();
        assert_eq!(compound.to_string(), "{ a: Number, b: Array(String) }");
        assert_eq!("Foo".parse::<Type>().unwrap(), Type::Unknown("Foo".into()));
        assert!("Measure(C".parse::<Type>().is_err());
    }

    #[test]
    fn test_serde_uses_surface_syntax() {
        let json = serde_json::to_string(&Type::measure("F")).unwrap();
        assert_eq!(json, "\"Measure(F)\"");
        let back: Type = serde_json::from_str("\"Array(Entity(tt:url))\"").unwrap();
        assert_eq!(back, Type::array(Type::entity("tt:url")));
    }

    #[test]
    fn test_basic_assignability() {
        let mut scope = TypeScope::new();
        assert!(is_assignable(&Type::Number, &Type::Number, &mut scope, false));
        assert!(!is_assignable(&Type::String, &Type::Number, &mut scope, false));
        assert!(is_assignable(&Type::Number, &Type::Any, &mut scope, false));
        assert!(!is_assignable(
            &Type::String,
            &Type::entity("tt:username"),
            &mut scope,
            false
        ));
        assert!(is_assignable(
            &Type::String,
            &Type::entity("tt:username"),
            &mut scope,
            true
        ));
    }

    #[test]
    fn test_type_variables_bind_once() {
        let mut scope = TypeScope::new();
        let a = Type::TypeVar("a".into());
        assert!(is_assignable(&Type::Number, &a, &mut scope, false));
        assert!(is_assignable(&Type::Number, &a, &mut scope, false));
        assert!(!is_assignable(&Type::String, &a, &mut scope, false));
        assert_eq!(a.resolve(&scope), Type::Number);
    }

    #[test]
    fn test_measure_unit_binding() {
        let mut scope = TypeScope::new();
        let poly = Type::measure("");
        assert!(is_assignable(&Type::measure("F"), &poly, &mut scope, false));
        assert_eq!(scope.unit.as_deref(), Some("F"));
        assert!(is_assignable(&Type::measure("C"), &poly, &mut scope, false));
        assert!(!is_assignable(&Type::measure("kg"), &poly, &mut scope, false));
        assert_eq!(poly.resolve(&scope), Type::measure("F"));
    }

    #[test]
    fn test_enum_subset() {
        let mut scope = TypeScope::new();
        let on = Type::Enum(Some(vec!["on".into()]));
        let on_off = Type::Enum(Some(vec!["on".into(), "off".into()]));
        assert!(is_assignable(&on, &on_off, &mut scope, false));
        assert!(!is_assignable(&on_off, &on, &mut scope, false));
        assert!(is_assignable(&Type::Enum(None), &on, &mut scope, false));
    }

    #[test]
    fn test_entity_wildcard() {
        let mut scope = TypeScope::new();
        let any_entity = Type::entity("*");
        assert!(is_assignable(&Type::entity("tt:username"), &any_entity, &mut scope, false));
        assert!(!is_assignable(&Type::String, &any_entity, &mut scope, false));
    }
}

//! Value model
//!
//! [`Value`] covers literal data (numbers, strings, measures, dates,
//! entities, ...) and placeholders that are resolved later (variable
//! references, computations, relative locations and dates, `$?`).
//!
//! Two predicates classify values:
//! - `is_concrete()`: the value denotes a fully resolved literal
//! - `is_constant()`: the value may appear where a compile-time constant is
//!   required; this always implies concreteness

use super::boolean_expression::BooleanExpression;
use super::error::{AstError, AstResult};
use super::syntax_priority::{add_parens, SyntaxPriority};
use crate::tokens::{ConstantKind, ConstantToken, TokenStream};
use crate::tokens;
use crate::types::{units, Type};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeZone,
    Timelike, Weekday,
};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub values: Vec<Value>,
    /// Declared array type, if known
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarRefValue {
    pub name: String,
    /// Filled by the typechecker
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputationValue {
    pub op: String,
    pub operands: Vec<Value>,
    /// Resolved operand and result types, filled by the typechecker
    pub overload: Option<Vec<Type>>,
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayFieldValue {
    pub value: Box<Value>,
    pub field: String,
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterValue {
    pub value: Box<Value>,
    pub filter: Box<BooleanExpression>,
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextRefValue {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasureValue {
    pub value: f64,
    pub unit: String,
}

impl MeasureValue {
    pub fn new(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyValue {
    pub value: f64,
    pub code: String,
}

impl CurrencyValue {
    pub fn new(value: f64, code: &str) -> Self {
        Self {
            value,
            code: code.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationValue {
    Absolute {
        latitude: f64,
        longitude: f64,
        display: Option<String>,
    },
    /// `$location.home`, `$location.work`, `$location.current_location`
    Relative(String),
    /// A place name not yet geocoded
    Unresolved { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateEdge {
    StartOf,
    EndOf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    Absolute(DateTime<FixedOffset>),
    /// `$now`
    Now,
    /// `$start_of(unit)` / `$end_of(unit)`
    Edge { edge: DateEdge, unit: String },
    /// A date with some components left to context
    Piece {
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
        time: Option<TimeValue>,
    },
    /// Next occurrence of a day of the week
    WeekDay {
        weekday: Weekday,
        time: Option<TimeValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeValue {
    Absolute { hour: u32, minute: u32, second: u32 },
    /// `$time.morning`, `$time.evening`
    Relative(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityValue {
    pub value: Option<String>,
    pub ty: String,
    pub display: Option<String>,
}

impl EntityValue {
    pub fn new(value: Option<&str>, ty: &str, display: Option<&str>) -> Self {
        Self {
            value: value.map(str::to_string),
            ty: ty.to_string(),
            display: display.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Array(ArrayValue),
    VarRef(VarRefValue),
    Computation(ComputationValue),
    ArrayField(ArrayFieldValue),
    Filter(FilterValue),
    /// `$?`, a slot the user still has to fill
    Undefined { local: bool },
    ContextRef(ContextRefValue),
    Boolean(bool),
    String(String),
    Measure(MeasureValue),
    Number(f64),
    Currency(CurrencyValue),
    Location(LocationValue),
    Date(DateValue),
    Time(TimeValue),
    Entity(EntityValue),
    Enum(String),
    /// `$result` when the name is `None`, otherwise `$program_id`, `$type`, ...
    Event(Option<String>),
    ArgMap(BTreeMap<String, Type>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn var_ref(name: &str) -> Self {
        Value::VarRef(VarRefValue {
            name: name.to_string(),
            ty: None,
        })
    }

    pub fn computation(op: &str, operands: Vec<Value>) -> Self {
        Value::Computation(ComputationValue {
            op: op.to_string(),
            operands,
            overload: None,
            ty: None,
        })
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(ArrayValue { values, ty: None })
    }

    pub fn measure(value: f64, unit: &str) -> Self {
        Value::Measure(MeasureValue::new(value, unit))
    }

    pub fn entity(value: &str, ty: &str, display: Option<&str>) -> Self {
        Value::Entity(EntityValue::new(Some(value), ty, display))
    }

    pub fn undefined() -> Self {
        Value::Undefined { local: true }
    }

    pub fn time(hour: u32, minute: u32) -> Self {
        Value::Time(TimeValue::Absolute {
            hour,
            minute,
            second: 0,
        })
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined { .. })
    }

    /// Static type of the value. Placeholders not yet typechecked report `Any`.
    pub fn get_type(&self) -> Type {
        match self {
            Value::Array(array) => match &array.ty {
                Some(ty) => ty.clone(),
                None => Type::array(
                    array
                        .values
                        .first()
                        .map(Value::get_type)
                        .unwrap_or(Type::Any),
                ),
            },
            Value::VarRef(VarRefValue { ty, .. })
            | Value::Computation(ComputationValue { ty, .. })
            | Value::ArrayField(ArrayFieldValue { ty, .. })
            | Value::Filter(FilterValue { ty, .. }) => ty.clone().unwrap_or(Type::Any),
            Value::Undefined { .. } => Type::Any,
            Value::ContextRef(context) => context.ty.clone(),
            Value::Boolean(_) => Type::Boolean,
            Value::String(_) => Type::String,
            Value::Measure(measure) => Type::measure(&measure.unit),
            Value::Number(_) => Type::Number,
            Value::Currency(_) => Type::Currency,
            Value::Location(_) => Type::Location,
            Value::Date(_) => Type::Date,
            Value::Time(_) => Type::Time,
            Value::Entity(entity) => Type::entity(&entity.ty),
            Value::Enum(entry) => Type::Enum(Some(vec![entry.clone()])),
            Value::Event(_) => Type::String,
            Value::ArgMap(_) => Type::ArgMap,
            Value::Object(fields) => Type::Compound(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.get_type()))
                    .collect(),
            ),
        }
    }

    pub fn is_concrete(&self) -> bool {
        match self {
            Value::Array(array) => array.values.iter().all(Value::is_concrete),
            Value::Object(fields) => fields.values().all(Value::is_concrete),
            Value::Location(location) => matches!(location, LocationValue::Absolute { .. }),
            Value::Date(date) => matches!(date, DateValue::Absolute(_)),
            Value::Time(time) => matches!(time, TimeValue::Absolute { .. }),
            Value::Boolean(_)
            | Value::String(_)
            | Value::Measure(_)
            | Value::Number(_)
            | Value::Currency(_)
            | Value::Entity(_)
            | Value::Enum(_)
            | Value::ArgMap(_) => true,
            Value::VarRef(_)
            | Value::Computation(_)
            | Value::ArrayField(_)
            | Value::Filter(_)
            | Value::Undefined { .. }
            | Value::ContextRef(_)
            | Value::Event(_) => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        match self {
            Value::Array(array) => array.values.iter().all(Value::is_constant),
            Value::Object(fields) => fields.values().all(Value::is_constant),
            _ => self.is_concrete(),
        }
    }

    /// Runtime representation. Measures are converted to their base unit.
    pub fn to_js(&self) -> AstResult<serde_json::Value> {
        if !self.is_constant() {
            return Err(AstError::non_constant(&self.to_source().to_string()));
        }
        Ok(match self {
            Value::Array(array) => serde_json::Value::Array(
                array
                    .values
                    .iter()
                    .map(Value::to_js)
                    .collect::<AstResult<Vec<_>>>()?,
            ),
            Value::Object(fields) => {
                let mut map = serde_json::Map::new();
                for (name, value) in fields {
                    map.insert(name.clone(), value.to_js()?);
                }
                serde_json::Value::Object(map)
            }
            Value::Boolean(b) => json!(b),
            Value::String(s) | Value::Enum(s) => json!(s),
            Value::Number(n) => json!(n),
            Value::Measure(m) => json!(units::to_base_unit(m.value, &m.unit)),
            Value::Currency(c) => json!({ "value": c.value, "code": c.code }),
            Value::Location(LocationValue::Absolute {
                latitude,
                longitude,
                display,
            }) => json!({ "latitude": latitude, "longitude": longitude, "display": display }),
            Value::Date(DateValue::Absolute(date)) => json!(date.to_rfc3339()),
            Value::Time(TimeValue::Absolute {
                hour,
                minute,
                second,
            }) => json!(format!("{:02}:{:02}:{:02}", hour, minute, second)),
            Value::Entity(entity) => json!({ "value": entity.value, "display": entity.display }),
            Value::ArgMap(args) => serde_json::Value::Object(
                args.iter()
                    .map(|(name, ty)| (name.clone(), json!(ty.to_string())))
                    .collect(),
            ),
            other => return Err(AstError::non_constant(&other.to_source().to_string())),
        })
    }

    pub fn priority(&self) -> SyntaxPriority {
        match self {
            Value::Computation(computation) => infix_priority(&computation.op)
                .filter(|_| computation.operands.len() == 2)
                .unwrap_or(SyntaxPriority::Primary),
            Value::ArrayField(_) => SyntaxPriority::Projection,
            Value::Filter(_) => SyntaxPriority::Filter,
            _ => SyntaxPriority::Primary,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            Value::String(_) => self.constant(ConstantKind::QuotedString),
            Value::Number(_) => self.constant(ConstantKind::Number),
            Value::Measure(_) => self.constant(ConstantKind::Measure),
            Value::Currency(_) => self.constant(ConstantKind::Currency),
            Value::Entity(entity) => self.constant(ConstantKind::for_entity_type(&entity.ty)),
            Value::Boolean(b) => TokenStream::from(if *b { "true" } else { "false" }),
            Value::Enum(entry) => tokens!["enum", entry.as_str()],
            Value::Event(None) => TokenStream::from("$result"),
            Value::Event(Some(name)) => TokenStream::from(format!("${}", name)),
            Value::Undefined { .. } => TokenStream::from("$?"),
            Value::VarRef(var) => TokenStream::from(var.name.as_str()),
            Value::ContextRef(context) => tokens![
                format!("$context.{}", context.name),
                ":",
                context.ty.to_string()
            ],
            Value::Location(LocationValue::Relative(name)) => {
                TokenStream::from(format!("$location.{}", name))
            }
            Value::Location(_) => self.constant(ConstantKind::Location),
            Value::Time(TimeValue::Relative(name)) => {
                TokenStream::from(format!("$time.{}", name))
            }
            Value::Time(_) => self.constant(ConstantKind::Time),
            Value::Date(date) => date_to_source(date, self),
            Value::ArgMap(args) => {
                let args = args
                    .iter()
                    .map(|(name, ty)| tokens![name.as_str(), ":", ty.to_string()]);
                tokens!["new", "ArgMap", "(", TokenStream::join(args, ",".into()), ")"]
            }
            Value::Object(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, value)| tokens![name.as_str(), "=", value.to_source()]);
                tokens!["{", TokenStream::join(fields, ",".into()), "}"]
            }
            Value::Array(array) => {
                let values = array.values.iter().map(Value::to_source);
                tokens!["[", TokenStream::join(values, ",".into()), "]"]
            }
            Value::Computation(computation) => computation_to_source(computation),
            Value::ArrayField(field) => tokens![
                field.field.as_str(),
                "of",
                add_parens(
                    SyntaxPriority::Projection,
                    field.value.priority(),
                    field.value.to_source()
                )
            ],
            Value::Filter(filter) => tokens![
                add_parens(
                    SyntaxPriority::Filter,
                    filter.value.priority(),
                    filter.value.to_source()
                ),
                "filter",
                filter.filter.to_source()
            ],
        }
    }

    fn constant(&self, kind: ConstantKind) -> TokenStream {
        TokenStream::from(ConstantToken::new(kind, self.clone()))
    }
}

fn infix_priority(op: &str) -> Option<SyntaxPriority> {
    match op {
        "+" | "-" => Some(SyntaxPriority::Add),
        "*" | "/" | "%" => Some(SyntaxPriority::Mul),
        "**" => Some(SyntaxPriority::Exp),
        _ => None,
    }
}

fn computation_to_source(computation: &ComputationValue) -> TokenStream {
    match (infix_priority(&computation.op), computation.operands.as_slice()) {
        (Some(priority), [lhs, rhs]) => {
            // `**` associates to the right, everything else to the left
            let (lhs_required, rhs_required) = if computation.op == "**" {
                (priority.tighter(), priority)
            } else {
                (priority, priority.tighter())
            };
            tokens![
                add_parens(lhs_required, lhs.priority(), lhs.to_source()),
                computation.op.as_str(),
                add_parens(rhs_required, rhs.priority(), rhs.to_source())
            ]
        }
        _ => {
            let operands = computation.operands.iter().map(Value::to_source);
            tokens![
                computation.op.as_str(),
                "(",
                TokenStream::join(operands, ",".into()),
                ")"
            ]
        }
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn date_to_source(date: &DateValue, value: &Value) -> TokenStream {
    let time_source = |time: &Option<TimeValue>| match time {
        Some(time) => tokens![",", Value::Time(time.clone()).to_source()],
        None => TokenStream::new(),
    };
    match date {
        DateValue::Absolute(_) => value.constant(ConstantKind::Date),
        DateValue::Now => TokenStream::from("$now"),
        DateValue::Edge { edge, unit } => {
            let head = match edge {
                DateEdge::StartOf => "$start_of",
                DateEdge::EndOf => "$end_of",
            };
            tokens![head, "(", unit.as_str(), ")"]
        }
        DateValue::Piece {
            year,
            month,
            day,
            time,
        } => {
            let piece = |n: Option<f64>| match n {
                Some(n) => Value::Number(n).to_source(),
                None => TokenStream::new(),
            };
            tokens![
                "new",
                "Date",
                "(",
                piece(year.map(f64::from)),
                ",",
                piece(month.map(f64::from)),
                ",",
                piece(day.map(f64::from)),
                time_source(time),
                ")"
            ]
        }
        DateValue::WeekDay { weekday, time } => tokens![
            "new",
            "Date",
            "(",
            weekday_name(*weekday),
            time_source(time),
            ")"
        ],
    }
}

impl DateValue {
    /// Resolve to an instant relative to `now`; `None` when a component is relative
    pub fn resolve(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        match self {
            DateValue::Absolute(date) => Some(*date),
            DateValue::Now => Some(now),
            DateValue::Edge { edge, unit } => {
                let start = start_of(now, unit)?;
                match edge {
                    DateEdge::StartOf => Some(start),
                    DateEdge::EndOf => {
                        next_boundary(start, unit).map(|next| next - Duration::milliseconds(1))
                    }
                }
            }
            DateValue::Piece {
                year,
                month,
                day,
                time,
            } => {
                let date = NaiveDate::from_ymd_opt(
                    year.unwrap_or_else(|| now.year()),
                    month.unwrap_or_else(|| now.month()),
                    day.unwrap_or(if month.is_some() { 1 } else { now.day() }),
                )?;
                at_time(now.offset(), date, time.as_ref())
            }
            DateValue::WeekDay { weekday, time } => {
                let today = now.date_naive();
                let ahead = (7 + weekday.num_days_from_monday() as i64
                    - today.weekday().num_days_from_monday() as i64)
                    % 7;
                at_time(now.offset(), today + Duration::days(ahead), time.as_ref())
            }
        }
    }
}

fn at_time(
    offset: &FixedOffset,
    date: NaiveDate,
    time: Option<&TimeValue>,
) -> Option<DateTime<FixedOffset>> {
    let (hour, minute, second) = match time {
        None => (0, 0, 0),
        Some(TimeValue::Absolute {
            hour,
            minute,
            second,
        }) => (*hour, *minute, *second),
        Some(TimeValue::Relative(_)) => return None,
    };
    offset
        .from_local_datetime(&date.and_hms_opt(hour, minute, second)?)
        .single()
}

fn start_of(now: DateTime<FixedOffset>, unit: &str) -> Option<DateTime<FixedOffset>> {
    let local = now.naive_local();
    let date = local.date();
    let truncated: NaiveDateTime = match unit {
        "ms" => local,
        "s" => date.and_hms_opt(local.hour(), local.minute(), local.second())?,
        "min" => date.and_hms_opt(local.hour(), local.minute(), 0)?,
        "h" => date.and_hms_opt(local.hour(), 0, 0)?,
        "day" => date.and_hms_opt(0, 0, 0)?,
        "week" => (date - Duration::days(date.weekday().num_days_from_monday() as i64))
            .and_hms_opt(0, 0, 0)?,
        "mon" => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?,
        "year" => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        _ => return None,
    };
    now.offset().from_local_datetime(&truncated).single()
}

fn next_boundary(start: DateTime<FixedOffset>, unit: &str) -> Option<DateTime<FixedOffset>> {
    match unit {
        "ms" => Some(start + Duration::milliseconds(1)),
        "s" => Some(start + Duration::seconds(1)),
        "min" => Some(start + Duration::minutes(1)),
        "h" => Some(start + Duration::hours(1)),
        "day" => Some(start + Duration::days(1)),
        "week" => Some(start + Duration::days(7)),
        "mon" => start.checked_add_months(Months::new(1)),
        "year" => start.checked_add_months(Months::new(12)),
        _ => None,
    }
}

/// Shortest decimal rendering; integral values print without a fraction
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::prettyprint;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-15T10:30:45+02:00").unwrap()
    }

    #[test]
    fn test_constant_implies_concrete() {
        let values = vec![
            Value::Number(3.0),
            Value::String("x".into()),
            Value::var_ref("a"),
            Value::undefined(),
            Value::Location(LocationValue::Relative("home".into())),
            Value::Date(DateValue::Now),
            Value::array(vec![Value::Number(1.0), Value::var_ref("b")]),
            Value::array(vec![Value::Number(1.0), Value::Number(2.0)]),
        ];
        for value in values {
            if value.is_constant() {
                assert!(value.is_concrete(), "{:?}", value);
            }
        }
        assert!(Value::array(vec![Value::Number(1.0)]).is_constant());
        assert!(!Value::array(vec![Value::var_ref("b")]).is_constant());
    }

    #[test]
    fn test_get_type() {
        assert_eq!(Value::measure(5.0, "C").get_type(), Type::measure("C"));
        assert_eq!(
            Value::entity("x", "tt:url", None).get_type(),
            Type::entity("tt:url")
        );
        assert_eq!(
            Value::array(vec![Value::Number(1.0)]).get_type(),
            Type::array(Type::Number)
        );
        assert_eq!(Value::var_ref("x").get_type(), Type::Any);
    }

    #[test]
    fn test_to_js() {
        assert_eq!(Value::measure(2.0, "km").to_js().unwrap(), json!(2000.0));
        assert_eq!(Value::Boolean(true).to_js().unwrap(), json!(true));
        assert_eq!(
            Value::time(8, 5).to_js().unwrap(),
            json!("08:05:00")
        );
        assert!(matches!(
            Value::var_ref("x").to_js(),
            Err(AstError::NonConstant { .. })
        ));
    }

    #[test]
    fn test_computation_parenthesization() {
        let sum = Value::computation("+", vec![Value::var_ref("a"), Value::var_ref("b")]);
        let product = Value::computation("*", vec![sum.clone(), Value::var_ref("c")]);
        assert_eq!(prettyprint(&product.to_source()), "(a + b) * c");

        let nested = Value::computation("+", vec![sum.clone(), Value::var_ref("c")]);
        assert_eq!(prettyprint(&nested.to_source()), "a + b + c");

        let right = Value::computation("-", vec![Value::var_ref("c"), sum]);
        assert_eq!(prettyprint(&right.to_source()), "c - (a + b)");

        let call = Value::computation("distance", vec![Value::var_ref("a"), Value::var_ref("b")]);
        assert_eq!(prettyprint(&call.to_source()), "distance(a, b)");
    }

    #[test]
    fn test_date_sources() {
        let edge = Value::Date(DateValue::Edge {
            edge: DateEdge::StartOf,
            unit: "week".into(),
        });
        assert_eq!(prettyprint(&edge.to_source()), "$start_of(week)");

        let weekday = Value::Date(DateValue::WeekDay {
            weekday: Weekday::Mon,
            time: None,
        });
        assert_eq!(prettyprint(&weekday.to_source()), "new Date(monday)");
    }

    #[test]
    fn test_date_resolution() {
        let start = DateValue::Edge {
            edge: DateEdge::StartOf,
            unit: "day".into(),
        };
        assert_eq!(
            start.resolve(now()).unwrap().to_rfc3339(),
            "2024-05-15T00:00:00+02:00"
        );

        let end = DateValue::Edge {
            edge: DateEdge::EndOf,
            unit: "mon".into(),
        };
        assert_eq!(
            end.resolve(now()).unwrap().to_rfc3339(),
            "2024-05-31T23:59:59.999+02:00"
        );

        // 2024-05-15 is a Wednesday
        let friday = DateValue::WeekDay {
            weekday: Weekday::Fri,
            time: Some(TimeValue::Absolute {
                hour: 9,
                minute: 0,
                second: 0,
            }),
        };
        assert_eq!(
            friday.resolve(now()).unwrap().to_rfc3339(),
            "2024-05-17T09:00:00+02:00"
        );

        let piece = DateValue::Piece {
            year: None,
            month: Some(12),
            day: Some(25),
            time: None,
        };
        assert_eq!(
            piece.resolve(now()).unwrap().to_rfc3339(),
            "2024-12-25T00:00:00+02:00"
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }
}

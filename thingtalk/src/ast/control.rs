//! Dialogue control commands (`$yes;`, `$answer(...)`, `$choice(n);`)

use super::values::Value;
use crate::tokens;
use crate::tokens::TokenStream;
use crate::utils::SourceRange;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlIntent {
    /// `$yes`, `$no`, `$nevermind`, `$stop`, `$help`, `$wakeup`, `$debug`, `$failed`
    Special(String),
    Choice(usize),
    Answer(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlCommand {
    pub range: Option<SourceRange>,
    pub intent: ControlIntent,
}

impl ControlCommand {
    pub fn new(intent: ControlIntent) -> Self {
        Self { range: None, intent }
    }

    pub fn special(name: &str) -> Self {
        Self::new(ControlIntent::Special(name.to_string()))
    }

    pub fn to_source(&self) -> TokenStream {
        let body = match &self.intent {
            ControlIntent::Special(name) => TokenStream::from(format!("${}", name)),
            ControlIntent::Choice(index) => tokens![
                "$choice",
                "(",
                Value::Number(*index as f64).to_source(),
                ")"
            ],
            ControlIntent::Answer(value) => tokens!["$answer", "(", value.to_source(), ")"],
        };
        tokens![body, ";"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::prettyprint;

    #[test]
    fn test_control_sources() {
        assert_eq!(prettyprint(&ControlCommand::special("yes").to_source()), "$yes;");
        assert_eq!(
            prettyprint(&ControlCommand::new(ControlIntent::Choice(2)).to_source()),
            "$choice(2);"
        );
        assert_eq!(
            prettyprint(&ControlCommand::new(ControlIntent::Answer(Value::measure(3.0, "km"))).to_source()),
            "$answer(3km);"
        );
    }
}

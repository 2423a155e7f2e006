//! Builtin functions available without a schema retriever

use crate::ast::{ArgDirection, ArgumentDef, FunctionDef, FunctionType};
use crate::types::Type;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

fn registry() -> &'static HashMap<&'static str, Arc<FunctionDef>> {
    static BUILTINS: OnceLock<HashMap<&'static str, Arc<FunctionDef>>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        let timer = FunctionDef::new(FunctionType::Stream, None, "timer")
            .with_arg(ArgumentDef::new("base", ArgDirection::InReq, Type::Date))
            .with_arg(ArgumentDef::new("interval", ArgDirection::InReq, Type::measure("ms")))
            .with_arg(ArgumentDef::new("frequency", ArgDirection::InOpt, Type::Number));
        let attimer = FunctionDef::new(FunctionType::Stream, None, "attimer")
            .with_arg(ArgumentDef::new("time", ArgDirection::InReq, Type::array(Type::Time)))
            .with_arg(ArgumentDef::new("expiration_date", ArgDirection::InOpt, Type::Date));
        let ontimer = FunctionDef::new(FunctionType::Stream, None, "ontimer")
            .with_arg(ArgumentDef::new("date", ArgDirection::InReq, Type::array(Type::Date)));
        let notify = FunctionDef::new(FunctionType::Action, None, "notify");
        let say = FunctionDef::new(FunctionType::Action, None, "say")
            .with_arg(ArgumentDef::new("message", ArgDirection::InOpt, Type::String));

        [
            ("timer", timer),
            ("attimer", attimer),
            ("ontimer", ontimer),
            ("notify", notify),
            ("say", say),
        ]
        .into_iter()
        .map(|(name, def)| (name, Arc::new(def)))
        .collect()
    })
}

/// Signature of a builtin stream (`timer`, `attimer`, `ontimer`) or
/// action (`notify`, `say`)
pub fn builtin_function(name: &str) -> Option<Arc<FunctionDef>> {
    registry().get(name).cloned()
}

pub fn is_builtin(name: &str) -> bool {
    registry().contains_key(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let timer = builtin_function("timer").unwrap();
        assert_eq!(timer.function_type, FunctionType::Stream);
        assert!(timer.get_arg("interval").unwrap().is_required());
        assert!(!timer.get_arg("frequency").unwrap().is_required());

        assert_eq!(builtin_function("notify").unwrap().function_type, FunctionType::Action);
        assert!(is_builtin("attimer"));
        assert!(!is_builtin("get_weather"));
    }
}

//! Selectors, input parameters and invocations

use super::function_def::FunctionDef;
use super::values::Value;
use crate::tokens;
use crate::tokens::{token::quote, TokenStream};
use crate::utils::SourceRange;
use std::sync::Arc;

/// Identifies the device (or set of devices) a function call targets
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    pub range: Option<SourceRange>,
    /// Class identifier, e.g. `com.twitter`
    pub kind: String,
    pub id: Option<String>,
    /// Attribute parameters restricting the eligible devices
    pub attributes: Vec<InputParam>,
    /// Apply to every matching device instead of choosing one
    pub all: bool,
}

impl DeviceSelector {
    pub fn new(kind: &str) -> Self {
        Self {
            range: None,
            kind: kind.to_string(),
            id: None,
            attributes: Vec::new(),
            all: false,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_attribute(mut self, attribute: InputParam) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    fn is_plain(&self) -> bool {
        self.id.is_none() && self.attributes.is_empty() && !self.all
    }

    pub fn to_source(&self) -> TokenStream {
        let head = TokenStream::from(format!("@{}", self.kind));
        if self.is_plain() {
            return head;
        }
        let mut attributes = Vec::new();
        if let Some(id) = &self.id {
            attributes.push(tokens!["id", "=", quote(id)]);
        }
        attributes.extend(self.attributes.iter().map(InputParam::to_source));
        if self.all {
            attributes.push(tokens!["all", "=", "true"]);
        }
        tokens![head, "(", TokenStream::join(attributes, ",".into()), ")"]
    }
}

/// Equality ignores the source range; attribute order matters
impl PartialEq for DeviceSelector {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.id == other.id
            && self.attributes == other.attributes
            && self.all == other.all
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Device(DeviceSelector),
    /// Builtin functions (`notify`, `timer`, ...); a shared unit value
    Builtin,
}

impl Selector {
    pub fn device(kind: &str) -> Self {
        Selector::Device(DeviceSelector::new(kind))
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Selector::Device(device) => Some(&device.kind),
            Selector::Builtin => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputParam {
    pub range: Option<SourceRange>,
    pub name: String,
    pub value: Value,
}

impl InputParam {
    pub fn new(name: &str, value: Value) -> Self {
        Self {
            range: None,
            name: name.to_string(),
            value,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        tokens![self.name.as_str(), "=", self.value.to_source()]
    }
}

impl PartialEq for InputParam {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// A call of `channel` on `selector`.
///
/// `schema` is `None` until the typechecker resolves the function; it is
/// shared by reference with every other site resolving to the same function.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub range: Option<SourceRange>,
    pub selector: Selector,
    pub channel: String,
    pub in_params: Vec<InputParam>,
    pub schema: Option<Arc<FunctionDef>>,
}

impl Invocation {
    pub fn new(selector: Selector, channel: &str, in_params: Vec<InputParam>) -> Self {
        Self {
            range: None,
            selector,
            channel: channel.to_string(),
            in_params,
            schema: None,
        }
    }

    pub fn get_param(&self, name: &str) -> Option<&InputParam> {
        self.in_params.iter().find(|param| param.name == name)
    }

    /// `@kind.channel` or the bare channel of a builtin
    pub fn qualified_name(&self) -> String {
        match &self.selector {
            Selector::Device(device) => format!("@{}.{}", device.kind, self.channel),
            Selector::Builtin => self.channel.clone(),
        }
    }

    pub fn to_source(&self) -> TokenStream {
        call_source(&self.selector, &self.channel, &self.in_params)
    }
}

/// Surface form shared by invocations, external filters and permission functions
pub(crate) fn call_source(selector: &Selector, channel: &str, in_params: &[InputParam]) -> TokenStream {
    let params = TokenStream::join(in_params.iter().map(InputParam::to_source), ",".into());
    match selector {
        Selector::Device(device) if device.is_plain() => {
            tokens![format!("@{}.{}", device.kind, channel), "(", params, ")"]
        }
        Selector::Device(device) => tokens![device.to_source(), ".", channel, "(", params, ")"],
        Selector::Builtin if in_params.is_empty() => TokenStream::from(channel),
        Selector::Builtin => tokens![channel, "(", params, ")"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::prettyprint;

    #[test]
    fn test_plain_invocation_source() {
        let invocation = Invocation::new(Selector::device("com.example"), "get", vec![]);
        assert_eq!(prettyprint(&invocation.to_source()), "@com.example.get()");
        assert!(invocation.schema.is_none());
    }

    #[test]
    fn test_invocation_with_params_and_attributes() {
        let selector = DeviceSelector::new("org.thingpedia.iot.light")
            .with_attribute(InputParam::new("name", Value::String("kitchen".into())))
            .with_all(true);
        let invocation = Invocation::new(
            Selector::Device(selector),
            "set_power",
            vec![InputParam::new("power", Value::Enum("on".into()))],
        );
        assert_eq!(
            prettyprint(&invocation.to_source()),
            "@org.thingpedia.iot.light(name=\"kitchen\", all=true).set_power(power=enum on)"
        );
    }

    #[test]
    fn test_selector_equality_ignores_range() {
        let mut a = DeviceSelector::new("com.foo").with_id("x");
        let b = DeviceSelector::new("com.foo").with_id("x");
        a.range = Some(SourceRange::default());
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_all(true));
    }

    #[test]
    fn test_builtin_source() {
        let notify = Invocation::new(Selector::Builtin, "notify", vec![]);
        assert_eq!(prettyprint(&notify.to_source()), "notify");
    }
}

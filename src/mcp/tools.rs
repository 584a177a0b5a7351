//! Tool definitions and the per-server tool catalog.
//!
//! Each tool declares a typed input schema. The catalog is pure data: it
//! renders schemas for `tools/list` and hands field specs to the dispatcher,
//! which does the validation and defaulting.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Declared type of a tool input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    Number,
    Integer,
    /// An array whose items are strings.
    StringArray,
    Object,
}

impl ParamType {
    /// JSON Schema `type` keyword for this field type.
    pub fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::StringArray => "array",
            Self::Object => "object",
        }
    }

    /// Checks `value` against this type, returning the value to forward.
    ///
    /// Integral floats (`10.0`) are accepted for integer fields and forwarded
    /// as integers, since several clients only ever send JSON numbers as floats.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match self {
            Self::String => value.is_string().then(|| value.clone()),
            Self::Boolean => value.is_boolean().then(|| value.clone()),
            Self::Number => value.is_number().then(|| value.clone()),
            Self::Integer => {
                if value.is_i64() || value.is_u64() {
                    return Some(value.clone());
                }
                let f = value.as_f64()?;
                (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| json!(f as i64))
            }
            Self::StringArray => {
                let items = value.as_array()?;
                items.iter().all(Value::is_string).then(|| value.clone())
            }
            Self::Object => value.is_object().then(|| value.clone()),
        }
    }
}

/// One field of a tool's input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
    /// Value the dispatcher substitutes when an optional field is omitted.
    pub default: Option<Value>,
    /// Allowed values for string fields; empty means unrestricted.
    pub allowed: &'static [&'static str],
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
            default: None,
            allowed: &[],
        }
    }

    pub fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    fn schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(self.kind.schema_type()));
        prop.insert("description".to_string(), json!(self.description));
        if self.kind == ParamType::StringArray {
            prop.insert("items".to_string(), json!({ "type": "string" }));
        }
        if !self.allowed.is_empty() {
            prop.insert("enum".to_string(), json!(self.allowed));
        }
        if let Some(default) = &self.default {
            prop.insert("default".to_string(), default.clone());
        }
        Value::Object(prop)
    }
}

/// A tool definition exposed by an MCP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: &'static str,
    /// Human-readable description of what the tool does.
    pub description: &'static str,
    /// Backend method invoked for this tool.
    pub method: &'static str,
    /// Input fields in declaration order.
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    pub fn new(name: &'static str, description: &'static str, params: Vec<ParamSpec>) -> Self {
        Self {
            name,
            description,
            method: name,
            params,
        }
    }

    /// Routes the tool to a backend method with a different name.
    pub fn invoking(mut self, method: &'static str) -> Self {
        self.method = method;
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema describing the tool's input parameters.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[derive(Serialize)]
struct ToolListing<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

impl Serialize for ToolDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ToolListing {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema(),
        }
        .serialize(serializer)
    }
}

/// Ordered, immutable registry of the tools one server exposes.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolDefinition>) -> Self {
        Self { tools }
    }

    /// Returns the tools in registration order.
    pub fn list_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

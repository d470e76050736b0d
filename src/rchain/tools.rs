use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::rchain::provider::ProviderError;

/// JSON schema primitive types supported for tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolParamType {
    Integer,
    Number,
    String,
    Boolean,
    Object,
    Array,
}

impl ToolParamType {
    fn as_str(self) -> &'static str {
        match self {
            ToolParamType::Integer => "integer",
            ToolParamType::Number => "number",
            ToolParamType::String => "string",
            ToolParamType::Boolean => "boolean",
            ToolParamType::Object => "object",
            ToolParamType::Array => "array",
        }
    }
}

/// One function parameter definition.
#[derive(Debug, Clone)]
pub struct ToolParam {
    /// Parameter name.
    pub name: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// JSON schema type.
    pub kind: ToolParamType,
    /// Whether the parameter is required.
    pub required: bool,
}

impl ToolParam {
    /// Builds a parameter definition.
    pub fn new(
        name: impl Into<String>,
        kind: ToolParamType,
        required: bool,
        description: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            kind,
            required,
        }
    }

    /// Required string parameter with a description.
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ToolParamType::String, true, Some(description.into()))
    }

    /// Required number parameter with a description.
    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ToolParamType::Number, true, Some(description.into()))
    }
}

/// Callable tool function definition.
#[derive(Debug, Clone)]
pub struct ToolFunction {
    /// Function name.
    pub name: String,
    /// Function description.
    pub description: String,
    /// Parameter definitions.
    pub params: Vec<ToolParam>,
}

impl ToolFunction {
    /// Creates a function definition.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Appends one parameter definition.
    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.params.push(param);
        self
    }

    /// JSON schema of the parameter object.
    pub fn to_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut param_def = Map::new();
            param_def.insert(
                "type".to_string(),
                Value::String(param.kind.as_str().to_string()),
            );
            if let Some(description) = &param.description {
                param_def.insert(
                    "description".to_string(),
                    Value::String(description.clone()),
                );
            }
            properties.insert(param.name.clone(), Value::Object(param_def));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}

/// Tool wrapper matching chat-completions function-calling schema.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Function declaration.
    pub function: ToolFunction,
}

impl ToolDefinition {
    /// Wraps a function definition as a tool.
    pub fn from_function(function: ToolFunction) -> Self {
        Self { function }
    }

    /// Serializes the tool declaration in OpenAI format.
    pub fn to_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.function.name,
                "description": self.function.description,
                "parameters": self.function.to_schema(),
            }
        })
    }
}

/// Tool call emitted by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Provider-generated call id.
    pub id: String,
    /// Tool/function name.
    pub name: String,
    /// Arguments payload.
    pub args: Value,
}

impl ToolCall {
    /// Arguments as the JSON string chat-completions APIs expect.
    pub fn args_as_string(&self) -> String {
        match &self.args {
            Value::String(value) => value.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),
    #[error("argument '{name}' must be a {expected}")]
    InvalidArgument {
        name: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Failed(String),
}

/// Arguments handed to a tool, always a JSON object.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Normalizes raw model input against the tool parameters.
    ///
    /// Objects (or strings holding a JSON object) pass through; any other
    /// value binds to the first declared parameter.
    pub fn from_input(params: &[ToolParam], input: Value) -> Self {
        let input = match input {
            Value::String(raw) => match serde_json::from_str::<Value>(raw.trim()) {
                Ok(Value::Object(map)) => Value::Object(map),
                _ => Value::String(strip_quotes(&raw).to_string()),
            },
            other => other,
        };
        match input {
            Value::Object(map) => Self(map),
            Value::Null => Self::default(),
            other => {
                let mut map = Map::new();
                let name = params
                    .first()
                    .map_or_else(|| "input".to_string(), |param| param.name.clone());
                map.insert(name, other);
                Self(map)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        match self.0.get(name) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(ToolError::InvalidArgument {
                name: name.to_string(),
                expected: "string",
            }),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }

    /// Like [`ToolArgs::str`], but a lone string under any other key also binds.
    pub fn single_str(&self, name: &str) -> Result<&str, ToolError> {
        match (self.0.get(name), self.0.len()) {
            (None, 1) => match self.0.values().next() {
                Some(Value::String(value)) => Ok(value),
                _ => self.str(name),
            },
            _ => self.str(name),
        }
    }

    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        let invalid = || ToolError::InvalidArgument {
            name: name.to_string(),
            expected: "number",
        };
        match self.0.get(name) {
            Some(Value::Number(value)) => value.as_f64().ok_or_else(invalid),
            Some(Value::String(value)) => value.trim().parse().map_err(|_| invalid()),
            Some(_) => Err(invalid()),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }
}

fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        })
        .unwrap_or(trimmed)
}

/// Something an agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Declared parameters; single-input tools take one `input` string.
    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::string("input", "Tool input")]
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError>;

    fn definition(&self) -> ToolDefinition {
        let function = self
            .parameters()
            .into_iter()
            .fold(ToolFunction::new(self.name(), self.description()), |function, param| {
                function.with_param(param)
            });
        ToolDefinition::from_function(function)
    }
}

type ToolFn = dyn Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync;

/// Tool backed by a plain closure.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    params: Vec<ToolParam>,
    func: Arc<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    /// Declares a parameter; without any the tool takes a single `input`.
    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.params.push(param);
        self
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ToolParam> {
        if self.params.is_empty() {
            vec![ToolParam::string("input", "Tool input")]
        } else {
            self.params.clone()
        }
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError> {
        (self.func)(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_required_params() {
        let tool = FnTool::new("concatenate_strings", "Concatenates two strings.", |_| {
            Ok(String::new())
        })
        .with_param(ToolParam::string("a", "First string"))
        .with_param(ToolParam::string("b", "Second string"));

        let json = tool.definition().to_json();
        assert_eq!(json["function"]["name"], "concatenate_strings");
        assert_eq!(
            json["function"]["parameters"]["required"],
            json!(["a", "b"])
        );
        assert_eq!(
            json["function"]["parameters"]["properties"]["a"]["type"],
            "string"
        );
    }

    #[test]
    fn plain_input_binds_to_first_param() {
        let params = vec![ToolParam::string("name", "Name")];
        let args = ToolArgs::from_input(&params, Value::String("'Alice'".to_string()));
        assert_eq!(args.str("name").unwrap(), "Alice");
    }

    #[test]
    fn json_string_input_is_parsed_as_object() {
        let params = vec![ToolParam::number("x", "x"), ToolParam::number("y", "y")];
        let args = ToolArgs::from_input(&params, Value::String(r#"{"x": 10, "y": "20"}"#.into()));
        assert_eq!(args.f64("x").unwrap(), 10.0);
        assert_eq!(args.f64("y").unwrap(), 20.0);
    }

    #[test]
    fn missing_argument_is_reported() {
        let args = ToolArgs::from_input(&[], json!({}));
        assert!(matches!(args.str("text"), Err(ToolError::MissingArgument(name)) if name == "text"));
    }

    #[test]
    fn single_input_accepts_any_lone_key() {
        let params = vec![ToolParam::string("input", "Search query")];
        let args = ToolArgs::from_input(&params, json!({"query": "Odysseus"}));
        assert_eq!(args.single_str("input").unwrap(), "Odysseus");

        let named = ToolArgs::from_input(&params, json!({"input": "Ithaca"}));
        assert_eq!(named.single_str("input").unwrap(), "Ithaca");

        let ambiguous = ToolArgs::from_input(&params, json!({"a": "x", "b": "y"}));
        assert!(matches!(
            ambiguous.single_str("input"),
            Err(ToolError::MissingArgument(name)) if name == "input"
        ));
    }

    #[tokio::test]
    async fn fn_tool_without_params_takes_input() {
        let tool = FnTool::new("echo", "Echoes", |args| Ok(args.str("input")?.to_uppercase()));
        let args = ToolArgs::from_input(&tool.parameters(), json!("hi"));
        assert_eq!(tool.call(args).await.unwrap(), "HI");
    }
}

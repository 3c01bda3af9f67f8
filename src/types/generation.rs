//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Sampling and request options forwarded verbatim to the completions endpoint.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub seed: Option<u64>,
    #[builder(into)]
    pub user: Option<String>,
    pub response_format: Option<ResponseFormat>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    /// Additional body fields the API accepts but this crate does not model.
    pub extra: Option<Map<String, Value>>,
}

impl GenerationSettings {
    /// Write the populated settings into a request body object.
    pub fn apply_to(&self, obj: &mut Map<String, Value>) {
        if let Some(max) = self.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = self.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = self.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = self.stop_sequences {
            obj.insert("stop".into(), serde_json::json!(stops));
        }
        if let Some(pp) = self.presence_penalty {
            obj.insert("presence_penalty".into(), pp.into());
        }
        if let Some(fp) = self.frequency_penalty {
            obj.insert("frequency_penalty".into(), fp.into());
        }
        if let Some(seed) = self.seed {
            obj.insert("seed".into(), seed.into());
        }
        if let Some(ref user) = self.user {
            obj.insert("user".into(), user.clone().into());
        }

        if let Some(ref tools) = self.tools {
            if !tools.is_empty() {
                let tool_defs: Vec<Value> = tools.iter().map(ToolDefinition::to_wire).collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }
        if let Some(ref choice) = self.tool_choice {
            obj.insert("tool_choice".into(), choice.to_wire());
        }

        if let Some(ref fmt) = self.response_format {
            match fmt {
                ResponseFormat::JsonObject => {
                    obj.insert("response_format".into(), serde_json::json!({"type": "json_object"}));
                }
                ResponseFormat::JsonSchema { schema, name } => {
                    obj.insert(
                        "response_format".into(),
                        serde_json::json!({
                            "type": "json_schema",
                            "json_schema": {
                                "name": name,
                                "schema": schema,
                                "strict": true,
                            }
                        }),
                    );
                }
                ResponseFormat::Text => {}
            }
        }

        if let Some(ref extra) = self.extra {
            for (key, value) in extra {
                obj.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Function tool definition sent to the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// How the model may pick tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

impl ToolChoice {
    pub fn to_wire(&self) -> Value {
        match self {
            ToolChoice::Auto => "auto".into(),
            ToolChoice::None => "none".into(),
            ToolChoice::Required => "required".into(),
            ToolChoice::Function(name) => serde_json::json!({
                "type": "function",
                "function": { "name": name },
            }),
        }
    }
}

/// Requested response format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
    JsonSchema { schema: Value, name: String },
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
}

impl FinishReason {
    /// Lenient parse; unknown reasons map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_only_requested_fields() {
        let settings = GenerationSettings::builder()
            .temperature(0.2)
            .max_tokens(64)
            .user("u-1")
            .build();
        let mut obj = Map::new();
        settings.apply_to(&mut obj);
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["temperature"], 0.2);
        assert_eq!(obj["max_tokens"], 64);
        assert_eq!(obj["user"], "u-1");
    }

    #[test]
    fn tools_and_choice_render_as_function_objects() {
        let settings = GenerationSettings {
            tools: Some(vec![ToolDefinition {
                name: "lookup".into(),
                description: "Look things up".into(),
                parameters: serde_json::json!({"type": "object"}),
            }]),
            tool_choice: Some(ToolChoice::Function("lookup".into())),
            response_format: Some(ResponseFormat::JsonObject),
            ..Default::default()
        };
        let mut obj = Map::new();
        settings.apply_to(&mut obj);
        assert_eq!(obj["tools"][0]["type"], "function");
        assert_eq!(obj["tools"][0]["function"]["name"], "lookup");
        assert_eq!(obj["tool_choice"]["function"]["name"], "lookup");
        assert_eq!(obj["response_format"]["type"], "json_object");
    }

    #[test]
    fn extra_fields_are_forwarded_verbatim() {
        let mut extra = Map::new();
        extra.insert("logprobs".into(), true.into());
        let settings = GenerationSettings {
            extra: Some(extra),
            ..Default::default()
        };
        let mut obj = Map::new();
        settings.apply_to(&mut obj);
        assert_eq!(obj["logprobs"], true);
    }

    #[test]
    fn finish_reason_parse_is_lenient() {
        assert_eq!(FinishReason::parse("tool_calls"), Some(FinishReason::ToolCalls));
        assert_eq!(FinishReason::parse("mystery"), None);
    }
}

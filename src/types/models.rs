//! Model catalogue types and name-based capability heuristics.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A model entry returned by `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

impl ModelList {
    /// Sorted ids of models matching `category`, or all ids if `None`.
    pub fn ids(&self, category: Option<ModelCategory>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .data
            .iter()
            .filter(|m| category.map_or(true, |c| c.matches(&m.id)))
            .map(|m| m.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Coarse model families recognised from their ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ModelCategory {
    Vision,
    Audio,
    Coding,
    Reasoning,
    Large,
}

impl ModelCategory {
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            ModelCategory::Vision => &["vision", "llava", "multimodal"],
            ModelCategory::Audio => &["voice", "tts", "stt", "audio"],
            ModelCategory::Coding => &["coder", "code"],
            ModelCategory::Reasoning => &["thinking", "reasoning", "r1"],
            ModelCategory::Large => &["405b", "235b", "120b"],
        }
    }

    pub fn matches(&self, model_id: &str) -> bool {
        let lower = model_id.to_ascii_lowercase();
        self.keywords().iter().any(|kw| lower.contains(kw))
    }
}

/// Capabilities inferred from a model id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCapabilities {
    pub model_id: String,
    pub supports_streaming: bool,
    pub supports_tools: bool,
    pub supports_json_mode: bool,
    pub supports_vision: bool,
    pub supports_audio: bool,
    pub max_context_length: u32,
    pub default_temperature: f64,
}

impl ModelCapabilities {
    pub fn from_model_id(model_id: &str) -> Self {
        let lower = model_id.to_ascii_lowercase();
        let has = |kws: &[&str]| kws.iter().any(|kw| lower.contains(kw));

        let mut caps = Self {
            model_id: model_id.to_string(),
            supports_streaming: true,
            supports_tools: true,
            supports_json_mode: true,
            supports_vision: has(&["vision", "llava", "multimodal", "visual"]),
            supports_audio: false,
            max_context_length: 8192,
            default_temperature: 1.0,
        };

        if has(&["voice", "tts", "stt", "audio", "speech"]) {
            // Speech models don't do text generation features.
            caps.supports_audio = true;
            caps.supports_streaming = false;
            caps.supports_tools = false;
            caps.supports_json_mode = false;
        }
        if has(&["coder", "code", "programming"]) {
            caps.default_temperature = 0.2;
        }
        if has(&["thinking", "reasoning", "r1"]) {
            caps.default_temperature = 0.7;
        }
        if has(&["405b", "235b", "120b", "80b"]) {
            caps.max_context_length = 32_768;
        } else if has(&["70b", "30b", "27b"]) {
            caps.max_context_length = 16_384;
        }

        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_follow_name_heuristics() {
        let voice = ModelCapabilities::from_model_id("fabric-voice-tts");
        assert!(voice.supports_audio);
        assert!(!voice.supports_streaming);

        let coder = ModelCapabilities::from_model_id("qwen-coder-70b");
        assert_eq!(coder.default_temperature, 0.2);
        assert_eq!(coder.max_context_length, 16_384);

        let plain = ModelCapabilities::from_model_id("wizard");
        assert_eq!(plain.max_context_length, 8192);
        assert!(plain.supports_tools);
    }

    #[test]
    fn category_filter_sorts_ids() {
        let list = ModelList {
            data: ["llava-13b", "deepseek-r1", "a-vision-model", "wizard"]
                .iter()
                .map(|id| ModelInfo {
                    id: id.to_string(),
                    created: 0,
                    owned_by: "tela".into(),
                })
                .collect(),
        };
        assert_eq!(list.ids(Some(ModelCategory::Vision)), vec!["a-vision-model", "llava-13b"]);
        assert_eq!(list.ids(None).len(), 4);
        assert_eq!("Reasoning".parse::<ModelCategory>().unwrap(), ModelCategory::Reasoning);
    }
}

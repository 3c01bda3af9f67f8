//! Model catalogue (`/models`).

use super::TelaClient;
use crate::error::{Result, TelaError};
use crate::types::{ModelCategory, ModelInfo, ModelList};

impl TelaClient {
    /// `GET /models`, retried on transient failures.
    pub async fn list_models(&self) -> Result<ModelList> {
        self.get_json(&self.url("models"), &[]).await
    }

    /// Look up a single model in the catalogue.
    pub async fn get_model(&self, model_id: &str) -> Result<ModelInfo> {
        let list = self.list_models().await?;
        list.data
            .into_iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| TelaError::NotFound(format!("model '{model_id}'")))
    }

    /// Sorted model ids, optionally narrowed to a category.
    pub async fn list_available_models(&self, category: Option<ModelCategory>) -> Result<Vec<String>> {
        Ok(self.list_models().await?.ids(category))
    }
}

pub mod gemini;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error as StdError;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };
use self::gemini::GeminiChatClient;
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Gemini => Arc::new(GeminiChatClient::from_config(config)?),
        LlmType::OpenAI => Arc::new(OpenAIChatClient::from_config(config)?),
        LlmType::Ollama => Arc::new(OllamaClient::from_config(config)?),
    };
    Ok(client)
}

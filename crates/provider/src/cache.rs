//! Provider instance cache keyed by model name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::openai::OpenAiClient;

/// Endpoint settings shared by every cached client.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
}

/// Builds one [`OpenAiClient`] per model on first use and hands out shared
/// handles afterwards. All clients share one connection pool.
pub struct ProviderCache {
    settings: ProviderSettings,
    http: reqwest::Client,
    clients: Mutex<HashMap<String, Arc<OpenAiClient>>>,
}

impl ProviderCache {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Client for `model`, created on first request.
    pub async fn get(&self, model: &str) -> Arc<OpenAiClient> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(model) {
            return Arc::clone(client);
        }
        tracing::info!(model, "Creating provider client");
        let client = Arc::new(OpenAiClient::with_client(
            self.http.clone(),
            self.settings.base_url.clone(),
            self.settings.api_key.clone(),
            model,
        ));
        clients.insert(model.to_string(), Arc::clone(&client));
        client
    }

    /// Number of distinct models with a live client.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

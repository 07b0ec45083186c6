use gemini_relay::config::RelayConfig;
use gemini_relay::services::providers::ContentGenerator;
use gemini_relay::startup::Application;
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;

pub const TEST_API_KEY: &str = "test-api-key";

/// Relay configuration bound to a random local port. `vars` override the
/// relay's environment variables.
pub fn test_config(vars: &[(&str, &str)]) -> RelayConfig {
    let mut vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.entry("RELAY_STATIC_DIR".to_string())
        .or_insert_with(|| format!("{}/public", env!("CARGO_MANIFEST_DIR")));

    let common = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
    };

    RelayConfig::from_lookup(common, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration")
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the real application (Gemini client) in the background.
    pub async fn spawn(config: RelayConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        Self::start(app)
    }

    /// Spawn the application around a custom generator.
    pub async fn spawn_with(config: RelayConfig, generator: Arc<dyn ContentGenerator>) -> Self {
        let app = Application::build_with_generator(config, generator)
            .await
            .expect("Failed to build test application");
        Self::start(app)
    }

    fn start(app: Application) -> Self {
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Self {
            address,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_relay(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/gemini"))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }
}

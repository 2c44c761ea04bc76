//! Client for the smart plug driving the grow light, spoken through a
//! Home-Assistant-style service API:
//! `POST {base}/api/services/<domain>/turn_on|turn_off {"entity_id": ...}`
//! and `GET {base}/api/states/<entity_id>` for the live switch state.

use crate::config::PlugConfig;
use crate::error::ToolError;
use serde_json::Value;
use std::time::Duration;

pub struct SmartPlugClient {
    base_url: String,
    entity_id: String,
    token: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl SmartPlugClient {
    pub fn new(config: &PlugConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            entity_id: config.entity_id.clone(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub async fn turn_on(&self) -> Result<(), ToolError> {
        self.call_service("turn_on").await
    }

    pub async fn turn_off(&self) -> Result<(), ToolError> {
        self.call_service("turn_off").await
    }

    async fn call_service(&self, service: &str) -> Result<(), ToolError> {
        // Domain is the prefix of the entity id ("switch" in "switch.grow_light").
        let domain = self.entity_id.split('.').next().unwrap_or("switch");
        let url = format!("{}/api/services/{domain}/{service}", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "entity_id": self.entity_id }));
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Peripheral(format!("plug {service} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ToolError::Peripheral(format!(
                "plug {service} returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Live switch state, `"on"`/`"off"`, or an error if the plug API is
    /// unreachable. Used to sync bookkeeping, never to gate safety checks.
    pub async fn state(&self) -> Result<String, ToolError> {
        let url = format!("{}/api/states/{}", self.base_url, self.entity_id);
        let mut request = self.client.get(&url).timeout(self.timeout);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Peripheral(format!("plug state query failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::Peripheral(format!(
                "plug state query returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Peripheral(format!("invalid plug state payload: {e}")))?;
        Ok(body
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

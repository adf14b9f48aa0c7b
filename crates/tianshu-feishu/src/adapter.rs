// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feishu channel adapter implementing [`ChannelAdapter`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tianshu_config::model::FeishuConfig;
use tianshu_core::{
    AdapterType, ChannelAdapter, DeliveryTarget, HealthStatus, MessageId, PluginAdapter,
    TianshuError,
};
use tianshu_render::{FeishuMessage, RendererRegistry, feishu};
use tracing::{debug, info};

use crate::client::FeishuClient;

/// Platform name used in delivery targets and chat addresses.
pub const PLATFORM: &str = "feishu";

/// Feishu channel adapter.
///
/// Built without an app id and secret it stays in a not-configured state:
/// every send fails with [`TianshuError::NotConfigured`] and no request is made.
pub struct FeishuChannel {
    client: Option<FeishuClient>,
    renderers: RendererRegistry<FeishuMessage>,
}

impl FeishuChannel {
    pub fn new(config: &FeishuConfig, request_timeout: Duration) -> Result<Self, TianshuError> {
        let credentials = config
            .app_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .zip(config.app_secret.as_deref().filter(|s| !s.is_empty()));
        let client = match credentials {
            Some((app_id, app_secret)) => {
                info!(app_id, "Feishu adapter configured");
                Some(FeishuClient::new(&config.base_url, app_id, app_secret, request_timeout)?)
            }
            None => {
                info!("Feishu credentials not set, adapter disabled");
                None
            }
        };
        Ok(Self {
            client,
            renderers: feishu::registry(),
        })
    }

    fn client(&self) -> Result<&FeishuClient, TianshuError> {
        self.client.as_ref().ok_or_else(|| TianshuError::NotConfigured {
            adapter: PLATFORM.to_string(),
        })
    }

    async fn send(
        &self,
        receive_id: &str,
        receive_id_type: &str,
        message: &FeishuMessage,
    ) -> Result<MessageId, TianshuError> {
        let message_id = self
            .client()?
            .send_message(receive_id, receive_id_type, &message.msg_type, &message.content)
            .await?;
        debug!(receive_id, msg_type = %message.msg_type, message_id = %message_id, "Feishu message sent");
        Ok(MessageId(message_id))
    }
}

#[async_trait]
impl PluginAdapter for FeishuChannel {
    fn name(&self) -> &str {
        PLATFORM
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TianshuError> {
        let Some(client) = &self.client else {
            return Ok(HealthStatus::Unhealthy("not configured".into()));
        };
        match client.tenant_access_token().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), TianshuError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for FeishuChannel {
    fn platform(&self) -> &str {
        PLATFORM
    }

    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<MessageId, TianshuError> {
        self.send(chat_id, "chat_id", &FeishuMessage::text(text)).await
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        semantic_type: &str,
        payload: &Value,
    ) -> Result<MessageId, TianshuError> {
        let message = self.renderers.render(semantic_type, payload);
        self.send(&target.receive_id, &target.receive_id_type, &message).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "tenant_access_token": "t-1", "expire": 7200
            })))
            .mount(&server)
            .await;
        server
    }

    fn configured(server: &MockServer) -> FeishuChannel {
        let config = FeishuConfig {
            app_id: Some("cli_1".into()),
            app_secret: Some("secret".into()),
            base_url: server.uri(),
        };
        FeishuChannel::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn missing_credentials_fail_fast() {
        let channel = FeishuChannel::new(&FeishuConfig::default(), Duration::from_secs(5)).unwrap();
        assert!(!channel.is_configured());
        let err = channel.send_text("oc_1", "hi").await.unwrap_err();
        assert!(matches!(err, TianshuError::NotConfigured { .. }));
        assert_eq!(
            channel.health_check().await.unwrap(),
            HealthStatus::Unhealthy("not configured".into())
        );
    }

    #[tokio::test]
    async fn deliver_renders_an_interactive_card_for_the_target() {
        let server = server().await;
        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .and(query_param("receive_id_type", "open_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": {"message_id": "om_card"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = configured(&server);
        let target = DeliveryTarget::new("feishu", "ou_bob").with_receive_id_type("open_id");
        let payload = json!({"title": "Deploy to prod", "cheq_id": "req-1"});
        let id = channel.deliver(&target, "approval_request", &payload).await.unwrap();
        assert_eq!(id, MessageId("om_card".into()));

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
        assert_eq!(body["msg_type"], "interactive");
        let card: Value = serde_json::from_str(body["content"].as_str().unwrap()).unwrap();
        assert_eq!(card["header"]["title"]["content"], "Deploy to prod");
    }

    #[tokio::test]
    async fn send_text_targets_the_chat() {
        let server = server().await;
        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages"))
            .and(query_param("receive_id_type", "chat_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": {"message_id": "om_text"}
            })))
            .mount(&server)
            .await;

        let channel = configured(&server);
        assert_eq!(channel.send_text("oc_1", "hello").await.unwrap().0, "om_text");
        assert_eq!(channel.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}

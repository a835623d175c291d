//! HTTP+JSON backend client

use crate::error::{BackendError, Result};
use crate::settings::BackendSettings;
use crate::wire::{
    IndustrialScenarioEnvelope, InstanceListing, ScenarioDocument, ToolConfigListing, ToolListing,
    ToolRecordPayload, UninstallRequest, UninstallResponse,
};
use crate::{Backend, ByteStream};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// `Backend` over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    settings: BackendSettings,
}

impl HttpBackend {
    /// Build a client for the given settings
    ///
    /// The configured timeout is applied per request on the JSON routes, so
    /// the streaming install can run for as long as it keeps producing.
    ///
    /// # Errors
    /// `Transport` if the underlying client cannot be constructed
    pub fn new(settings: BackendSettings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    #[must_use]
    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn timed(&self, request: RequestBuilder) -> RequestBuilder {
        match self.settings.timeout() {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        let url = self.settings.url(route);
        tracing::debug!(%url, "GET");
        let response = self.timed(self.client.get(&url)).send().await?;
        decode(ensure_success(response).await?).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> Result<Response> {
        let url = self.settings.url(route);
        tracing::debug!(%url, "POST");
        let response = self.timed(self.client.post(&url).json(body)).send().await?;
        ensure_success(response).await
    }
}

/// Turn a non-2xx response into `Rejected` with the body verbatim
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "backend rejected request");
    Err(BackendError::rejected(status.as_u16(), body))
}

/// Read the whole body, then parse it; a broken read is `Transport`, bad JSON
/// is `Malformed`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_instances(&self) -> Result<InstanceListing> {
        self.get_json(&self.settings.routes.instances).await
    }

    async fn fetch_tools(&self, instance: &str) -> Result<ToolListing> {
        let url = self.settings.url(&self.settings.routes.tools);
        let response = self
            .timed(self.client.get(&url).query(&[("instance", instance)]))
            .send()
            .await?;
        decode(ensure_success(response).await?).await
    }

    async fn persist_tools(&self, record: &ToolRecordPayload) -> Result<()> {
        self.post_json(&self.settings.routes.add_tool, record).await?;
        Ok(())
    }

    async fn uninstall_tool(&self, request: &UninstallRequest) -> Result<UninstallResponse> {
        let response = self
            .post_json(&self.settings.routes.uninstall_tool, request)
            .await?;
        decode(response).await
    }

    async fn install_all(&self) -> Result<ByteStream> {
        let url = self.settings.url(&self.settings.routes.install_all);
        tracing::debug!(%url, "POST (streaming)");
        let response = ensure_success(self.client.post(&url).send().await?).await?;

        let chunks = futures::stream::unfold(Some(response), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk.to_vec()), Some(response))),
                Ok(None) => None,
                Err(e) => Some((Err(BackendError::from(e)), None)),
            }
        });
        Ok(chunks.boxed())
    }

    async fn fetch_scenario(&self, name: &str) -> Result<ScenarioDocument> {
        self.get_json(&self.settings.routes.scenario_for(name)).await
    }

    async fn save_scenario(&self, document: &ScenarioDocument) -> Result<()> {
        self.post_json(&self.settings.routes.save_scenario, document)
            .await?;
        Ok(())
    }

    async fn save_industrial_scenario(&self, envelope: &IndustrialScenarioEnvelope) -> Result<()> {
        self.post_json(&self.settings.routes.save_industrial, envelope)
            .await?;
        Ok(())
    }

    async fn read_tool_configs(&self) -> Result<ToolConfigListing> {
        self.get_json(&self.settings.routes.tool_configs).await
    }
}

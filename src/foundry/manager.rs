//! HTTP client for the Foundry Local model management service.

use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::catalog::{self, FoundryModelInfo};
use super::FoundryError;
use super::service::FoundryCli;

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for catalog and status queries. Downloads and loads are unbounded.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the OpenAI-compatible API below the service URI.
const OPENAI_API_PATH: &str = "v1";

/// Final status line of a `/openai/download` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadResult {
    success: bool,
    #[serde(default)]
    error_message: Option<String>,
}

/// Manager for a local Foundry service: catalog lookup, download and load.
pub struct FoundryLocalManager {
    http: HttpClient,
    service_uri: Url,
    api_key: String,
    catalog: OnceCell<Vec<FoundryModelInfo>>,
}

impl FoundryLocalManager {
    /// Discover the local service through the `foundry` CLI, starting it if needed.
    ///
    /// # Errors
    /// Returns an error if the CLI is missing or the service does not come up.
    pub async fn start(api_key: &str) -> Result<Self, FoundryError> {
        let uri = FoundryCli::default().start_service().await?;
        Self::with_service_uri(uri.as_str(), api_key)
    }

    /// Attach to a service at a known URI without touching the CLI.
    ///
    /// # Errors
    /// Returns an error if the URI is not an absolute HTTP(S) URL.
    pub fn with_service_uri(uri: &str, api_key: &str) -> Result<Self, FoundryError> {
        let invalid = |reason: String| FoundryError::InvalidServiceUri { uri: uri.to_string(), reason };

        let mut service_uri = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;
        if !matches!(service_uri.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", service_uri.scheme())));
        }
        // Relative joins below are resolved against the root.
        service_uri.set_path("/");
        service_uri.set_query(None);

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FoundryError::Request { url: uri.to_string(), source: e })?;

        Ok(Self { http, service_uri, api_key: api_key.to_string(), catalog: OnceCell::new() })
    }

    /// Root URI of the management service.
    pub fn service_uri(&self) -> &Url {
        &self.service_uri
    }

    /// OpenAI-compatible endpoint exposed by the service.
    pub fn endpoint(&self) -> Url {
        // Joining a plain relative segment onto a root URL cannot fail.
        self.service_uri.join(OPENAI_API_PATH).unwrap_or_else(|_| self.service_uri.clone())
    }

    /// API key for the OpenAI-compatible endpoint. The local service ignores it.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Whether the service answers its status endpoint.
    pub async fn is_service_running(&self) -> bool {
        let Ok(url) = self.url("openai/status") else {
            return false;
        };
        match self.http.get(url).timeout(QUERY_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Status check failed: {}", e);
                false
            }
        }
    }

    /// Full model catalog. Fetched once per manager.
    pub async fn list_catalog_models(&self) -> Result<&[FoundryModelInfo], FoundryError> {
        let catalog = self
            .catalog
            .get_or_try_init(|| async {
                let url = self.url("foundry/list")?;
                let models: Vec<FoundryModelInfo> = self.get_json(url).await?;
                debug!("Catalog contains {} model(s)", models.len());
                Ok::<_, FoundryError>(models)
            })
            .await?;
        Ok(catalog.as_slice())
    }

    /// Resolve an alias or model id against the catalog.
    ///
    /// # Errors
    /// Returns [`FoundryError::ModelNotFound`] when nothing matches.
    pub async fn get_model_info(&self, alias_or_id: &str) -> Result<FoundryModelInfo, FoundryError> {
        let catalog = self.list_catalog_models().await?;
        catalog::resolve(catalog, alias_or_id).cloned().ok_or_else(|| FoundryError::ModelNotFound(alias_or_id.to_string()))
    }

    /// Ids of the models already downloaded to the local cache.
    pub async fn list_cached_models(&self) -> Result<Vec<String>, FoundryError> {
        let url = self.url("openai/models")?;
        self.get_json(url).await
    }

    /// Ids of the models currently loaded in the service.
    pub async fn list_loaded_models(&self) -> Result<Vec<String>, FoundryError> {
        let url = self.url("openai/loadedmodels")?;
        self.get_json(url).await
    }

    /// Download a model variant into the local cache.
    ///
    /// # Errors
    /// Returns an error if the request fails or the service reports failure.
    pub async fn download_model(&self, model: &FoundryModelInfo) -> Result<(), FoundryError> {
        info!("Downloading {} ({})...", model.alias, model.id);

        let url = self.url("openai/download")?;
        let body = json!({
            "model": {
                "Name": model.id,
                "Uri": model.uri,
                "Publisher": model.publisher,
                "ProviderType": model.download_provider_type(),
                "PromptTemplate": model.prompt_template,
            },
            "IgnorePipeReport": true,
        });

        let text = self.send_text(self.http.post(url.clone()).json(&body), &url).await?;
        let result = parse_download_result(&text).ok_or_else(|| FoundryError::Decode {
            url: url.to_string(),
            reason: "download response carried no status object".to_string(),
        })?;

        if !result.success {
            return Err(FoundryError::Download {
                model: model.id.clone(),
                reason: result.error_message.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        info!("Downloaded {}", model.id);
        Ok(())
    }

    /// Ensure a model is downloaded and loaded, returning its catalog entry.
    ///
    /// # Arguments
    /// * `alias_or_id` - Model alias (e.g. `qwen2.5-0.5b`) or full model id
    /// * `ttl` - How long the service keeps the model loaded while idle
    ///
    /// # Errors
    /// Returns an error if the model is unknown, fails to download, or fails to load.
    pub async fn load_model(&self, alias_or_id: &str, ttl: Duration) -> Result<FoundryModelInfo, FoundryError> {
        let model = self.get_model_info(alias_or_id).await?;
        debug!("Resolved '{}' to {}", alias_or_id, model);

        let cached = self.list_cached_models().await?;
        if cached.iter().any(|id| id == &model.id) {
            debug!("{} already cached", model.id);
        } else {
            self.download_model(&model).await?;
        }

        let mut url = self.url(&format!("openai/load/{}", model.id))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ttl", &ttl.as_secs().to_string());
            if let Some(ep) = model.execution_provider().load_hint() {
                query.append_pair("ep", ep);
            }
        }

        info!("Loading {} on {}", model.id, model.execution_provider());
        self.send_text(self.http.get(url.clone()), &url).await?;

        Ok(model)
    }

    fn url(&self, path: &str) -> Result<Url, FoundryError> {
        self.service_uri
            .join(path)
            .map_err(|e| FoundryError::InvalidServiceUri { uri: format!("{}{}", self.service_uri, path), reason: e.to_string() })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FoundryError> {
        let text = self.send_text(self.http.get(url.clone()).timeout(QUERY_TIMEOUT), &url).await?;
        serde_json::from_str(&text).map_err(|e| FoundryError::Decode { url: url.to_string(), reason: e.to_string() })
    }

    async fn send_text(&self, request: RequestBuilder, url: &Url) -> Result<String, FoundryError> {
        let response = request.send().await.map_err(|e| FoundryError::Request { url: url.to_string(), source: e })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FoundryError::Request { url: url.to_string(), source: e })?;

        if !status.is_success() {
            return Err(FoundryError::Http { url: url.to_string(), status: status.as_u16(), body });
        }
        Ok(body)
    }
}

/// Pull the trailing status object out of a download response.
///
/// The body is free-form progress text followed by a JSON object.
fn parse_download_result(text: &str) -> Option<DownloadResult> {
    text.rmatch_indices('{').find_map(|(idx, _)| serde_json::from_str(text[idx..].trim()).ok())
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;
    use crate::foundry::catalog::tests::CATALOG_JSON;

    const TTL: Duration = Duration::from_secs(600);

    async fn mock_catalog(server: &mut Server) -> mockito::Mock {
        server
            .mock("GET", "/foundry/list")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(CATALOG_JSON)
            .expect(1)
            .create_async()
            .await
    }

    #[test]
    fn test_parse_download_result_after_progress() {
        let text = "Downloading model: 10%\rDownloading model: 100%\n{\"success\":true,\"errorMessage\":null}";
        let result = parse_download_result(text).unwrap();
        assert!(result.success);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_parse_download_result_failure() {
        let text = "[progress] {\"success\":false,\"errorMessage\":\"disk full\"}\n";
        let result = parse_download_result(text).unwrap();
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_parse_download_result_missing() {
        assert!(parse_download_result("Downloading model: 100%").is_none());
    }

    #[test]
    fn test_endpoint_and_api_key() {
        let manager = FoundryLocalManager::with_service_uri("http://127.0.0.1:5273/openai/status", "secret").unwrap();
        assert_eq!(manager.service_uri().as_str(), "http://127.0.0.1:5273/");
        assert_eq!(manager.endpoint().as_str(), "http://127.0.0.1:5273/v1");
        assert_eq!(manager.api_key(), "secret");
    }

    #[test]
    fn test_invalid_service_uri() {
        let err = FoundryLocalManager::with_service_uri("not a url", "k").err().unwrap();
        assert!(matches!(err, FoundryError::InvalidServiceUri { .. }));

        let err = FoundryLocalManager::with_service_uri("ftp://127.0.0.1:21", "k").err().unwrap();
        assert!(matches!(err, FoundryError::InvalidServiceUri { .. }));
    }

    #[tokio::test]
    async fn test_catalog_fetched_once() {
        let mut server = Server::new_async().await;
        let list = mock_catalog(&mut server).await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        assert_eq!(manager.list_catalog_models().await.unwrap().len(), 5);
        let model = manager.get_model_info("phi-4-mini").await.unwrap();
        assert_eq!(model.id, "phi-4-mini-instruct-qnn-npu:1");

        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_cached_model() {
        let mut server = Server::new_async().await;
        let list = mock_catalog(&mut server).await;
        let cached = server
            .mock("GET", "/openai/models")
            .with_status(200)
            .with_body(r#"["qwen2.5-0.5b-instruct-generic-cpu:4"]"#)
            .create_async()
            .await;
        let download = server.mock("POST", "/openai/download").expect(0).create_async().await;
        let load = server
            .mock("GET", "/openai/load/qwen2.5-0.5b-instruct-generic-cpu:4")
            .match_query(Matcher::UrlEncoded("ttl".into(), "600".into()))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        let model = manager.load_model("qwen2.5-0.5b-cpu", TTL).await.unwrap();
        assert_eq!(model.id, "qwen2.5-0.5b-instruct-generic-cpu:4");

        list.assert_async().await;
        cached.assert_async().await;
        download.assert_async().await;
        load.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_downloads_missing_model_with_ep_hint() {
        let mut server = Server::new_async().await;
        let _list = mock_catalog(&mut server).await;
        let _cached = server.mock("GET", "/openai/models").with_status(200).with_body("[]").create_async().await;
        let download = server
            .mock("POST", "/openai/download")
            .match_body(Matcher::PartialJson(json!({
                "model": {"Name": "qwen2.5-0.5b-instruct-cuda-gpu:3", "ProviderType": "AzureFoundryLocal"},
                "IgnorePipeReport": true,
            })))
            .with_status(200)
            .with_body("Total 100.00% Downloading\n{\"success\":true,\"errorMessage\":null}")
            .expect(1)
            .create_async()
            .await;
        let load = server
            .mock("GET", "/openai/load/qwen2.5-0.5b-instruct-cuda-gpu:3")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ttl".into(), "120".into()),
                Matcher::UrlEncoded("ep".into(), "cuda".into()),
            ]))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        manager.load_model("qwen2.5-0.5b", Duration::from_secs(120)).await.unwrap();

        download.assert_async().await;
        load.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_unknown_model_issues_no_load() {
        let mut server = Server::new_async().await;
        let _list = mock_catalog(&mut server).await;
        let load = server.mock("GET", Matcher::Regex("^/openai/load/".into())).expect(0).create_async().await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        let err = manager.load_model("llama-9000", TTL).await.unwrap_err();
        assert!(matches!(err, FoundryError::ModelNotFound(ref name) if name == "llama-9000"));

        load.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_failure_reported() {
        let mut server = Server::new_async().await;
        let _list = mock_catalog(&mut server).await;
        let _cached = server.mock("GET", "/openai/models").with_status(200).with_body("[]").create_async().await;
        let _download = server
            .mock("POST", "/openai/download")
            .with_status(200)
            .with_body("{\"success\":false,\"errorMessage\":\"quota exceeded\"}")
            .create_async()
            .await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        let err = manager.load_model("phi-4-mini", TTL).await.unwrap_err();
        assert!(matches!(err, FoundryError::Download { ref reason, .. } if reason == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_load_http_error() {
        let mut server = Server::new_async().await;
        let _list = mock_catalog(&mut server).await;
        let _cached =
            server.mock("GET", "/openai/models").with_status(200).with_body(r#"["phi-4-mini-instruct-qnn-npu:1"]"#).create_async().await;
        let _load = server
            .mock("GET", "/openai/load/phi-4-mini-instruct-qnn-npu:1")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("no NPU present")
            .create_async()
            .await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        let err = manager.load_model("phi-4-mini", TTL).await.unwrap_err();
        assert!(matches!(err, FoundryError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_list_loaded_models_and_status() {
        let mut server = Server::new_async().await;
        let _loaded = server
            .mock("GET", "/openai/loadedmodels")
            .with_status(200)
            .with_body(r#"["qwen2.5-0.5b-instruct-generic-cpu:4"]"#)
            .create_async()
            .await;
        let _status = server.mock("GET", "/openai/status").with_status(200).with_body("{}").create_async().await;

        let manager = FoundryLocalManager::with_service_uri(&server.url(), "k").unwrap();
        assert_eq!(manager.list_loaded_models().await.unwrap(), vec!["qwen2.5-0.5b-instruct-generic-cpu:4".to_string()]);
        assert!(manager.is_service_running().await);
    }

    #[tokio::test]
    async fn test_service_not_running() {
        let manager = FoundryLocalManager::with_service_uri("http://127.0.0.1:1", "k").unwrap();
        assert!(!manager.is_service_running().await);
    }
}

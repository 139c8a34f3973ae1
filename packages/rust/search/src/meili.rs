//! Meilisearch REST client.
//!
//! Every write in Meilisearch is asynchronous: the request enqueues a task and
//! returns its uid. Writes here wait for their task to finish so engine-side
//! rejections (bad settings, bad documents) surface as errors with the
//! engine's own message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dictindex_shared::{DictIndexError, IndexSettings, Result, SearchConfig};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::SearchEngine;

/// User-Agent string for engine requests.
const USER_AGENT: &str = concat!("dictindex/", env!("CARGO_PKG_VERSION"));

/// Engine error code for a missing index.
const INDEX_NOT_FOUND: &str = "index_not_found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct TaskView {
    status: TaskStatus,
    #[serde(default)]
    error: Option<EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Deserialize)]
struct EngineError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a finished task.
enum TaskOutcome {
    Succeeded,
    Failed(EngineError),
}

/// Meilisearch implementation of [`SearchEngine`].
pub struct MeiliSearch {
    client: Client,
    host: Url,
    api_key: Option<String>,
    batch_size: usize,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl MeiliSearch {
    /// Create a client from the `[search]` config; the API key is read from
    /// the configured env var.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let host = Url::parse(&config.host).map_err(|e| {
            DictIndexError::config(format!("invalid search host '{}': {e}", config.host))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DictIndexError::Search(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            host,
            api_key: config.api_key(),
            batch_size: config.batch_size.max(1),
            poll_interval: config.task_poll_interval(),
            task_timeout: config.task_timeout(),
        })
    }

    /// Override the API key taken from the environment.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.host.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|e| DictIndexError::Search(e.to_string()))
    }

    /// Send a write request and return its task uid.
    async fn enqueue(&self, builder: RequestBuilder) -> Result<u64> {
        let response = self.send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let task: EnqueuedTask = response
            .json()
            .await
            .map_err(|e| DictIndexError::Search(format!("unexpected task response: {e}")))?;
        Ok(task.task_uid)
    }

    /// Poll a task until it reaches a final state.
    async fn wait_for_task(&self, uid: u64) -> Result<TaskOutcome> {
        let deadline = Instant::now() + self.task_timeout;

        loop {
            let response = self
                .send(self.request(Method::GET, &format!("tasks/{uid}")))
                .await?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let task: TaskView = response
                .json()
                .await
                .map_err(|e| DictIndexError::Search(format!("unexpected task view: {e}")))?;

            match task.status {
                TaskStatus::Succeeded => return Ok(TaskOutcome::Succeeded),
                TaskStatus::Failed => {
                    let error = task.error.unwrap_or_else(|| EngineError {
                        message: format!("task {uid} failed"),
                        code: None,
                    });
                    return Ok(TaskOutcome::Failed(error));
                }
                TaskStatus::Canceled => {
                    return Err(DictIndexError::Search(format!("task {uid} was canceled")));
                }
                TaskStatus::Enqueued | TaskStatus::Processing => {}
            }

            if Instant::now() >= deadline {
                return Err(DictIndexError::Search(format!(
                    "task {uid} did not finish within {}s",
                    self.task_timeout.as_secs()
                )));
            }
            debug!(uid, "task pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for a task and turn a failure into an error.
    async fn expect_success(&self, uid: u64) -> Result<()> {
        match self.wait_for_task(uid).await? {
            TaskOutcome::Succeeded => Ok(()),
            TaskOutcome::Failed(error) => Err(DictIndexError::Search(error.to_string())),
        }
    }
}

async fn error_from_response(response: reqwest::Response) -> DictIndexError {
    let status = response.status();
    match response.json::<EngineError>().await {
        Ok(error) => DictIndexError::Search(format!("HTTP {status}: {error}")),
        Err(_) => DictIndexError::Search(format!("HTTP {status}")),
    }
}

#[async_trait]
impl SearchEngine for MeiliSearch {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .send(self.request(Method::GET, &format!("indexes/{name}")))
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response).await),
        }
    }

    #[instrument(skip_all, fields(index = name))]
    async fn apply_settings(&self, name: &str, settings: &IndexSettings) -> Result<()> {
        let uid = self
            .enqueue(
                self.request(Method::PATCH, &format!("indexes/{name}/settings"))
                    .json(settings),
            )
            .await?;
        self.expect_success(uid).await?;

        info!("index settings updated");
        Ok(())
    }

    #[instrument(skip_all, fields(index = name, documents = documents.len()))]
    async fn add_documents(
        &self,
        name: &str,
        documents: &[Value],
        primary_key: &str,
    ) -> Result<()> {
        let mut tasks = Vec::new();
        for batch in documents.chunks(self.batch_size) {
            let uid = self
                .enqueue(
                    self.request(Method::POST, &format!("indexes/{name}/documents"))
                        .query(&[("primaryKey", primary_key)])
                        .json(batch),
                )
                .await?;
            debug!(uid, batch = batch.len(), "document batch enqueued");
            tasks.push(uid);
        }

        for uid in tasks {
            self.expect_success(uid).await?;
        }

        info!("documents added");
        Ok(())
    }

    #[instrument(skip_all, fields(index = name))]
    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self
            .send(self.request(Method::DELETE, &format!("indexes/{name}")))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("index already absent");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let task: EnqueuedTask = response
            .json()
            .await
            .map_err(|e| DictIndexError::Search(format!("unexpected task response: {e}")))?;

        match self.wait_for_task(task.task_uid).await? {
            TaskOutcome::Succeeded => {
                info!("index deleted");
                Ok(())
            }
            TaskOutcome::Failed(error) if error.code.as_deref() == Some(INDEX_NOT_FOUND) => {
                debug!("index already absent");
                Ok(())
            }
            TaskOutcome::Failed(error) => Err(DictIndexError::Search(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn engine(server: &MockServer, batch_size: usize) -> MeiliSearch {
        let config = SearchConfig {
            host: server.uri(),
            batch_size,
            task_poll_ms: 1,
            ..SearchConfig::default()
        };
        MeiliSearch::new(&config)
            .expect("client")
            .with_api_key(Some("secret".into()))
    }

    fn enqueued(uid: u64) -> ResponseTemplate {
        ResponseTemplate::new(202).set_body_json(json!({ "taskUid": uid, "status": "enqueued" }))
    }

    async fn mount_task(server: &MockServer, uid: u64, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/tasks/{uid}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn index_exists_maps_404_to_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/jmdict"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uid": "jmdict" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/nhk"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Index `nhk` not found.",
                "code": "index_not_found"
            })))
            .mount(&server)
            .await;

        let engine = engine(&server, 100);
        assert!(engine.index_exists("jmdict").await.unwrap());
        assert!(!engine.index_exists("nhk").await.unwrap());
    }

    #[tokio::test]
    async fn apply_settings_waits_for_task() {
        let server = MockServer::start().await;
        let settings = IndexSettings {
            distinct_attribute: Some("id".into()),
            searchable_attributes: vec!["word".into()],
            ..Default::default()
        };

        Mock::given(method("PATCH"))
            .and(path("/indexes/nhk/settings"))
            .and(body_json(json!({
                "distinctAttribute": "id",
                "searchableAttributes": ["word"]
            })))
            .respond_with(enqueued(7))
            .expect(1)
            .mount(&server)
            .await;
        mount_task(&server, 7, json!({ "uid": 7, "status": "succeeded" })).await;

        engine(&server, 100)
            .apply_settings("nhk", &settings)
            .await
            .expect("settings applied");
    }

    #[tokio::test]
    async fn failed_task_preserves_engine_message() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/indexes/nhk/settings"))
            .respond_with(enqueued(9))
            .mount(&server)
            .await;
        mount_task(
            &server,
            9,
            json!({
                "uid": 9,
                "status": "failed",
                "error": {
                    "message": "`rankingRules` contains an invalid rule: `fuzz`.",
                    "code": "invalid_settings_ranking_rules"
                }
            }),
        )
        .await;

        let err = engine(&server, 100)
            .apply_settings("nhk", &IndexSettings::default())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid rule: `fuzz`"), "{msg}");
        assert!(msg.contains("invalid_settings_ranking_rules"), "{msg}");
    }

    #[tokio::test]
    async fn documents_are_sent_in_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/kanjidic2/documents"))
            .and(query_param("primaryKey", "id"))
            .respond_with(enqueued(1))
            .expect(2)
            .mount(&server)
            .await;
        mount_task(&server, 1, json!({ "uid": 1, "status": "succeeded" })).await;

        let docs = vec![json!({ "id": 1 }), json!({ "id": 2 }), json!({ "id": 3 })];
        engine(&server, 2)
            .add_documents("kanjidic2", &docs, "id")
            .await
            .expect("documents added");
    }

    #[tokio::test]
    async fn rejected_request_reports_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/jmdict/documents"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "The `json` payload provided is malformed.",
                "code": "malformed_payload"
            })))
            .mount(&server)
            .await;

        let err = engine(&server, 10)
            .add_documents("jmdict", &[json!({ "id": 1 })], "id")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed"), "{err}");
    }

    #[tokio::test]
    async fn deleting_absent_index_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/indexes/jmnedict"))
            .respond_with(enqueued(3))
            .mount(&server)
            .await;
        mount_task(
            &server,
            3,
            json!({
                "uid": 3,
                "status": "failed",
                "error": { "message": "Index `jmnedict` not found.", "code": "index_not_found" }
            }),
        )
        .await;

        engine(&server, 10)
            .delete_index("jmnedict")
            .await
            .expect("absent index is fine");
    }

    #[tokio::test]
    async fn pending_task_is_polled_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/indexes/jmdict"))
            .respond_with(enqueued(5))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "uid": 5, "status": "processing" })),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_task(&server, 5, json!({ "uid": 5, "status": "succeeded" })).await;

        engine(&server, 10)
            .delete_index("jmdict")
            .await
            .expect("deleted after polling");
    }
}

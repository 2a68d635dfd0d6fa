//! External collaborators the wizard core treats as black boxes.
//!
//! Generators produce output from a draft snapshot; persistence stores a
//! reviewed result. Neither is ever retried by the core.

use crate::model::{SavedResult, WizardSettings};
use crate::wizard::Draft;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait Generator<G: Send + 'static>: Send + Sync {
    async fn generate(&self, draft: &Draft) -> Result<G>;
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save(&self, record: &SavedResult) -> Result<()>;
}

/// Adapts an async closure into a [`Generator`].
pub struct FnGenerator<F>(pub F);

#[async_trait]
impl<G, F, Fut> Generator<G> for FnGenerator<F>
where
    G: Send + 'static,
    F: Fn(Draft) -> Fut + Send + Sync,
    Fut: Future<Output = Result<G>> + Send,
{
    async fn generate(&self, draft: &Draft) -> Result<G> {
        (self.0)(draft.clone()).await
    }
}

/// Posts the draft as JSON and decodes the response body.
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, settings: &WizardSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.clone());
        if let Some(timeout) = settings.generation_timeout {
            // Slightly above the runner timeout so the runner reports it first.
            builder = builder.timeout(timeout + Duration::from_secs(1));
        }
        let client = builder.build().context("build generator http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl<G> Generator<G> for HttpGenerator
where
    G: DeserializeOwned + Send + 'static,
{
    async fn generate(&self, draft: &Draft) -> Result<G> {
        let resp = self
            .client
            .post(&self.url)
            .json(draft)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?
            .error_for_status()
            .context("generator rejected the request")?;
        resp.json::<G>()
            .await
            .context("decode generator response")
    }
}

/// Keeps saved results in memory; used when nothing should touch disk.
#[derive(Default)]
pub struct InMemoryPersistence {
    saved: Mutex<Vec<SavedResult>>,
}

impl InMemoryPersistence {
    pub fn saved(&self) -> Vec<SavedResult> {
        self.saved.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn save(&self, record: &SavedResult) -> Result<()> {
        self.saved
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory persistence poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::{runner, Outcome, TaskTracker};
    use serde::Deserialize;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Route {
        best_route: String,
    }

    /// Serve one request with a canned reply and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/generate", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (url, handle)
    }

    fn draft() -> Draft {
        Draft::new().with_field("islands", json!(["Bali", "Lombok"]))
    }

    #[tokio::test]
    async fn http_generator_posts_the_draft_and_decodes_the_reply() {
        let (url, server) = serve_once("200 OK", r#"{"best_route":"Bali → Lombok"}"#).await;
        let gen = HttpGenerator::new(url, &WizardSettings::default()).unwrap();
        let route: Route = gen.generate(&draft()).await.unwrap();
        assert_eq!(route.best_route, "Bali → Lombok");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /generate"));
        assert!(request.contains(r#""islands":["Bali","Lombok"]"#));
    }

    #[tokio::test]
    async fn http_error_status_is_a_rejection() {
        let (url, server) = serve_once("500 Internal Server Error", "{}").await;
        let gen = HttpGenerator::new(url, &WizardSettings::default()).unwrap();
        let err = Generator::<Route>::generate(&gen, &draft()).await.unwrap_err();
        assert!(format!("{err:#}").contains("rejected"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_reply_is_a_decode_error() {
        let (url, server) = serve_once("200 OK", "not json").await;
        let gen = HttpGenerator::new(url, &WizardSettings::default()).unwrap();
        let err = Generator::<Route>::generate(&gen, &draft()).await.unwrap_err();
        assert!(format!("{err:#}").contains("decode generator response"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn runner_reports_an_http_rejection_as_failed() {
        let (url, server) = serve_once("503 Service Unavailable", "{}").await;
        let gen = HttpGenerator::new(url, &WizardSettings::default()).unwrap();
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(draft()).unwrap();
        let completion = runner::execute::<Route>(&gen, ticket, None).await;
        match completion.outcome {
            Outcome::Failed(reason) => assert!(reason.contains("rejected"), "{reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
        server.await.unwrap();
    }
}

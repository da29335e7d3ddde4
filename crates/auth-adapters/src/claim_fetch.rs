//! HTTP strategies for retrieving a claim post.
//!
//! Each source is a URL template with `{handle}` and `{id}` placeholders.
//! A source fails on transport errors, any status other than 200, or an
//! empty body; oversized bodies are cut at the source's byte ceiling.

use std::time::Duration;

use async_trait::async_trait;
use domains::error::FetchError;
use domains::models::PostRef;
use domains::ports::PostFetcher;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const BOT_UA: &str = "Mozilla/5.0 (compatible; NewsroomBot/1.0)";

pub const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSource {
    pub name: String,
    pub url_template: String,
    pub max_bytes: usize,
    /// Sends `Accept: application/json` and a bot user agent.
    pub json: bool,
}

impl FetchSource {
    pub fn render(&self, post: &PostRef) -> String {
        self.url_template
            .replace("{handle}", &post.handle)
            .replace("{id}", &post.post_id)
    }
}

/// Syndication embed first, then the nitter mirrors, then the JSON mirrors.
pub fn default_sources() -> Vec<FetchSource> {
    let html = |name: &str, url: &str, max_bytes| FetchSource {
        name: name.into(),
        url_template: url.into(),
        max_bytes,
        json: false,
    };
    let json = |name: &str, url: &str| FetchSource {
        name: name.into(),
        url_template: url.into(),
        max_bytes: MIB,
        json: true,
    };
    vec![
        html(
            "syndication",
            "https://platform.twitter.com/embed/Tweet.html?id={id}",
            2 * MIB,
        ),
        html("nitter.net", "https://nitter.net/{handle}/status/{id}", MIB),
        html(
            "nitter.privacydev.net",
            "https://nitter.privacydev.net/{handle}/status/{id}",
            MIB,
        ),
        html(
            "nitter.poast.org",
            "https://nitter.poast.org/{handle}/status/{id}",
            MIB,
        ),
        json("fxtwitter", "https://api.fxtwitter.com/{handle}/status/{id}"),
        json("vxtwitter", "https://api.vxtwitter.com/{handle}/status/{id}"),
    ]
}

pub struct HttpPostFetcher {
    client: Client,
    source: FetchSource,
}

impl HttpPostFetcher {
    pub fn new(client: Client, source: FetchSource) -> Self {
        Self { client, source }
    }

    /// One fetcher per source, sharing a client with a per-request timeout.
    pub fn from_sources(
        sources: Vec<FetchSource>,
        timeout: Duration,
    ) -> Result<Vec<Self>, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(sources
            .into_iter()
            .map(|source| Self::new(client.clone(), source))
            .collect())
    }
}

#[async_trait]
impl PostFetcher for HttpPostFetcher {
    fn name(&self) -> &str {
        &self.source.name
    }

    async fn fetch(&self, post: &PostRef) -> Result<String, FetchError> {
        let url = self.source.render(post);
        let mut request = self.client.get(&url);
        request = if self.source.json {
            request.header(USER_AGENT, BOT_UA).header(ACCEPT, "application/json")
        } else {
            request.header(USER_AGENT, BROWSER_UA)
        };

        let mut response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let max = self.source.max_bytes;
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
        {
            let room = max - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                tracing::debug!(source = %self.source.name, max, "claim post body truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

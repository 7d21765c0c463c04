use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url, header};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Page size used when exhausting a collection resource.
pub const PER_PAGE: usize = 200;

/// Upper bound on pages fetched by `get_all`.
pub const MAX_PAGES: usize = 5_000;

pub type Query<'a> = [(&'a str, String)];

#[async_trait]
pub trait MattermostApi {
    /// One authenticated GET of `/api/v4/{segments...}`.
    async fn get(&self, segments: &[&str], query: &Query<'_>) -> Result<Value>;

    /// Fetches every page of a collection resource and concatenates them.
    async fn get_all(&self, segments: &[&str], query: &Query<'_>) -> Result<Vec<Value>>;
}

/// Error body returned by the Mattermost API.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    id: Option<String>,
}

pub struct MattermostClient {
    client: Client,
    base_url: Url,
}

impl MattermostClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .context("access token contains invalid characters")?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid Mattermost URL `{}`", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("invalid Mattermost URL `{}`", base_url);
        }

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid Mattermost URL `{}`", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl MattermostApi for MattermostClient {
    async fn get(&self, segments: &[&str], query: &Query<'_>) -> Result<Value> {
        let url = self.endpoint(segments)?;
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiError>(&body) {
                Ok(ApiError { message, id: Some(id) }) => {
                    anyhow!("GET {} returned {}: {} ({})", url, status, message, id)
                }
                Ok(ApiError { message, id: None }) => {
                    anyhow!("GET {} returned {}: {}", url, status, message)
                }
                Err(_) => anyhow!("GET {} returned {}", url, status),
            });
        }

        response
            .json()
            .await
            .with_context(|| format!("GET {} returned invalid JSON", url))
    }

    async fn get_all(&self, segments: &[&str], query: &Query<'_>) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut previous_first: Option<Value> = None;

        for page in 0..MAX_PAGES {
            let mut paged = query.to_vec();
            paged.push(("page", page.to_string()));
            paged.push(("per_page", PER_PAGE.to_string()));

            let Value::Array(batch) = self.get(segments, &paged).await? else {
                bail!("expected page {} of /{} to be an array", page, segments.join("/"));
            };

            let len = batch.len();
            debug!("page {} of /{}: {} items", page, segments.join("/"), len);

            // a server that ignores `page` keeps answering with the first page
            let first = batch.first().and_then(|item| item.get("id")).cloned();
            if first.is_some() && first == previous_first {
                bail!(
                    "page {} of /{} repeats the previous page; the server ignores paging",
                    page,
                    segments.join("/")
                );
            }
            previous_first = first;
            items.extend(batch);

            if len < PER_PAGE {
                return Ok(items);
            }
        }

        bail!(
            "/{} still had full pages after {} requests",
            segments.join("/"),
            MAX_PAGES
        )
    }
}

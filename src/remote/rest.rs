use crate::bib::model::Post;
use crate::error::BibSyncError;
use crate::remote::{AccountService, PostPage};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Option<Vec<serde_json::Value>>,
}

/// Decode each post on its own so one malformed record only costs that
/// record.
fn decode_page(body: PostsResponse, offset: usize) -> PostPage {
    let mut page = PostPage::default();
    for (idx, raw) in body.posts.unwrap_or_default().into_iter().enumerate() {
        match serde_json::from_value::<Post>(raw) {
            Ok(post) => page.posts.push(post),
            Err(err) => {
                tracing::warn!(position = offset + idx, error = %err, "skipping unreadable account post");
                page.unreadable += 1;
            }
        }
    }
    page
}

#[derive(Debug, Serialize)]
struct PostEnvelope<'a> {
    post: &'a Post,
}

#[derive(Debug, Default, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    resourcehash: Option<String>,
}

/// BibSonomy-style REST account reached with HTTP basic auth
/// (username + API key).
pub struct RestAccount {
    client: Client,
    base_url: String,
    username: String,
    api_key: String,
}

impl RestAccount {
    pub fn new(
        base_url: &str,
        username: &str,
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn posts_url(&self, user: &str) -> String {
        format!("{}/users/{}/posts", self.base_url, user)
    }

    fn post_url(&self, user: &str, hash: &str) -> String {
        format!("{}/users/{}/posts/{}", self.base_url, user, hash)
    }

    fn send(&self, method: &'static str, url: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .with_context(|| format!("{method} {url} failed"))?;
        if !response.status().is_success() {
            return Err(BibSyncError::RemoteStatus {
                method,
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }
        Ok(response)
    }
}

impl AccountService for RestAccount {
    fn fetch_posts(&self, user: &str, offset: usize, limit: usize) -> Result<PostPage> {
        let url = self.posts_url(user);
        let start = offset.to_string();
        let end = (offset + limit).to_string();
        let request = self.client.get(&url).query(&[
            ("resourcetype", "bibtex"),
            ("start", start.as_str()),
            ("end", end.as_str()),
        ]);
        let response = self.send("GET", &url, request)?;
        let body: PostsResponse = response
            .json()
            .with_context(|| format!("invalid posts payload from {url}"))?;
        Ok(decode_page(body, offset))
    }

    fn create_post(&self, post: &Post) -> Result<Option<String>> {
        let user = post
            .user
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or(self.username.as_str());
        let url = self.posts_url(user);
        let request = self.client.post(&url).json(&PostEnvelope { post });
        let response = self.send("POST", &url, request)?;
        // An empty body is a rejected post, not a transport failure.
        let text = response.text().unwrap_or_default();
        let body: CreateResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(body.resourcehash.filter(|id| !id.trim().is_empty()))
    }

    fn update_post(&self, post: &Post) -> Result<()> {
        let user = post
            .user
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or(self.username.as_str());
        let url = self.post_url(user, post.identity_hash());
        let request = self.client.put(&url).json(&PostEnvelope { post });
        self.send("PUT", &url, request)?;
        Ok(())
    }

    fn delete_posts(&self, user: &str, hashes: &[String]) -> Result<()> {
        for hash in hashes {
            let url = self.post_url(user, hash);
            let request = self.client.delete(&url);
            self.send("DELETE", &url, request)?;
        }
        Ok(())
    }
}

//! forge::github
//!
//! GitHub implementation of the collaborator traits using the REST API.
//!
//! # Endpoints
//!
//! | Operation            | Request                                          |
//! |----------------------|--------------------------------------------------|
//! | `fetch_manifest`     | `GET /repos/{o}/{r}/contents/{path}`             |
//! | `default_branch_tip` | `GET /repos/{o}/{r}` then `GET .../git/ref/heads/{b}` |
//! | `file_handle`        | `GET /repos/{o}/{r}/contents/{path}?ref={b}`     |
//! | `create_branch`      | `POST /repos/{o}/{r}/git/refs`                   |
//! | `write_file`         | `PUT /repos/{o}/{r}/contents/{path}` with `sha`  |
//! | `open_pull_request`  | `POST /repos/{o}/{r}/pulls`                      |
//!
//! # Rate Limiting
//!
//! Rate limits surface as `ForgeError::RateLimited` (HTTP 429, or 403 with
//! `x-ratelimit-remaining: 0`). Nothing is retried here.
//!
//! # Example
//!
//! ```ignore
//! use early_adopter::forge::github::GitHubForge;
//! use early_adopter::forge::ManifestSource;
//!
//! let forge = GitHubForge::new("ghp_xxx");
//! let repo = RepoRef::parse("apbarrero/earlyad")?;
//! let fetched = forge.fetch_manifest(&repo, "package.json").await?;
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    BranchTip, CommitInfo, CreatePrRequest, FetchedManifest, FileHandle, ForgeError,
    ManifestSource, PullRequest, RepositoryHost, WriteFileRequest,
};
use crate::core::config::DEFAULT_API_BASE;
use crate::core::manifest::Manifest;
use crate::core::reference::RepoRef;

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "earlyad";

/// GitHub REST API version header value.
const API_VERSION: &str = "2022-11-28";

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token
    token: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("has_token", &!self.token.is_empty())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    /// Create a forge for api.github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a forge with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise (`https://github.example.com/api/v3`).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// The API base URL in use.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        if self.token.is_empty() {
            return Err(ForgeError::AuthRequired);
        }
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            ForgeError::PermissionDenied("token contains invalid header characters".into())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, repo: &RepoRef, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base,
            repo.owner(),
            repo.name(),
            path
        )
    }

    /// Send a request and decode a JSON response.
    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ForgeError> {
        let response = request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        self.handle_response(response).await
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(Self::error_from_response(response, status).await)
        }
    }

    /// Map an error response to a `ForgeError`.
    async fn error_from_response(response: Response, status: StatusCode) -> ForgeError {
        let rate_limit_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");

        // Try to get error message from body
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        classify_status(status, rate_limit_exhausted, message)
    }
}

/// Map an HTTP status and message to a `ForgeError`.
fn classify_status(status: StatusCode, rate_limit_exhausted: bool, message: String) -> ForgeError {
    match status {
        StatusCode::FORBIDDEN if rate_limit_exhausted => ForgeError::RateLimited,
        StatusCode::UNAUTHORIZED => ForgeError::PermissionDenied("Invalid or expired token".into()),
        StatusCode::FORBIDDEN => ForgeError::PermissionDenied(message),
        StatusCode::NOT_FOUND => ForgeError::NotFound(message),
        StatusCode::CONFLICT => ForgeError::Conflict(message),
        StatusCode::UNPROCESSABLE_ENTITY if is_conflict_message(&message) => {
            ForgeError::Conflict(message)
        }
        StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
        _ if status.is_server_error() => ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("GitHub server error: {}", message),
        },
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

/// GitHub reports some precondition failures as 422.
fn is_conflict_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already exists") || lower.contains("does not match")
}

/// Decode the base64 payload of a contents response.
fn decode_content(content: &GitHubContent) -> Result<String, ForgeError> {
    if content.encoding.as_deref().unwrap_or("base64") != "base64" {
        return Err(ForgeError::InvalidContent(format!(
            "unsupported encoding '{}' for {}",
            content.encoding.as_deref().unwrap_or_default(),
            content.path
        )));
    }
    let raw = content.content.as_deref().unwrap_or_default();
    // GitHub wraps the payload at 60 columns
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| ForgeError::InvalidContent(format!("{}: {}", content.path, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ForgeError::InvalidContent(format!("{}: {}", content.path, e)))
}

#[async_trait]
impl ManifestSource for GitHubForge {
    async fn fetch_manifest(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<FetchedManifest, ForgeError> {
        debug!(repo = %repo.slug(), path, "fetching manifest");
        let url = self.repo_url(repo, &format!("contents/{}", path));
        let content: GitHubContent = self.send(self.client.get(&url)).await?;
        let text = decode_content(&content)?;
        let manifest = Manifest::from_json(&text)
            .map_err(|e| ForgeError::InvalidContent(format!("{}: {}", path, e)))?;
        Ok(FetchedManifest {
            manifest,
            sha: content.sha,
        })
    }
}

#[async_trait]
impl RepositoryHost for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn default_branch_tip(&self, repo: &RepoRef) -> Result<BranchTip, ForgeError> {
        let url = format!(
            "{}/repos/{}/{}",
            self.api_base,
            repo.owner(),
            repo.name()
        );
        let info: GitHubRepository = self.send(self.client.get(&url)).await?;

        let url = self.repo_url(repo, &format!("git/ref/heads/{}", info.default_branch));
        let reference: GitHubRef = self.send(self.client.get(&url)).await?;

        debug!(
            repo = %repo.slug(),
            branch = %info.default_branch,
            sha = %reference.object.sha,
            "read default branch tip"
        );
        Ok(BranchTip {
            branch: info.default_branch,
            sha: reference.object.sha,
        })
    }

    async fn file_handle(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<FileHandle, ForgeError> {
        let url = self.repo_url(repo, &format!("contents/{}", path));
        let content: GitHubContent = self
            .send(self.client.get(&url).query(&[("ref", branch)]))
            .await?;
        Ok(FileHandle {
            path: content.path,
            sha: content.sha,
        })
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), ForgeError> {
        let url = self.repo_url(repo, "git/refs");
        let body = CreateRefBody {
            ref_name: format!("refs/heads/{}", branch),
            sha,
        };
        let _created: GitHubRef = self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn write_file(
        &self,
        repo: &RepoRef,
        request: WriteFileRequest,
    ) -> Result<CommitInfo, ForgeError> {
        let url = self.repo_url(repo, &format!("contents/{}", request.path));
        let body = UpdateFileBody {
            message: &request.message,
            content: BASE64.encode(request.content.as_bytes()),
            sha: &request.expected_sha,
            branch: &request.branch,
        };
        let response: UpdateFileResponse = self.send(self.client.put(&url).json(&body)).await?;
        Ok(CommitInfo {
            sha: response.commit.sha,
        })
    }

    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url(repo, "pulls");
        let body = CreatePrBody {
            head: &request.head,
            base: &request.base,
            title: &request.title,
            body: request.body.as_deref(),
            draft: request.draft,
        };
        let pr: GitHubPullRequest = self.send(self.client.post(&url).json(&body)).await?;
        Ok(pr.into())
    }
}

// --------------------------------------------------------------------------
// Wire types
// --------------------------------------------------------------------------

/// Request body for creating a ref.
#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

/// Request body for updating a file.
#[derive(Serialize)]
struct UpdateFileBody<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

/// Request body for creating a PR.
#[derive(Serialize)]
struct CreatePrBody<'a> {
    head: &'a str,
    base: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    draft: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// Subset of the repository resource.
#[derive(Deserialize)]
struct GitHubRepository {
    default_branch: String,
}

/// Git reference resource.
#[derive(Deserialize)]
struct GitHubRef {
    object: GitHubObject,
}

/// Object a reference points at.
#[derive(Deserialize)]
struct GitHubObject {
    sha: String,
}

/// Contents API file resource.
#[derive(Deserialize)]
struct GitHubContent {
    path: String,
    sha: String,
    content: Option<String>,
    encoding: Option<String>,
}

/// Response to a contents update.
#[derive(Deserialize)]
struct UpdateFileResponse {
    commit: GitHubObject,
}

/// GitHub PR response format.
#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    head: GitHubBranchRef,
    base: GitHubBranchRef,
    title: String,
}

/// GitHub ref (head/base) format.
#[derive(Deserialize)]
struct GitHubBranchRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        PullRequest {
            number: pr.number,
            url: pr.html_url,
            head: pr.head.ref_name,
            base: pr.base.ref_name,
            title: pr.title,
        }
    }
}

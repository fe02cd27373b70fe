//! HTTP client for a git-hosting contents API.
//!
//! `GET  {api}/repos/{repo}/contents/{path}?ref={branch}` returns
//! `{content: base64, sha}`; `PUT` on the same URL with
//! `{message, content, branch, sha?}` creates or updates the file.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::error::{NotFound, RemoteError};
use super::{PutOutcome, PutRequest, RemoteBlob, RemoteStore};

/// Timeout for the repository existence check after a failed probe.
const REPO_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Client for one file in one repository.
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    api_base: String,
    repo: String,
    file_path: String,
    token: String,
}

impl ContentClient {
    pub fn new(
        api_base: &str,
        repo: &str,
        file_path: &str,
        token: &str,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lotes/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RemoteError::from_reqwest)?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            file_path: file_path.trim_start_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base, self.repo, self.file_path
        )
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}", self.api_base, self.repo)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Reads the file on one branch. `Ok(None)` on 404.
    async fn get_contents(
        &self,
        branch: &str,
        timeout: Duration,
    ) -> Result<Option<RemoteBlob>, RemoteError> {
        let response = self
            .request(Method::GET, &self.contents_url())
            .query(&[("ref", branch)])
            .timeout(timeout)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => return Err(RemoteError::from_status(status)),
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(Some(RemoteBlob {
            content: decode_content(&body.content)?,
            sha: body.sha,
            branch: branch.to_string(),
        }))
    }

    /// Explains why no branch had the file.
    async fn diagnose_missing(&self, tried: Vec<String>) -> RemoteError {
        let result = self
            .request(Method::GET, &self.repo_url())
            .timeout(REPO_CHECK_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => return RemoteError::from_reqwest(e),
        };

        match response.status() {
            StatusCode::OK => RemoteError::NotFound(NotFound::File {
                path: self.file_path.clone(),
                tried,
            }),
            StatusCode::NOT_FOUND => RemoteError::NotFound(NotFound::Repo {
                repo: self.repo.clone(),
            }),
            status => RemoteError::from_status(status),
        }
    }
}

impl RemoteStore for ContentClient {
    async fn fetch(
        &self,
        branches: &[String],
        timeout: Duration,
    ) -> Result<RemoteBlob, RemoteError> {
        let mut tried = Vec::with_capacity(branches.len());

        for branch in branches {
            tried.push(branch.clone());
            if let Some(blob) = self.get_contents(branch, timeout).await? {
                tracing::debug!("Fetched {} from branch {}", self.file_path, branch);
                return Ok(blob);
            }
            tracing::debug!("{} not on branch {}", self.file_path, branch);
        }

        Err(self.diagnose_missing(tried).await)
    }

    async fn put(&self, request: PutRequest) -> Result<PutOutcome, RemoteError> {
        let body = PutBody {
            message: &request.message,
            content: BASE64.encode(request.content.as_bytes()),
            branch: &request.branch,
            sha: request.sha.as_deref(),
        };

        let response = self
            .request(Method::PUT, &self.contents_url())
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        match response.status() {
            StatusCode::CREATED => Ok(PutOutcome::Created),
            StatusCode::OK => Ok(PutOutcome::Updated),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(NotFound::Repo {
                repo: self.repo.clone(),
            })),
            status => Err(RemoteError::from_status(status)),
        }
    }
}

/// Decodes the API's base64 payload, which is wrapped with newlines.
fn decode_content(encoded: &str) -> Result<String, RemoteError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| RemoteError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    const TOKEN: &str = "test-token";

    #[derive(Default)]
    struct MockRepo {
        exists: bool,
        /// branch -> (content, sha)
        files: HashMap<String, (String, String)>,
        puts: usize,
    }

    type Shared = Arc<Mutex<MockRepo>>;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false)
    }

    fn status(code: StatusCode) -> Response {
        (code, Json(json!({ "message": code.to_string() }))).into_response()
    }

    async fn get_contents(
        State(state): State<Shared>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        if !authorized(&headers) {
            return status(StatusCode::UNAUTHORIZED);
        }
        let repo = state.lock().unwrap();
        let branch = params.get("ref").cloned().unwrap_or_default();
        match repo.files.get(&branch) {
            Some((content, sha)) if repo.exists => {
                // The real API wraps base64 at 60 columns.
                let encoded = BASE64.encode(content.as_bytes());
                let wrapped: Vec<String> = encoded
                    .as_bytes()
                    .chunks(60)
                    .map(|c| String::from_utf8(c.to_vec()).unwrap())
                    .collect();
                Json(json!({ "content": wrapped.join("\n"), "sha": sha })).into_response()
            }
            _ => status(StatusCode::NOT_FOUND),
        }
    }

    async fn put_contents(
        State(state): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Response {
        if !authorized(&headers) {
            return status(StatusCode::UNAUTHORIZED);
        }
        let mut repo = state.lock().unwrap();
        if !repo.exists {
            return status(StatusCode::NOT_FOUND);
        }
        let branch = body["branch"].as_str().unwrap_or_default().to_string();
        let sent_sha = body["sha"].as_str().map(str::to_string);
        let current_sha = repo.files.get(&branch).map(|(_, sha)| sha.clone());

        if current_sha.is_some() && sent_sha != current_sha {
            return status(StatusCode::CONFLICT);
        }

        let content = BASE64.decode(body["content"].as_str().unwrap_or_default()).unwrap();
        repo.puts += 1;
        let new_sha = format!("sha-{}", repo.puts);
        repo.files
            .insert(branch, (String::from_utf8(content).unwrap(), new_sha.clone()));

        let code = if current_sha.is_some() {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        (code, Json(json!({ "content": { "sha": new_sha } }))).into_response()
    }

    async fn get_repo(State(state): State<Shared>, headers: HeaderMap) -> Response {
        if !authorized(&headers) {
            return status(StatusCode::UNAUTHORIZED);
        }
        if state.lock().unwrap().exists {
            Json(json!({ "full_name": "acme/lotes" })).into_response()
        } else {
            status(StatusCode::NOT_FOUND)
        }
    }

    async fn spawn_mock(repo: MockRepo) -> (String, Shared) {
        let state: Shared = Arc::new(Mutex::new(repo));
        let app = Router::new()
            .route("/repos/{owner}/{repo}", get(get_repo))
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(get_contents).put(put_contents),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), state)
    }

    fn repo_with(branch: &str, content: &str) -> MockRepo {
        let mut repo = MockRepo {
            exists: true,
            ..Default::default()
        };
        repo.files
            .insert(branch.to_string(), (content.to_string(), "sha-0".to_string()));
        repo
    }

    fn client(base: &str, token: &str) -> ContentClient {
        ContentClient::new(base, "acme/lotes", "lotes_template.csv", token).unwrap()
    }

    fn branches(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_fetch_decodes_wrapped_content() {
        let content = "ID,Branch\n".repeat(20);
        let (base, _state) = spawn_mock(repo_with("main", &content)).await;

        let blob = client(&base, TOKEN)
            .fetch(&branches(&["main"]), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(blob.content, content);
        assert_eq!(blob.sha, "sha-0");
        assert_eq!(blob.branch, "main");
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_next_branch() {
        let (base, _state) = spawn_mock(repo_with("master", "data")).await;

        let blob = client(&base, TOKEN)
            .fetch(&branches(&["develop", "main", "master"]), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(blob.branch, "master");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_lists_tried_branches() {
        let (base, _state) = spawn_mock(repo_with("gh-pages", "data")).await;

        let err = client(&base, TOKEN)
            .fetch(&branches(&["develop", "main", "master"]), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::NotFound(NotFound::File {
                path: "lotes_template.csv".to_string(),
                tried: branches(&["develop", "main", "master"]),
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_missing_repo() {
        let (base, _state) = spawn_mock(MockRepo::default()).await;

        let err = client(&base, TOKEN)
            .fetch(&branches(&["main"]), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(NotFound::Repo { .. })));
    }

    #[tokio::test]
    async fn test_fetch_bad_token() {
        let (base, _state) = spawn_mock(repo_with("main", "data")).await;

        let err = client(&base, "wrong")
            .fetch(&branches(&["main", "master"]), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Auth);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr), TOKEN)
            .fetch(&branches(&["main"]), TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_put_creates_then_updates() {
        let repo = MockRepo {
            exists: true,
            ..Default::default()
        };
        let (base, state) = spawn_mock(repo).await;
        let client = client(&base, TOKEN);

        let created = client
            .put(PutRequest {
                content: "first".to_string(),
                message: "create".to_string(),
                branch: "main".to_string(),
                sha: None,
                timeout: TIMEOUT,
            })
            .await
            .unwrap();
        assert_eq!(created, PutOutcome::Created);

        let current = client.fetch(&branches(&["main"]), TIMEOUT).await.unwrap();
        assert_eq!(current.content, "first");

        let updated = client
            .put(PutRequest {
                content: "second".to_string(),
                message: "update".to_string(),
                branch: "main".to_string(),
                sha: Some(current.sha),
                timeout: TIMEOUT,
            })
            .await
            .unwrap();
        assert_eq!(updated, PutOutcome::Updated);
        assert_eq!(state.lock().unwrap().files["main"].0, "second");
    }

    #[tokio::test]
    async fn test_put_with_stale_sha_is_precondition_failure() {
        let (base, state) = spawn_mock(repo_with("main", "remote")).await;

        let err = client(&base, TOKEN)
            .put(PutRequest {
                content: "local".to_string(),
                message: "update".to_string(),
                branch: "main".to_string(),
                sha: Some("stale".to_string()),
                timeout: TIMEOUT,
            })
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::PreconditionFailed);
        assert_eq!(state.lock().unwrap().files["main"].0, "remote");
    }

    #[test]
    fn test_decode_content_rejects_garbage() {
        assert!(matches!(
            decode_content("!!not base64!!"),
            Err(RemoteError::Decode(_))
        ));
        assert_eq!(decode_content("aGVs\nbG8=\n").unwrap(), "hello");
    }
}

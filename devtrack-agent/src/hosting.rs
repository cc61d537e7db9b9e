//! Hosting-provider access: finding or creating the remote repository the
//! activity log is pushed to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const GITHUB_API: &str = "https://api.github.com";

#[derive(Error, Debug)]
pub enum HostingError {
    #[error("Not authenticated with the hosting provider")]
    Unauthenticated,

    #[error("Hosting API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait RemoteRepoDirectory: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, HostingError>;

    /// Creates the repository and returns its clone URL, or `None` when the
    /// provider accepted the request without reporting one.
    async fn create(&self, name: &str, private: bool) -> Result<Option<String>, HostingError>;

    async fn current_username(&self) -> Result<Option<String>, HostingError>;

    async fn set_visibility(&self, name: &str, private: bool) -> Result<(), HostingError>;
}

/// Returns the clone URL of `name` for the current user, creating the
/// repository first when it does not exist yet.
pub async fn resolve_remote(
    directory: &dyn RemoteRepoDirectory,
    name: &str,
    private: bool,
) -> Result<String, HostingError> {
    let username = directory
        .current_username()
        .await?
        .ok_or(HostingError::Unauthenticated)?;

    if directory.exists(name).await? {
        debug!("Remote repository {}/{} already exists", username, name);
        return Ok(clone_url(&username, name));
    }

    info!("Creating remote repository {}/{}", username, name);
    let url = directory.create(name, private).await?;
    Ok(url.unwrap_or_else(|| clone_url(&username, name)))
}

pub fn clone_url(owner: &str, name: &str) -> String {
    format!("https://github.com/{}/{}.git", owner, name)
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    clone_url: Option<String>,
}

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
    description: &'a str,
}

#[derive(Serialize)]
struct VisibilityRequest {
    private: bool,
}

/// GitHub REST API client authenticated with a personal access token.
#[derive(Clone)]
pub struct GitHubDirectory {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubDirectory {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(GITHUB_API, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, "devtrack")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn owner(&self) -> Result<String, HostingError> {
        self.current_username()
            .await?
            .ok_or(HostingError::Unauthenticated)
    }
}

async fn api_error(response: reqwest::Response) -> HostingError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    if status == 401 {
        HostingError::Unauthenticated
    } else {
        HostingError::Api { status, message }
    }
}

#[async_trait]
impl RemoteRepoDirectory for GitHubDirectory {
    async fn exists(&self, name: &str) -> Result<bool, HostingError> {
        let owner = self.owner().await?;
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{}/{}", owner, name))
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(api_error(response).await),
        }
    }

    async fn create(&self, name: &str, private: bool) -> Result<Option<String>, HostingError> {
        let response = self
            .request(reqwest::Method::POST, "/user/repos")
            .json(&CreateRepoRequest {
                name,
                private,
                auto_init: false,
                description: "Coding activity log generated by devtrack",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let repo: RepoResponse = response.json().await?;
        Ok(repo.clone_url)
    }

    async fn current_username(&self) -> Result<Option<String>, HostingError> {
        let response = self.request(reqwest::Method::GET, "/user").send().await?;
        match response.status().as_u16() {
            401 | 403 => Ok(None),
            code if (200..300).contains(&code) => {
                let user: UserResponse = response.json().await?;
                Ok(Some(user.login))
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn set_visibility(&self, name: &str, private: bool) -> Result<(), HostingError> {
        let owner = self.owner().await?;
        let response = self
            .request(reqwest::Method::PATCH, &format!("/repos/{}/{}", owner, name))
            .json(&VisibilityRequest { private })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        info!(
            "Set {}/{} to {}",
            owner,
            name,
            if private { "private" } else { "public" }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDirectory {
        user: Option<String>,
        repos: Mutex<BTreeMap<String, bool>>,
    }

    #[async_trait]
    impl RemoteRepoDirectory for FakeDirectory {
        async fn exists(&self, name: &str) -> Result<bool, HostingError> {
            Ok(self.repos.lock().unwrap().contains_key(name))
        }

        async fn create(&self, name: &str, private: bool) -> Result<Option<String>, HostingError> {
            self.repos.lock().unwrap().insert(name.to_string(), private);
            Ok(None)
        }

        async fn current_username(&self) -> Result<Option<String>, HostingError> {
            Ok(self.user.clone())
        }

        async fn set_visibility(&self, name: &str, private: bool) -> Result<(), HostingError> {
            self.repos.lock().unwrap().insert(name.to_string(), private);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resolve_creates_missing_repository() {
        let directory = FakeDirectory {
            user: Some("octo".into()),
            ..FakeDirectory::default()
        };

        let url = resolve_remote(&directory, "code-tracking", true).await.unwrap();

        assert_eq!(url, "https://github.com/octo/code-tracking.git");
        assert_eq!(directory.repos.lock().unwrap().get("code-tracking"), Some(&true));
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_repository() {
        let directory = FakeDirectory {
            user: Some("octo".into()),
            ..FakeDirectory::default()
        };
        directory.repos.lock().unwrap().insert("log".into(), false);

        let url = resolve_remote(&directory, "log", true).await.unwrap();

        assert_eq!(url, clone_url("octo", "log"));
        assert_eq!(directory.repos.lock().unwrap().get("log"), Some(&false));
    }

    #[tokio::test]
    async fn test_resolve_requires_login() {
        let directory = FakeDirectory::default();
        assert!(matches!(
            resolve_remote(&directory, "log", true).await,
            Err(HostingError::Unauthenticated)
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let directory = GitHubDirectory::with_base_url("https://ghe.example.com/api/v3/", "t");
        assert_eq!(directory.base_url, "https://ghe.example.com/api/v3");
    }
}

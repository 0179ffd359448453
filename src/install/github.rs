//! Release host API interaction

use reqwest::Client;
use serde::Deserialize;

use super::error::{InstallError, Result};
use crate::config::RepoSlug;

/// Subset of the release payload we care about
///
/// Everything else in the response is ignored.
#[derive(Deserialize, Debug)]
struct LatestRelease {
    #[serde(default)]
    tag_name: Option<serde_json::Value>,
}

/// Resolved repository identity and version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseIdentity {
    pub repo: RepoSlug,
    /// Opaque tag, usually `vMAJOR.MINOR.PATCH`; never parsed
    pub tag: String,
}

/// Build the HTTP client shared by the release lookup and the download
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| InstallError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Bearer token for the release API, if the caller exported one
fn api_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN")
        .or_else(|_| std::env::var("GH_TOKEN"))
        .ok()
        .filter(|token| !token.is_empty())
}

/// Fetch the tag of the latest published release of `repo`
pub async fn get_latest_release(
    client: &Client,
    api_url: &str,
    repo: &RepoSlug,
) -> Result<ReleaseIdentity> {
    let url = format!(
        "{}/repos/{}/{}/releases/latest",
        api_url.trim_end_matches('/'),
        repo.owner,
        repo.name
    );
    log::debug!("Fetching latest release from {url}");

    let mut request = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json");
    if let Some(token) = api_token() {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| InstallError::release(repo.to_string(), e))?;

    if !response.status().is_success() {
        return Err(InstallError::release(
            repo.to_string(),
            format!("HTTP {}", response.status()),
        ));
    }

    let release: LatestRelease = response
        .json()
        .await
        .map_err(|e| InstallError::release(repo.to_string(), e))?;

    match release.tag_name {
        Some(serde_json::Value::String(tag)) if !tag.is_empty() => Ok(ReleaseIdentity {
            repo: repo.clone(),
            tag,
        }),
        _ => Err(InstallError::release(
            repo.to_string(),
            "response has no tag_name field",
        )),
    }
}

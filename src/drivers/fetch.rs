//! Driver channel listing through the GitHub releases API

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Public GitHub API endpoint
pub const GITHUB_API: &str = "https://api.github.com";

/// A downloadable driver package published by a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteDriver {
    pub name: String,
    pub download_url: String,
    pub release: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FetchError(pub String);

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: u64,
}

impl Release {
    fn title(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.tag_name.clone(),
        }
    }
}

/// Split `https://github.com/<owner>/<repo>` into owner and repository
pub fn parse_repo_url(url: &str) -> FetchResult<(String, String)> {
    let invalid = || FetchError(format!("Not a GitHub repository URL: {}", url));

    let rest = url
        .trim()
        .strip_prefix("https://github.com/")
        .ok_or_else(invalid)?;
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(invalid()),
    }
}

/// Lists driver packages published as GitHub release assets
#[derive(Clone)]
pub struct ReleaseFetcher {
    client: reqwest::Client,
    api_base: String,
}

impl ReleaseFetcher {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the packages published by the channel at `repo_url`
    ///
    /// Each release contributes its first `.zip` asset. With `bypass_validation`
    /// every asset of every release is returned.
    pub async fn fetch_releases(
        &self,
        repo_url: &str,
        bypass_validation: bool,
    ) -> FetchResult<Vec<RemoteDriver>> {
        let (owner, repo) = parse_repo_url(repo_url)?;
        let url = format!("{}/repos/{}/{}/releases", self.api_base, owner, repo);
        debug!("Fetching releases from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| FetchError(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError(format!(
                "Failed to fetch releases of {}/{}: HTTP {}",
                owner, repo, status
            )));
        }

        let releases: Vec<Release> = response
            .json()
            .await
            .map_err(|e| FetchError(format!("Unexpected releases response: {}", e)))?;

        let drivers = collect_drivers(releases, bypass_validation);
        info!(
            "Channel {}/{} publishes {} driver package(s)",
            owner,
            repo,
            drivers.len()
        );
        Ok(drivers)
    }
}

fn collect_drivers(releases: Vec<Release>, bypass_validation: bool) -> Vec<RemoteDriver> {
    let mut drivers = Vec::new();
    for release in releases {
        let title = release.title();

        if bypass_validation {
            for asset in release.assets {
                drivers.push(RemoteDriver {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                    release: title.clone(),
                    size: asset.size,
                });
            }
            continue;
        }

        let zip = release
            .assets
            .into_iter()
            .find(|asset| asset.name.to_ascii_lowercase().ends_with(".zip"));
        if let Some(asset) = zip {
            drivers.push(RemoteDriver {
                name: title.clone(),
                download_url: asset.browser_download_url,
                release: title,
                size: asset.size,
            });
        }
    }
    drivers
}

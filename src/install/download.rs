//! Artifact URL composition and streaming download

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use super::error::{InstallError, Result};
use super::github::ReleaseIdentity;
use super::platform::PlatformDescriptor;
use super::progress::Reporter;

/// Where an artifact comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub filename: String,
    pub url: String,
}

impl ArtifactReference {
    /// Compose `<base>/<owner>/<name>/releases/download/<tag>/<tool>-<os>-<arch>.<ext>`
    pub fn new(
        download_url: &str,
        release: &ReleaseIdentity,
        platform: &PlatformDescriptor,
        tool_name: &str,
    ) -> Self {
        let filename = platform.artifact_filename(tool_name);
        let url = format!(
            "{}/{}/{}/releases/download/{}/{}",
            download_url.trim_end_matches('/'),
            release.repo.owner,
            release.repo.name,
            release.tag,
            filename
        );
        Self { filename, url }
    }

    /// Download destination inside `scratch_dir`
    pub fn local_path(&self, scratch_dir: &Path) -> PathBuf {
        scratch_dir.join(&self.filename)
    }
}

/// Stream the artifact body to `dest`
///
/// Redirects are followed by the client. On any failure the partially
/// written file is removed before the error is returned.
pub async fn fetch_artifact(
    client: &Client,
    artifact: &ArtifactReference,
    dest: &Path,
    reporter: &Reporter,
) -> Result<u64> {
    let result = stream_to_file(client, artifact, dest, reporter).await;
    if result.is_err() && dest.exists() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            log::warn!("Failed to remove partial download {}: {}", dest.display(), e);
        }
    }
    result
}

async fn stream_to_file(
    client: &Client,
    artifact: &ArtifactReference,
    dest: &Path,
    reporter: &Reporter,
) -> Result<u64> {
    let url = artifact.url.as_str();
    log::debug!("Downloading {url}");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| InstallError::download(url, e))?;

    if !response.status().is_success() {
        return Err(InstallError::download(
            url,
            format!("HTTP {}", response.status()),
        ));
    }

    if response.url().as_str() != url {
        log::debug!("Redirected to {}", response.url());
    }

    let total_bytes = response.content_length();
    let bar = reporter.download_bar(total_bytes, &artifact.filename);

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| InstallError::download(url, e))?;
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                bar.abandon();
                return Err(InstallError::download(url, e));
            }
        };
        if let Err(e) = file.write_all(&chunk).await {
            bar.abandon();
            return Err(InstallError::download(url, e));
        }
        downloaded += chunk.len() as u64;
        bar.set_position(downloaded);
    }

    file.flush()
        .await
        .map_err(|e| InstallError::download(url, e))?;

    if let Some(total) = total_bytes
        && downloaded != total
    {
        bar.abandon();
        return Err(InstallError::download(
            url,
            format!("transfer ended after {downloaded} of {total} bytes"),
        ));
    }

    bar.finish_and_clear();
    log::info!("Downloaded {} ({} bytes)", artifact.filename, downloaded);
    Ok(downloaded)
}

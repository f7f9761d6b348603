use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::task::ProgressFn;
use crate::core::error::{MidnightError, MidnightResult};
use crate::core::sources::ArtifactLocation;

const OCTET_STREAM: &str = "application/octet-stream";

/// Bearer token bound to one API host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredential {
    host: String,
    port: Option<u16>,
    token: String,
}

impl ApiCredential {
    /// Credential for the host of `endpoint`. `None` if the endpoint has no host.
    pub fn for_endpoint(endpoint: &str, token: impl Into<String>) -> Option<Self> {
        let url = Url::parse(endpoint).ok()?;
        Some(Self {
            host: url.host_str()?.to_string(),
            port: url.port_or_known_default(),
            token: token.into(),
        })
    }

    pub fn applies_to(&self, url: &Url) -> bool {
        url.host_str() == Some(self.host.as_str()) && url.port_or_known_default() == self.port
    }
}

/// A byte stream reachable at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downloadable {
    Remote { url: Url, bearer: Option<String> },
    Local { path: PathBuf },
}

impl Downloadable {
    /// Attach `credential` only when the location is on its host.
    pub fn for_location(location: &ArtifactLocation, credential: Option<&ApiCredential>) -> Self {
        match location {
            ArtifactLocation::Remote(url) => Downloadable::Remote {
                url: url.clone(),
                bearer: credential
                    .filter(|c| c.applies_to(url))
                    .map(|c| c.token.clone()),
            },
            ArtifactLocation::Local(path) => Downloadable::Local { path: path.clone() },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Downloadable::Remote { url, .. } => url.to_string(),
            Downloadable::Local { path } => path.display().to_string(),
        }
    }

    fn request(&self, client: &Client, url: &Url, bearer: &Option<String>) -> reqwest::RequestBuilder {
        let req = client.get(url.clone()).header(ACCEPT, OCTET_STREAM);
        match bearer {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Size in bytes without transferring the body.
    pub async fn size_bytes(&self, client: &Client) -> MidnightResult<u64> {
        match self {
            Downloadable::Remote { url, bearer } => {
                let resp = self.request(client, url, bearer).send().await?;
                if !resp.status().is_success() {
                    return Err(MidnightError::DownloadFailed {
                        url: url.to_string(),
                        status: resp.status().as_u16(),
                    });
                }
                resp.content_length()
                    .ok_or_else(|| MidnightError::MissingContentLength { url: url.to_string() })
            }
            Downloadable::Local { path } => tokio::fs::metadata(path)
                .await
                .map(|m| m.len())
                .map_err(|e| MidnightError::io(path, e)),
        }
    }

    /// Write the bytes to `destination`, returning how many were written.
    ///
    /// Data lands in a hidden `.part` file next to the destination and is
    /// renamed into place once complete. The partial file is removed on error
    /// and when this future is dropped early (timeout, aborted batch).
    pub async fn download(
        &self,
        client: &Client,
        destination: &Path,
        on_progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> MidnightResult<u64> {
        if cancel.is_cancelled() {
            return Err(MidnightError::Cancelled(destination.to_path_buf()));
        }
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MidnightError::io(parent, e))?;

        let part = PartFile::next_to(destination);
        let bytes = match self {
            Downloadable::Remote { url, bearer } => {
                self.stream_to(client, url, bearer, part.path(), destination, on_progress, cancel)
                    .await?
            }
            Downloadable::Local { path } => copy_to(path, part.path(), on_progress).await?,
        };
        part.persist(destination).await?;
        debug!("Wrote {} bytes from {} -> {:?}", bytes, self.describe(), destination);
        Ok(bytes)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_to(
        &self,
        client: &Client,
        url: &Url,
        bearer: &Option<String>,
        temp: &Path,
        destination: &Path,
        on_progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> MidnightResult<u64> {
        let resp = tokio::select! {
            _ = cancel.cancelled() => return Err(MidnightError::Cancelled(destination.to_path_buf())),
            resp = self.request(client, url, bearer).send() => resp?,
        };
        if !resp.status().is_success() {
            return Err(MidnightError::DownloadFailed {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let total = resp
            .content_length()
            .ok_or_else(|| MidnightError::MissingContentLength { url: url.to_string() })?;

        let mut file = tokio::fs::File::create(temp)
            .await
            .map_err(|e| MidnightError::io(temp, e))?;
        let mut stream = resp.bytes_stream();
        let mut done: u64 = 0;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(MidnightError::Cancelled(destination.to_path_buf())),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| MidnightError::io(temp, e))?;
            done += chunk.len() as u64;
            if let Some(progress) = on_progress {
                progress(done, total);
            }
        }

        file.flush().await.map_err(|e| MidnightError::io(temp, e))?;
        drop(file);

        // An empty body yields no chunks; report it once.
        if done == 0 && total == 0 {
            if let Some(progress) = on_progress {
                progress(0, 0);
            }
        }

        if done != total {
            return Err(MidnightError::Truncated {
                url: url.to_string(),
                received: done,
                expected: total,
            });
        }
        Ok(done)
    }
}

async fn copy_to(source: &Path, temp: &Path, on_progress: Option<&ProgressFn>) -> MidnightResult<u64> {
    let bytes = tokio::fs::copy(source, temp)
        .await
        .map_err(|e| MidnightError::io(source, e))?;
    if let Some(progress) = on_progress {
        progress(bytes, bytes);
    }
    Ok(bytes)
}

/// Hidden `.part` file that is deleted on drop unless persisted.
struct PartFile {
    path: PathBuf,
    persisted: bool,
}

impl PartFile {
    fn next_to(destination: &Path) -> Self {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string());
        Self {
            path: destination.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4())),
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(mut self, destination: &Path) -> MidnightResult<()> {
        tokio::fs::rename(&self.path, destination)
            .await
            .map_err(|e| MidnightError::io(destination, e))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

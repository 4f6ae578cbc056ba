//! HTTP resource loading.

use std::time::Duration;

use crate::capability::{LoadToken, ResourceRequester};
use crate::config::DriverConfig;
use crate::driver::{DriverHandle, DriverMessage};
use crate::error::LoadError;

/// Resource loader over a shared `reqwest` client.
///
/// A batch fetches sequentially, in declaration order, and resolves as
/// a whole: the first failure fails the batch. Each resource gets the
/// configured timeout; the fetched bodies are discarded here, loading
/// exists so the host's cache is warm before the suspended message
/// applies.
#[derive(Debug)]
pub struct HttpResourceLoader {
    handle: DriverHandle,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpResourceLoader {
    /// New loader reporting into the given driver.
    #[must_use]
    pub fn new(handle: DriverHandle, config: &DriverConfig) -> Self {
        Self {
            handle,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.load_timeout_secs),
        }
    }
}

impl ResourceRequester for HttpResourceLoader {
    fn request(&mut self, token: LoadToken, urls: Vec<String>) {
        let handle = self.handle.clone();
        let client = self.client.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = fetch_batch(&client, &urls, timeout).await;
            if let Err(ref error) = result {
                tracing::warn!(%token, %error, "resource batch failed");
            }
            handle.send(DriverMessage::LoadFinished(token, result));
        });
    }
}

async fn fetch_batch(
    client: &reqwest::Client,
    urls: &[String],
    timeout: Duration,
) -> Result<(), LoadError> {
    for url in urls {
        if timeout.is_zero() {
            fetch_one(client, url).await?;
        } else {
            match tokio::time::timeout(timeout, fetch_one(client, url)).await {
                Ok(result) => result?,
                Err(_) => return Err(LoadError::Timeout { url: url.clone() }),
            }
        }
        tracing::debug!(url, "resource fetched");
    }
    Ok(())
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<(), LoadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoadError::Failed {
            url: url.to_owned(),
            detail: e.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Failed {
            url: url.to_owned(),
            detail: status.to_string(),
        });
    }
    response.bytes().await.map_err(|e| LoadError::Failed {
        url: url.to_owned(),
        detail: e.to_string(),
    })?;
    Ok(())
}

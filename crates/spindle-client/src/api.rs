//! HTTP access to controller resources.

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::loader::LoadError;

/// Request interface to the controller's HTTP side.
///
/// Object safe so programs can hold an `Arc<dyn ControllerApi>`; tests
/// stub it with canned replies.
pub trait ControllerApi: Send + Sync {
    /// GET a JSON document.
    fn get_json(&self, path: &str) -> BoxFuture<'static, Result<Value, LoadError>>;
    /// GET a text document.
    fn get_text(&self, path: &str) -> BoxFuture<'static, Result<String, LoadError>>;
    /// GET a raw binary transfer.
    fn get_bytes(&self, path: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>>;
    /// PUT a bodyless command, e.g. `start/<path>` or `estop`.
    fn put(&self, path: &str) -> BoxFuture<'static, Result<(), LoadError>>;
}

/// [`ControllerApi`] over HTTP.
pub struct HttpApi {
    client: reqwest::Client,
    base: String,
}

impl HttpApi {
    /// Api rooted at `base`, e.g. `http://carve.local/api`.
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }
}

impl ControllerApi for HttpApi {
    fn get_json(&self, path: &str) -> BoxFuture<'static, Result<Value, LoadError>> {
        let request = self.client.get(self.url(path));
        let path = path.to_string();
        Box::pin(async move {
            let response = request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| LoadError::fetch(&path, e))?;
            response.json().await.map_err(|e| LoadError::fetch(&path, e))
        })
    }

    fn get_text(&self, path: &str) -> BoxFuture<'static, Result<String, LoadError>> {
        let request = self.client.get(self.url(path));
        let path = path.to_string();
        Box::pin(async move {
            let response = request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| LoadError::fetch(&path, e))?;
            response.text().await.map_err(|e| LoadError::fetch(&path, e))
        })
    }

    fn get_bytes(&self, path: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let request = self.client.get(self.url(path));
        let path = path.to_string();
        Box::pin(async move {
            let response = request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| LoadError::fetch(&path, e))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| LoadError::fetch(&path, e))?;
            Ok(bytes.to_vec())
        })
    }

    fn put(&self, path: &str) -> BoxFuture<'static, Result<(), LoadError>> {
        let request = self.client.put(self.url(path));
        let path = path.to_string();
        Box::pin(async move {
            request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| LoadError::fetch(&path, e))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_cleanly() {
        let api = HttpApi::new("http://carve.local/api");
        assert_eq!(api.url("fs/job.nc"), "http://carve.local/api/fs/job.nc");
        assert_eq!(api.url("/fs/job.nc"), "http://carve.local/api/fs/job.nc");

        let api = HttpApi::new("http://carve.local/api/");
        assert_eq!(api.url("positions/a"), "http://carve.local/api/positions/a");
    }
}

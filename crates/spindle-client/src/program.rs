//! Program resources.
//!
//! One [`Program`] per selected program path. Each derived resource
//! (source text, position and speed buffers, the computed toolpath) is
//! fetched at most once for the life of the object; selecting a program
//! again means constructing a new `Program`.

use std::sync::Arc;

use serde_json::Value;

use spindle_core::{PollReply, decode_f32_buffer};

use crate::api::ControllerApi;
use crate::loader::{LoadError, ResourceScope};

/// A memoized program resource, keyed by its resource path.
#[derive(Debug, Clone)]
pub enum ProgramValue {
    /// Raw G-code text.
    Source(Arc<str>),
    /// Decoded f32 samples.
    Buffer(Arc<[f32]>),
    /// Toolpath descriptor.
    Toolpath(Arc<Value>),
    /// Composed render view.
    View(Arc<ToolpathView>),
}

/// The fully loaded toolpath: descriptor plus the sample buffers it is
/// rendered from. Only built once the descriptor has finished computing.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolpathView {
    pub descriptor: Arc<Value>,
    pub positions: Arc<[f32]>,
    pub speeds: Arc<[f32]>,
}

struct ProgramInner {
    api: Arc<dyn ControllerApi>,
    path: String,
    filename: String,
    scope: ResourceScope<ProgramValue>,
}

/// Derived resources for one program path.
///
/// Cheap to clone; clones share the same memoization scope.
#[derive(Clone)]
pub struct Program {
    inner: Arc<ProgramInner>,
}

impl Program {
    pub fn new(api: Arc<dyn ControllerApi>, path: impl Into<String>) -> Self {
        let path = path.into();
        let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            inner: Arc::new(ProgramInner {
                api,
                path,
                filename,
                scope: ResourceScope::new(),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Display name of the program (basename of the path).
    pub fn filename(&self) -> &str {
        &self.inner.filename
    }

    fn toolpath_key(&self) -> String {
        format!("path/{}", self.inner.path)
    }

    /// Raw program text.
    pub async fn source(&self) -> Result<Arc<str>, LoadError> {
        let key = format!("fs/{}", self.inner.path);
        let api = self.inner.api.clone();
        let fetch_path = key.clone();
        let value = self
            .inner
            .scope
            .get_or_load(&key, move || async move {
                let text = api.get_text(&fetch_path).await?;
                Ok(ProgramValue::Source(text.into()))
            })
            .await?;

        match value {
            ProgramValue::Source(text) => Ok(text),
            _ => unreachable!("fs/ entries hold source text"),
        }
    }

    /// Toolpath position samples.
    pub async fn positions(&self) -> Result<Arc<[f32]>, LoadError> {
        self.buffer("positions").await
    }

    /// Toolpath speed samples.
    pub async fn speeds(&self) -> Result<Arc<[f32]>, LoadError> {
        self.buffer("speeds").await
    }

    async fn buffer(&self, kind: &str) -> Result<Arc<[f32]>, LoadError> {
        let key = format!("{kind}/{}", self.inner.path);
        let api = self.inner.api.clone();
        let fetch_path = key.clone();
        let value = self
            .inner
            .scope
            .get_or_load(&key, move || async move {
                let bytes = api.get_bytes(&fetch_path).await?;
                let samples = decode_f32_buffer(&bytes).map_err(|source| LoadError::Buffer {
                    path: fetch_path.clone(),
                    source,
                })?;
                Ok(ProgramValue::Buffer(samples.into()))
            })
            .await?;

        match value {
            ProgramValue::Buffer(samples) => Ok(samples),
            _ => unreachable!("buffer entries hold samples"),
        }
    }

    /// The toolpath descriptor, polling until the controller finishes
    /// computing it. Interim progress is readable via [`progress`].
    ///
    /// [`progress`]: Program::progress
    pub async fn toolpath(&self) -> Result<Arc<Value>, LoadError> {
        let key = self.toolpath_key();
        let api = self.inner.api.clone();
        let fetch_path = key.clone();
        let value = self
            .inner
            .scope
            .get_or_load_polling(&key, move || {
                let api = api.clone();
                let path = fetch_path.clone();
                async move {
                    let reply = api.get_json(&path).await?;
                    let reply = PollReply::from_json(reply).map_err(|source| LoadError::Reply {
                        path: path.clone(),
                        source,
                    })?;
                    Ok(reply.map(|descriptor| ProgramValue::Toolpath(Arc::new(descriptor))))
                }
            })
            .await?;

        match value {
            ProgramValue::Toolpath(descriptor) => Ok(descriptor),
            _ => unreachable!("path/ entries hold toolpath descriptors"),
        }
    }

    /// Last known toolpath progress in [0, 1]. Zero before the first
    /// reply, one once the descriptor is terminal.
    pub fn progress(&self) -> f64 {
        self.inner
            .scope
            .progress(&self.toolpath_key())
            .unwrap_or(0.0)
    }

    /// The composed render view: descriptor plus sample buffers.
    ///
    /// The three underlying loads proceed concurrently and each happens
    /// at most once; the composition itself is memoized the same way, so
    /// repeated calls share one pending or settled view.
    pub async fn view(&self) -> Result<Arc<ToolpathView>, LoadError> {
        let key = format!("view/{}", self.inner.path);
        let program = self.clone();
        let value = self
            .inner
            .scope
            .get_or_load(&key, move || async move {
                let (descriptor, positions, speeds) = futures_util::try_join!(
                    program.toolpath(),
                    program.positions(),
                    program.speeds()
                )?;
                Ok(ProgramValue::View(Arc::new(ToolpathView {
                    descriptor,
                    positions,
                    speeds,
                })))
            })
            .await?;

        match value {
            ProgramValue::View(view) => Ok(view),
            _ => unreachable!("view/ entries hold composed views"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned controller: counts requests per path, scripts toolpath
    /// replies.
    struct StubApi {
        calls: Mutex<HashMap<String, usize>>,
        toolpath_replies: Mutex<Vec<Value>>,
    }

    impl StubApi {
        fn new(toolpath_replies: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(HashMap::new()),
                toolpath_replies: Mutex::new(toolpath_replies),
            })
        }

        fn record(&self, path: &str) -> usize {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(path.to_string()).or_insert(0);
            *count += 1;
            *count
        }

        fn count(&self, path: &str) -> usize {
            self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
        }

        fn sample_bytes() -> Vec<u8> {
            let mut bytes = Vec::new();
            for sample in [1.0f32, 2.5, -3.0] {
                bytes.extend_from_slice(&sample.to_ne_bytes());
            }
            bytes
        }
    }

    impl ControllerApi for StubApi {
        fn get_json(&self, path: &str) -> BoxFuture<'static, Result<Value, LoadError>> {
            self.record(path);
            let reply = {
                let mut replies = self.toolpath_replies.lock().unwrap();
                if replies.is_empty() {
                    json!({"lines": 3})
                } else {
                    replies.remove(0)
                }
            };
            Box::pin(async move { Ok(reply) })
        }

        fn get_text(&self, path: &str) -> BoxFuture<'static, Result<String, LoadError>> {
            self.record(path);
            Box::pin(async move { Ok("G0 X0 Y0\nG1 X1\n".to_string()) })
        }

        fn get_bytes(&self, path: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
            self.record(path);
            Box::pin(async move { Ok(StubApi::sample_bytes()) })
        }

        fn put(&self, path: &str) -> BoxFuture<'static, Result<(), LoadError>> {
            self.record(path);
            Box::pin(async move { Ok(()) })
        }
    }

    #[tokio::test]
    async fn source_is_fetched_once() {
        let api = StubApi::new(Vec::new());
        let program = Program::new(api.clone(), "jobs/part.nc");

        let first = program.source().await.unwrap();
        let second = program.source().await.unwrap();
        assert_eq!(&*first, "G0 X0 Y0\nG1 X1\n");
        assert_eq!(first, second);
        assert_eq!(api.count("fs/jobs/part.nc"), 1);
    }

    #[tokio::test]
    async fn buffers_decode_bit_exact() {
        let api = StubApi::new(Vec::new());
        let program = Program::new(api.clone(), "part.nc");

        let positions = program.positions().await.unwrap();
        assert_eq!(&*positions, &[1.0, 2.5, -3.0]);
        assert_eq!(api.count("positions/part.nc"), 1);
    }

    #[tokio::test]
    async fn toolpath_polls_until_done() {
        let api = StubApi::new(vec![
            json!({"progress": 0.3}),
            json!({"progress": 0.7}),
            json!({"lines": 3, "time": 12.5}),
        ]);
        let program = Program::new(api.clone(), "part.nc");

        assert_eq!(program.progress(), 0.0);
        let toolpath = program.toolpath().await.unwrap();
        assert_eq!(*toolpath, json!({"lines": 3, "time": 12.5}));
        assert_eq!(program.progress(), 1.0);
        assert_eq!(api.count("path/part.nc"), 3);
    }

    #[tokio::test]
    async fn view_composes_and_memoizes() {
        let api = StubApi::new(vec![json!({"progress": 0.5}), json!({"lines": 3})]);
        let program = Program::new(api.clone(), "part.nc");

        let first = program.view().await.unwrap();
        let second = program.view().await.unwrap();
        assert_eq!(first, second);

        assert_eq!(*first.descriptor, json!({"lines": 3}));
        assert_eq!(&*first.positions, &[1.0, 2.5, -3.0]);
        assert_eq!(&*first.speeds, &[1.0, 2.5, -3.0]);

        // One fetch per underlying resource, two polls for the toolpath.
        assert_eq!(api.count("positions/part.nc"), 1);
        assert_eq!(api.count("speeds/part.nc"), 1);
        assert_eq!(api.count("path/part.nc"), 2);
    }

    #[tokio::test]
    async fn view_after_toolpath_does_not_refetch() {
        let api = StubApi::new(vec![json!({"lines": 1})]);
        let program = Program::new(api.clone(), "part.nc");

        program.toolpath().await.unwrap();
        program.view().await.unwrap();
        assert_eq!(api.count("path/part.nc"), 1);
    }

    #[tokio::test]
    async fn bad_buffer_is_a_sticky_error() {
        struct ShortApi;
        impl ControllerApi for ShortApi {
            fn get_json(&self, _: &str) -> BoxFuture<'static, Result<Value, LoadError>> {
                Box::pin(async { Ok(json!({})) })
            }
            fn get_text(&self, _: &str) -> BoxFuture<'static, Result<String, LoadError>> {
                Box::pin(async { Ok(String::new()) })
            }
            fn get_bytes(&self, _: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
                Box::pin(async { Ok(vec![0u8; 10]) })
            }
            fn put(&self, _: &str) -> BoxFuture<'static, Result<(), LoadError>> {
                Box::pin(async { Ok(()) })
            }
        }

        let program = Program::new(Arc::new(ShortApi), "part.nc");
        let first = program.positions().await;
        let second = program.positions().await;
        assert!(matches!(first, Err(LoadError::Buffer { .. })));
        assert_eq!(first, second);
    }

    #[test]
    fn filename_is_the_basename() {
        let api = StubApi::new(Vec::new());
        assert_eq!(Program::new(api.clone(), "jobs/part.nc").filename(), "part.nc");
        assert_eq!(Program::new(api, "part.nc").filename(), "part.nc");
    }
}

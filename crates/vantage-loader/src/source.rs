use crate::LoadError;

/// Joins a relative asset URL onto a base URL. Absolute URLs pass through.
pub fn join_url(base: &str, url: &str) -> String {
    if url.contains("://") || url.starts_with('/') || url.starts_with("data:") || base.is_empty() {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    let url = url.trim_start_matches("./");
    format!("{base}/{url}")
}

/// Everything before the last `/` of `url`, empty for a bare file name.
pub fn parent_url(url: &str) -> &str {
    url.rsplit_once('/').map_or("", |(dir, _)| dir)
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::FileSource;

#[cfg(target_arch = "wasm32")]
pub use web::FetchSource;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::LoadError;
    use std::fs::File;
    use std::io::{ErrorKind, Read};
    use std::path::PathBuf;

    const CHUNK_SIZE: usize = 64 * 1024;

    /// Reads assets from a directory on disk.
    #[derive(Debug, Clone)]
    pub struct FileSource {
        root: PathBuf,
    }

    impl FileSource {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn resolve(&self, url: &str) -> PathBuf {
            self.root.join(url)
        }

        /// Reads the whole asset, reporting `(loaded, total)` after every chunk.
        pub fn read(
            &self,
            url: &str,
            mut progress: impl FnMut(u64, Option<u64>),
        ) -> Result<Vec<u8>, LoadError> {
            let path = self.resolve(url);
            let mut file = File::open(&path).map_err(|err| LoadError::from_io(url, err))?;
            let total = file.metadata().ok().map(|meta| meta.len());

            let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
            let mut chunk = vec![0u8; CHUNK_SIZE];
            loop {
                match file.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        bytes.extend_from_slice(&chunk[..n]);
                        progress(bytes.len() as u64, total);
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(LoadError::from_io(url, err)),
                }
            }
            log::debug!("read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{LoadError, join_url};
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;

    /// Fetches assets relative to a base URL with `window.fetch`.
    #[derive(Debug, Clone)]
    pub struct FetchSource {
        base: String,
    }

    fn fetch_error(url: &str, value: JsValue) -> LoadError {
        LoadError::Fetch {
            url: url.to_string(),
            reason: format!("{value:?}"),
        }
    }

    impl FetchSource {
        pub fn new(base: impl Into<String>) -> Self {
            Self { base: base.into() }
        }

        pub fn resolve(&self, url: &str) -> String {
            join_url(&self.base, url)
        }

        /// The browser hands the body over in one piece, so progress is
        /// reported once with `Content-Length` as the total when present.
        pub async fn fetch(
            &self,
            url: &str,
            mut progress: impl FnMut(u64, Option<u64>),
        ) -> Result<Vec<u8>, LoadError> {
            let full = self.resolve(url);
            let window = web_sys::window().ok_or_else(|| LoadError::Fetch {
                url: url.to_string(),
                reason: "no window".into(),
            })?;

            let resp = JsFuture::from(window.fetch_with_str(&full))
                .await
                .map_err(|err| fetch_error(url, err))?;
            let resp: web_sys::Response = resp.dyn_into().map_err(|err| fetch_error(url, err))?;

            if resp.status() == 404 {
                return Err(LoadError::NotFound(url.to_string()));
            }
            if !resp.ok() {
                return Err(LoadError::Http {
                    url: url.to_string(),
                    status: resp.status(),
                });
            }

            let total = resp
                .headers()
                .get("Content-Length")
                .ok()
                .flatten()
                .and_then(|len| len.parse::<u64>().ok());

            let body = resp.array_buffer().map_err(|err| fetch_error(url, err))?;
            let body = JsFuture::from(body).await.map_err(|err| fetch_error(url, err))?;
            let bytes = js_sys::Uint8Array::new(&body).to_vec();
            progress(bytes.len() as u64, total);
            Ok(bytes)
        }
    }
}

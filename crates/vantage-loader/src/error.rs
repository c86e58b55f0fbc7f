use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {status} while fetching {url}")]
    Http { url: String, status: u16 },
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl LoadError {
    pub(crate) fn from_io(url: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(url.to_string())
        } else {
            LoadError::Io {
                url: url.to_string(),
                source,
            }
        }
    }

    pub(crate) fn decode(url: &str, err: anyhow::Error) -> Self {
        LoadError::Decode {
            url: url.to_string(),
            reason: format!("{err:#}"),
        }
    }

    /// The URL the failing load was issued for.
    pub fn url(&self) -> &str {
        match self {
            LoadError::NotFound(url) => url,
            LoadError::Io { url, .. }
            | LoadError::Http { url, .. }
            | LoadError::Fetch { url, .. }
            | LoadError::Decode { url, .. } => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = LoadError::from_io("a.hdr", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(err, LoadError::NotFound(ref u) if u == "a.hdr"));
        assert_eq!(err.to_string(), "asset not found: a.hdr");
    }

    #[test]
    fn decode_keeps_context_chain() {
        let inner = anyhow::anyhow!("bad magic").context("decode Radiance HDR");
        let err = LoadError::decode("env.hdr", inner);
        assert_eq!(err.url(), "env.hdr");
        assert_eq!(
            err.to_string(),
            "failed to decode env.hdr: decode Radiance HDR: bad magic"
        );
    }
}

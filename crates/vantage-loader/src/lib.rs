mod error;
mod manager;
mod progress;
mod source;

pub use error::LoadError;
pub use manager::{LoadId, LoadingManager, ProgressUpdate};
pub use source::{join_url, parent_url};

#[cfg(not(target_arch = "wasm32"))]
pub use source::FileSource;
#[cfg(target_arch = "wasm32")]
pub use source::FetchSource;

#[cfg(not(target_arch = "wasm32"))]
pub type AssetSource = FileSource;
#[cfg(target_arch = "wasm32")]
pub type AssetSource = FetchSource;

use progress::ByteTally;
use std::collections::HashMap;

/// `Send` where loads run on threads, nothing on the web where they run as
/// local futures.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

#[derive(Debug)]
pub enum LoadEvent<T> {
    Progress {
        id: LoadId,
        loaded: u64,
        total: Option<u64>,
    },
    Finished {
        id: LoadId,
        result: Result<T, LoadError>,
    },
}

impl<T> LoadEvent<T> {
    pub fn id(&self) -> LoadId {
        match self {
            LoadEvent::Progress { id, .. } | LoadEvent::Finished { id, .. } => *id,
        }
    }
}

/// Where a running load delivers its events.
pub trait LoadSink<T> {
    fn emit(&self, event: LoadEvent<T>);
}

impl<T> LoadSink<T> for std::sync::mpsc::Sender<LoadEvent<T>> {
    fn emit(&self, event: LoadEvent<T>) {
        // receiver gone means nobody is waiting for this load any more
        let _ = self.send(event);
    }
}

/// A file the main asset refers to, relative to the main asset's location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub uri: String,
    /// Size declared by the referring document, if it states one.
    pub size_hint: Option<u64>,
}

/// Dependency bytes keyed by the URI the main asset used for them.
pub type Resources = HashMap<String, Vec<u8>>;

/// Turns the bytes of one asset kind into a value.
pub trait Decode {
    type Output;

    /// Files that must be fetched before [`Decode::decode`] can run.
    fn dependencies(&self, _bytes: &[u8]) -> anyhow::Result<Vec<Dependency>> {
        Ok(Vec::new())
    }

    fn decode(&self, bytes: Vec<u8>, resources: Resources) -> anyhow::Result<Self::Output>;
}

/// Fetches `url` and every dependency it names from `source`, then decodes
/// it off the event loop. Emits any number of `Progress` events followed by
/// exactly one `Finished`.
///
/// Progress covers all files of the load as one item: dependency bytes are
/// added to the total as soon as their sizes are known.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_load<S, D>(id: LoadId, url: String, source: AssetSource, sink: S, decoder: D)
where
    D: Decode + MaybeSend + 'static,
    D::Output: MaybeSend + 'static,
    S: LoadSink<D::Output> + Clone + MaybeSend + 'static,
{
    let fallback = sink.clone();
    let thread_url = url.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("load {url}"))
        .spawn(move || {
            let result = load_blocking(&source, &thread_url, &decoder, |loaded, total| {
                sink.emit(LoadEvent::Progress { id, loaded, total })
            });
            sink.emit(LoadEvent::Finished { id, result });
        });

    if let Err(err) = spawned {
        log::error!("could not start loader thread for {url}: {err}");
        fallback.emit(LoadEvent::Finished {
            id,
            result: Err(LoadError::Io { url, source: err }),
        });
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn load_blocking<D: Decode>(
    source: &FileSource,
    url: &str,
    decoder: &D,
    mut progress: impl FnMut(u64, Option<u64>),
) -> Result<D::Output, LoadError> {
    let bytes = source.read(url, &mut progress)?;
    let dependencies = decoder
        .dependencies(&bytes)
        .map_err(|err| LoadError::decode(url, err))?;

    let mut tally = ByteTally::new(bytes.len() as u64, &dependencies);
    if !dependencies.is_empty() {
        let (loaded, total) = tally.totals();
        progress(loaded, Some(total));
    }

    let base = parent_url(url);
    let mut resources = Resources::new();
    for dependency in dependencies {
        let dep_url = join_url(base, &dependency.uri);
        tally.begin(&dependency);
        let data = source.read(&dep_url, |loaded, total| {
            let (loaded, total) = tally.during(loaded, total);
            progress(loaded, Some(total));
        })?;
        tally.finish(data.len() as u64);
        resources.insert(dependency.uri, data);
    }

    decoder
        .decode(bytes, resources)
        .map_err(|err| LoadError::decode(url, err))
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_load<S, D>(id: LoadId, url: String, source: AssetSource, sink: S, decoder: D)
where
    D: Decode + MaybeSend + 'static,
    D::Output: MaybeSend + 'static,
    S: LoadSink<D::Output> + Clone + MaybeSend + 'static,
{
    wasm_bindgen_futures::spawn_local(async move {
        let result = load_async(&source, &url, &decoder, |loaded, total| {
            sink.emit(LoadEvent::Progress { id, loaded, total })
        })
        .await;
        sink.emit(LoadEvent::Finished { id, result });
    });
}

#[cfg(target_arch = "wasm32")]
async fn load_async<D: Decode>(
    source: &FetchSource,
    url: &str,
    decoder: &D,
    mut progress: impl FnMut(u64, Option<u64>),
) -> Result<D::Output, LoadError> {
    let bytes = source.fetch(url, &mut progress).await?;
    let dependencies = decoder
        .dependencies(&bytes)
        .map_err(|err| LoadError::decode(url, err))?;

    let mut tally = ByteTally::new(bytes.len() as u64, &dependencies);
    if !dependencies.is_empty() {
        let (loaded, total) = tally.totals();
        progress(loaded, Some(total));
    }

    let base = parent_url(url);
    let mut resources = Resources::new();
    for dependency in dependencies {
        let dep_url = join_url(base, &dependency.uri);
        tally.begin(&dependency);
        let data = source
            .fetch(&dep_url, |loaded, total| {
                let (loaded, total) = tally.during(loaded, total);
                progress(loaded, Some(total));
            })
            .await?;
        tally.finish(data.len() as u64);
        resources.insert(dependency.uri, data);
    }

    decoder
        .decode(bytes, resources)
        .map_err(|err| LoadError::decode(url, err))
}

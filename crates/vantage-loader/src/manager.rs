/// Handle for one registered load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadId(u32);

impl LoadId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Aggregate percentage in `0.0..=100.0`.
    pub percent: f32,
    /// Set on the single update that finished the last outstanding load.
    pub completed: bool,
}

#[derive(Debug)]
struct Item {
    url: String,
    loaded: u64,
    total: Option<u64>,
    done: bool,
    failed: bool,
}

/// Aggregates byte progress across every registered load and reports
/// completion once all of them have finished, successfully or not.
///
/// The reported percentage is the highest combined ratio seen so far. A
/// total that shows up late lowers the raw ratio; the bar then holds until
/// the bytes catch up.
#[derive(Debug, Default)]
pub struct LoadingManager {
    items: Vec<Item>,
    reported: f32,
    completion_fired: bool,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, url: impl Into<String>) -> LoadId {
        let id = LoadId(self.items.len() as u32);
        let url = url.into();
        log::debug!("registered load {} for {url}", id.0);
        self.items.push(Item {
            url,
            loaded: 0,
            total: None,
            done: false,
            failed: false,
        });
        id
    }

    pub fn on_progress(&mut self, id: LoadId, loaded: u64, total: Option<u64>) -> ProgressUpdate {
        match self.items.get_mut(id.index()) {
            Some(item) if !item.done => {
                item.loaded = loaded;
                item.total = total.filter(|t| *t > 0);
            }
            Some(_) => {}
            None => log::warn!("progress for unknown load {}", id.0),
        }
        self.update(false)
    }

    pub fn on_finished(&mut self, id: LoadId, succeeded: bool) -> ProgressUpdate {
        let Some(item) = self.items.get_mut(id.index()) else {
            log::warn!("finish for unknown load {}", id.0);
            return self.update(false);
        };
        if item.done {
            return self.update(false);
        }
        item.done = true;
        item.failed = !succeeded;
        if let Some(total) = item.total {
            item.loaded = total;
        } else {
            item.total = Some(item.loaded);
        }

        let fire = !self.completion_fired && self.is_complete();
        if fire {
            self.completion_fired = true;
            self.reported = 100.0;
        }
        self.update(fire)
    }

    fn update(&mut self, completed: bool) -> ProgressUpdate {
        let raw = self.raw_percent();
        if raw > self.reported {
            self.reported = raw;
        }
        ProgressUpdate {
            percent: self.reported,
            completed,
        }
    }

    fn raw_percent(&self) -> f32 {
        if self.is_complete() {
            return 100.0;
        }
        let (loaded, total) = self
            .items
            .iter()
            .filter_map(|item| item.total.map(|t| (item.loaded.min(t), t)))
            .fold((0u64, 0u64), |(l, t), (il, it)| (l + il, t + it));
        if total == 0 {
            0.0
        } else {
            (loaded as f64 / total as f64 * 100.0) as f32
        }
    }

    /// Highest percentage reported so far.
    pub fn percent(&self) -> f32 {
        self.reported
    }

    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.done)
    }

    pub fn items_loaded(&self) -> usize {
        self.items.iter().filter(|item| item.done).count()
    }

    pub fn items_failed(&self) -> usize {
        self.items.iter().filter(|item| item.failed).count()
    }

    pub fn items_total(&self) -> usize {
        self.items.len()
    }

    pub fn url(&self, id: LoadId) -> Option<&str> {
        self.items.get(id.index()).map(|item| item.url.as_str())
    }

    /// The indicator stays up until the completion update has been handed out.
    pub fn indicator_visible(&self) -> bool {
        !self.completion_fired
    }
}

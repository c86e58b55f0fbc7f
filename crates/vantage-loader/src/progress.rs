use crate::Dependency;

/// Folds the main file and its dependencies into one byte count, so a load
/// reports a single `(loaded, total)` pair however many files it reads.
#[derive(Debug, Default)]
pub(crate) struct ByteTally {
    /// Bytes of every file read so far.
    done: u64,
    /// Declared sizes of dependencies not started yet.
    pending: u64,
}

impl ByteTally {
    pub(crate) fn new(main_len: u64, dependencies: &[Dependency]) -> Self {
        Self {
            done: main_len,
            pending: dependencies.iter().filter_map(|dep| dep.size_hint).sum(),
        }
    }

    pub(crate) fn totals(&self) -> (u64, u64) {
        (self.done, self.done + self.pending)
    }

    pub(crate) fn begin(&mut self, dependency: &Dependency) {
        self.pending = self
            .pending
            .saturating_sub(dependency.size_hint.unwrap_or(0));
    }

    /// Progress while the current dependency has read `loaded` of `total`.
    pub(crate) fn during(&self, loaded: u64, total: Option<u64>) -> (u64, u64) {
        let current = total.unwrap_or(loaded).max(loaded);
        (self.done + loaded, self.done + self.pending + current)
    }

    pub(crate) fn finish(&mut self, len: u64) {
        self.done += len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(uri: &str, size_hint: Option<u64>) -> Dependency {
        Dependency {
            uri: uri.into(),
            size_hint,
        }
    }

    #[test]
    fn declared_sizes_count_before_reading() {
        let deps = [dep("scene.bin", Some(1000)), dep("tex.png", None)];
        let mut tally = ByteTally::new(80, &deps);
        assert_eq!(tally.totals(), (80, 1080));

        tally.begin(&deps[0]);
        assert_eq!(tally.during(500, Some(1000)), (580, 1080));
        tally.finish(1000);
        assert_eq!(tally.totals(), (1080, 1080));

        // no declared size: the total grows as the image arrives
        tally.begin(&deps[1]);
        assert_eq!(tally.during(200, None), (1280, 1280));
        assert_eq!(tally.during(200, Some(300)), (1280, 1380));
        tally.finish(300);
        assert_eq!(tally.totals(), (1380, 1380));
    }

    #[test]
    fn wrong_hint_does_not_underflow() {
        let deps = [dep("a.bin", Some(10))];
        let mut tally = ByteTally::new(0, &[]);
        tally.begin(&deps[0]);
        assert_eq!(tally.totals(), (0, 0));
    }
}

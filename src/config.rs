use std::time::Duration;

/// Identity and tunables for one repository. `name`/`url` are opaque labels
/// the repository core never parses itself — they exist for the object
/// store to interpret (e.g. as a connection string) and for logging.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    pub name: String,
    pub url: String,
    /// Items processed between cooperative yields in `for_each_items` and
    /// `find_and_delete_items` (§4.D "respiration").
    pub respiration_rate: usize,
    /// Poll interval used while waiting for the database-wide lock during
    /// `upgrade_repository`.
    pub lock_poll: Duration,
}

impl RepoConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            respiration_rate: 250,
            lock_poll: Duration::from_millis(10),
        }
    }

    pub fn respiration_rate(mut self, rate: usize) -> Self {
        self.respiration_rate = rate;
        self
    }

    pub fn lock_poll(mut self, interval: Duration) -> Self {
        self.lock_poll = interval;
        self
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CURRENT_FILE: &str = "blueprint.graph.xml";
pub const DEFAULT_BASE_FILE: &str = "blueprint.base.xml";
pub const DEFAULT_PROJECTION_FILE: &str = "blueprint.props.json";
pub const DEFAULT_BROADCAST_WINDOW: Duration = Duration::from_millis(100);
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Settings for one project scope served by a `GraphAuthority`
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Directory the document files live in
    pub root: PathBuf,
    pub current_file: String,
    pub base_file: String,
    pub projection_file: String,
    /// Coalescing window for broadcasts
    pub broadcast_window: Duration,
    /// Updates a subscriber may fall behind by before it is dropped
    pub subscriber_buffer: usize,
    /// Pick up edits made to the current document by other programs
    pub watch: bool,
}

impl AuthorityConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current_file: DEFAULT_CURRENT_FILE.to_string(),
            base_file: DEFAULT_BASE_FILE.to_string(),
            projection_file: DEFAULT_PROJECTION_FILE.to_string(),
            broadcast_window: DEFAULT_BROADCAST_WINDOW,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            watch: true,
        }
    }

    pub fn with_broadcast_window(mut self, window: Duration) -> Self {
        self.broadcast_window = window;
        self
    }

    pub fn with_subscriber_buffer(mut self, capacity: usize) -> Self {
        self.subscriber_buffer = capacity.max(1);
        self
    }

    pub fn without_watch(mut self) -> Self {
        self.watch = false;
        self
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(&self.current_file)
    }

    pub fn base_path(&self) -> PathBuf {
        self.root.join(&self.base_file)
    }

    pub fn projection_path(&self) -> PathBuf {
        self.root.join(&self.projection_file)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

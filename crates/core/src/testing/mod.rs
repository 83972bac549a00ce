//! Testing utilities and mock implementations.
//!
//! This module provides a mock `Fetcher`, allowing the task lifecycle and the
//! archive pipeline to be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use zipper_core::testing::{fixtures, MockFetcher};
//!
//! let fetcher = MockFetcher::new();
//! let (manager, _dirs) = fixtures::manager_with_fetcher(3, fetcher.clone());
//! ```

mod mock_fetcher;

pub use mock_fetcher::MockFetcher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::archive::{ArchivePipeline, Fetcher};
    use crate::config::ArchiveConfig;
    use crate::task::TaskManager;

    /// Directories backing a test manager. Dropping it removes them.
    pub struct TestDirs {
        pub root: TempDir,
        pub config: ArchiveConfig,
    }

    impl TestDirs {
        pub fn new() -> Self {
            let root = TempDir::new().expect("Failed to create temp dir");
            let config = ArchiveConfig {
                output_dir: root.path().join("archives"),
                temp_dir: root.path().join("work"),
            };
            Self { root, config }
        }

        /// Number of entries left under the workspace root.
        pub fn workspace_entries(&self) -> usize {
            std::fs::read_dir(&self.config.temp_dir)
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    impl Default for TestDirs {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Backoff unit used by fixtures, short enough for fast tests.
    pub const TEST_BACKOFF_UNIT: Duration = Duration::from_millis(5);

    /// Create a manager whose pipeline uses `fetcher` and temp directories.
    pub fn manager_with_fetcher(
        max_active: usize,
        fetcher: impl Fetcher + 'static,
    ) -> (TaskManager, TestDirs) {
        let dirs = TestDirs::new();
        let pipeline = ArchivePipeline::new(dirs.config.clone(), Arc::new(fetcher))
            .with_backoff_unit(TEST_BACKOFF_UNIT);
        (TaskManager::new(max_active, pipeline), dirs)
    }

    /// Three valid URLs with distinct file names.
    pub fn three_urls() -> [String; 3] {
        [
            "https://files.test/docs/report.pdf".to_string(),
            "https://files.test/img/photo%20one.jpg".to_string(),
            "https://files.test/img/scan.JPEG".to_string(),
        ]
    }
}

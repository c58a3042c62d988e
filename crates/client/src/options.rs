//! Store configuration
//!
//! [`StoreOptions`] can be built in code or read from TOML:
//!
//! ```toml
//! initial_pages = 20
//! maximum_pages = 10000
//! mode = "buffered"
//! transfer = "bulk"
//! ```
//!
//! Missing keys take their defaults.

use crate::marshal::TransferMode;
use anystore_core::{Error, Result};
use anystore_engine::WriteMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default committed pages when the region is created
pub const DEFAULT_INITIAL_PAGES: usize = 20;

/// Default page limit of the region
pub const DEFAULT_MAXIMUM_PAGES: usize = 10_000;

/// Options for creating a store
///
/// ```
/// use anystore_client::{StoreOptions, TransferMode};
///
/// let opts = StoreOptions::new().maximum_pages(64).transfer(TransferMode::Bulk);
/// assert_eq!(opts.maximum_pages, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Pages committed when the region is created
    pub initial_pages: usize,
    /// Page limit; writes that would need more fail with `OutOfMemory`
    pub maximum_pages: usize,
    /// Whether writes apply immediately or on `commit`
    pub mode: WriteMode,
    /// How strings and blobs cross the boundary
    pub transfer: TransferMode,
}

impl StoreOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial page count
    pub fn initial_pages(mut self, pages: usize) -> Self {
        self.initial_pages = pages;
        self
    }

    /// Set the page limit
    pub fn maximum_pages(mut self, pages: usize) -> Self {
        self.maximum_pages = pages;
        self
    }

    /// Set the write mode
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the transfer mode
    pub fn transfer(mut self, transfer: TransferMode) -> Self {
        self.transfer = transfer;
        self
    }

    /// Check the page limits
    pub fn validate(&self) -> Result<()> {
        if self.maximum_pages == 0 {
            return Err(Error::Config("maximum_pages must be at least 1".into()));
        }
        if self.initial_pages > self.maximum_pages {
            return Err(Error::Config(format!(
                "initial_pages ({}) exceeds maximum_pages ({})",
                self.initial_pages, self.maximum_pages
            )));
        }
        Ok(())
    }

    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: StoreOptions =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initial_pages: DEFAULT_INITIAL_PAGES,
            maximum_pages: DEFAULT_MAXIMUM_PAGES,
            mode: WriteMode::Shared,
            transfer: TransferMode::PerUnit,
        }
    }
}

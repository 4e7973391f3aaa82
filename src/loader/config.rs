//! Loader configuration.
//!
//! [`LoaderConfig`] carries the memory-subsystem policies that affect how an image is copied.
//! It is passed explicitly to every load rather than read from process-wide state.
//!
//! # Presets
//!
//! | Preset | `defer_memory_map` | `clean_cache` |
//! |---|---|---|
//! | [`LoaderConfig::eager`] (default) | no | no |
//! | [`LoaderConfig::deferred`] | yes | no |
//! | [`LoaderConfig::noncoherent`] | no | yes |
//!
//! # Examples
//!
//! ```rust
//! use guestimage::LoaderConfig;
//!
//! let config = LoaderConfig {
//!     clean_cache: true,
//!     ..LoaderConfig::deferred()
//! };
//! assert!(config.defer_memory_map && config.clean_cache);
//! config.validate()?;
//! # Ok::<(), guestimage::Error>(())
//! ```

use crate::{memory::PAGE_SIZE_4K, Error::InvalidConfig, Result};

/// Policies applied while copying an image into guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// The VM maps guest frames lazily; map the image's frames before writing it
    pub defer_memory_map: bool,

    /// Guest memory may be observed through a cacheable alias; clean and invalidate every
    /// frame after writing it
    pub clean_cache: bool,

    /// Granularity of guest allocations, a power of two
    pub page_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            defer_memory_map: false,
            clean_cache: false,
            page_size: PAGE_SIZE_4K,
        }
    }
}

impl LoaderConfig {
    /// Frames are already mapped and caches are coherent.
    #[must_use]
    pub fn eager() -> Self {
        Self::default()
    }

    /// The VM defers frame mapping until first access.
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            defer_memory_map: true,
            ..Self::default()
        }
    }

    /// Guest memory is not coherent with the VMM's cached view: the guest may start with caches
    /// off, so written frames are cleaned to memory.
    #[must_use]
    pub fn noncoherent() -> Self {
        Self {
            clean_cache: true,
            ..Self::default()
        }
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if `page_size` is not a power of two.
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(InvalidConfig(format!(
                "page size {} is not a power of two",
                self.page_size
            )));
        }
        Ok(())
    }
}

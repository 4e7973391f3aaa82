//! # guestimage Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the guestimage library. Import this module to get quick access to the essential
//! types for loading guest boot images.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all guestimage operations
pub use crate::Error;

/// The result type used throughout guestimage
pub use crate::Result;

/// Memory-subsystem policies applied while copying
pub use crate::LoaderConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Kernel and module loading for one VM
pub use crate::ImageLoader;

/// Load descriptors
pub use crate::{GuestImage, GuestKernelImage};

/// Classification without loading
pub use crate::identify_image;

// ================================================================================================
// Image Identification
// ================================================================================================

/// Detected format and load context
pub use crate::image::{ImageKind, LoadContext};

/// Header access and the pure detection and resolution functions
pub use crate::image::{detect, resolve, ImageHeader, ZImageHeader};

/// Image sources
pub use crate::file::ImageFile;

// ================================================================================================
// Guest Memory
// ================================================================================================

/// Interfaces implemented by the VMM memory subsystem
pub use crate::memory::{FrameCap, GuestMemory, TouchedFrame, Vspace};

/// In-process implementations
pub use crate::memory::{GuestRam, HostVspace};

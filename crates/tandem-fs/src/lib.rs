//! Filesystem access for tandem, confined to one workspace root.
//!
//! The engine reads and rewrites manifests only through [`FileSystem`], so
//! it runs unchanged against the disk ([`NativeFileSystem`]) or against
//! [`MemoryFileSystem`], whose injected write failures drive the
//! partial-apply tests.

mod file_system;
pub use file_system::{DiscoveryOptions, EntryKind, FileSystem, ManifestQuery};

pub mod memory;
pub use memory::MemoryFileSystem;

#[cfg(feature = "native")]
pub mod native;
#[cfg(feature = "native")]
pub use native::NativeFileSystem;

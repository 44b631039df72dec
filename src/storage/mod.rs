//! External store seam and a reference in-memory implementation.

pub mod memory;
pub mod traits;

pub use memory::MemoryExternalStore;
pub use traits::ExternalStore;

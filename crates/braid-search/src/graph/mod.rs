//! Knowledge-graph sources.
//!
//! ## Submodules
//!
//! - [`memory`]: an in-memory `petgraph` graph loaded from a JSON fixture.

pub mod memory;

pub use memory::MemoryGraph;

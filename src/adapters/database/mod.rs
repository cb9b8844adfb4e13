//! Database abstraction layer
//!
//! A trait-based repository so the pipeline and the reply processor run
//! unchanged on PostgreSQL or in memory.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_repository;
pub use memory::InMemoryBatchRepository;
pub use traits::BatchRepository;

//! # Memory Management
//!
//! Render objects are instantiated once, when the pool is created. During
//! streaming they are only re-assigned, never created or destroyed.

mod pool;

pub use pool::{ChunkObjectPool, SlotId};

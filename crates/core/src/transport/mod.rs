//! Network glue for the RAOP control channel.
//!
//! - **TCP** ([`tcp`]): accepts sender connections, one thread per
//!   connection, exactly one request/response exchange each.
//! - **Pool** ([`pool`]): recycled read buffers for those connections.
//!
//! Audio (RTP over UDP) is not handled here.

pub mod pool;
pub mod tcp;

pub use pool::{PooledReader, ReaderPool};

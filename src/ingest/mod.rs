//! Stream Ingest (C4, spec §4.4): sharded WebSocket connections to the
//! combined `forceOrder` stream, one state machine per shard
//! (`ingest::session`), decoded via `ingest::decode`, run by
//! `ingest::shard::Shard`, and coordinated across shards by
//! `ingest::manager::IngestManager`.

pub mod decode;
pub mod manager;
pub mod session;
pub mod shard;

pub use manager::IngestManager;

//! # engram-queue
//!
//! Bounded, non-blocking write queue. Ops buffer in memory and apply in
//! batched transactions through a [`QueueExecutor`], either on a
//! background tick or an explicit flush. `write` never blocks; `flush`
//! awaits drain.

mod queue;

pub use queue::AsyncWriteQueue;

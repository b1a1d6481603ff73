#![deny(warnings)]
//! Low level building blocks shared by the render-graph's recording contexts.
//!
//! This crate deliberately knows nothing about the graph's scheduling or task model. It
//! only provides two primitives every recording context needs:
//!
//! - [BarrierAggregator]: collects pipeline barriers emitted while recording a pass and
//!   flushes them as a single `vkCmdPipelineBarrier2` call.
//! - [CommandPoolManager]: hands out command buffers from a per-frame, per-queue pool grid
//!   without requiring a global lock across unrelated queues.

mod barrier;
mod pool;

pub use barrier::{BarrierAggregator, PendingBarriers};
pub use pool::{CommandBufferLease, CommandPoolManager, PoolError};

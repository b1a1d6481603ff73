#![deny(warnings)]
//! A Vulkan render-graph execution core: automatic barrier derivation, indirect command
//! encoding, and a frame orchestrator built on top of `marpii`.
//!
//! The crate is organized around the stages a recorded frame passes through: generational
//! resource handles and trackers in [resources]/[track], recording contexts in [context],
//! the indirect command arena in [encode], the batch/frame lifecycle in [batch]/[frame], and
//! a thin façade in this module ([RenderGraph]) that wires them together.

pub mod batch;
pub mod context;
pub mod encode;
pub mod external;
pub mod frame;
pub mod resources;
pub mod task;
pub mod track;

use std::sync::Arc;

use marpii::context::Device;
use rendergraph_commands::PoolError;
use thiserror::Error;

use batch::{BatchError, BatchHandle};
use encode::DEFAULT_BLOCK_SIZE;
use external::{StagingBufferManager, TaskScheduler};
use frame::{FrameError, FrameOrchestrator};
use resources::Resources;
use task::RenderTask;

///Aggregates every module's error type the way `marpii-rmg`'s `RmgError` aggregates
///`MarpiiError`/`RecordError`/`ResourceError`. The capacity-exhausted and
///resource-lookup-failed cases stay out of this enum on purpose — they return `None`/are
///logged-and-skipped rather than surfaced as `Result`.
#[derive(Debug, Error)]
pub enum RenderGraphError {
    #[error("vulkan error")]
    Vk(#[from] marpii::ash::vk::Result),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no queue family {0} was registered in RenderGraphConfig::queue_families")]
    UnknownQueue(u32),
}

///Construction-time configuration, mirroring `marpii-rmg::Rmg::new`'s feature-checking
///constructor: no config-file crate, just a plain struct the host builds in code.
#[derive(Debug, Clone)]
pub struct RenderGraphConfig {
    ///How many frames the frame orchestrator keeps command pools for.
    pub frames_in_flight: usize,
    ///Every queue family a task may be recorded against.
    pub queue_families: Vec<u32>,
    ///Block size for each [context::Indirect] backend's command arena.
    pub command_arena_block_size: usize,
}

impl RenderGraphConfig {
    pub fn new(queue_families: Vec<u32>) -> Self {
        RenderGraphConfig {
            frames_in_flight: 2,
            queue_families,
            command_arena_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

///Top-level façade: owns the frame orchestrator and the resource store, and hands out
///batches a host records tasks into.
pub struct RenderGraph<Sch: TaskScheduler> {
    frame: FrameOrchestrator,
    resources: Resources,
    staging: Box<dyn StagingBufferManager>,
    scheduler: Sch,
    config: RenderGraphConfig,
}

impl<Sch: TaskScheduler> RenderGraph<Sch> {
    pub fn initialize(
        cfg: RenderGraphConfig,
        device: Arc<Device>,
        resources: Resources,
        staging: Box<dyn StagingBufferManager>,
        scheduler: Sch,
    ) -> Result<Self, RenderGraphError> {
        let frame = FrameOrchestrator::new(device, cfg.frames_in_flight, &cfg.queue_families)?;
        Ok(RenderGraph {
            frame,
            resources,
            staging,
            scheduler,
            config: cfg,
        })
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn staging_mut(&mut self) -> &mut dyn StagingBufferManager {
        self.staging.as_mut()
    }

    pub fn begin_frame(&self) -> Result<(), RenderGraphError> {
        self.frame.begin_frame()?;
        Ok(())
    }

    ///Opens a batch targeting `queue_family` that any number of tasks may cooperatively
    ///record into via [Self::record_task] before [Self::submit_batch] finalizes it.
    pub fn begin_batch(&self, queue_family: u32) -> Result<BatchHandle, RenderGraphError> {
        if !self.config.queue_families.contains(&queue_family) {
            return Err(RenderGraphError::UnknownQueue(queue_family));
        }
        Ok(self.frame.create_batch(queue_family)?)
    }

    ///Claims a recording slot in `batch`, runs `task`'s recording closure to produce a
    ///[encode::BakedCommands] stream, and publishes it into that slot.
    ///
    ///A task always records against a [context::Indirect] backend internally (built by the
    ///closure itself, per [RenderTask::new]'s signature): recording never touches the device,
    ///only `exe_order`-stamped tracker state and an in-memory arena. If `batch` has no free
    ///slot left, the task is logged and dropped without running its closure rather than
    ///failing the whole frame.
    pub fn record_task(&mut self, batch: BatchHandle, task: RenderTask) -> Result<(), RenderGraphError> {
        let name = task.name();
        let slot = match self.frame.acquire_slot(batch) {
            Ok(slot) => slot,
            Err(FrameError::Batch(BatchError::SlotsExhausted(handle, cap))) => {
                #[cfg(feature = "logging")]
                log::warn!("batch {handle:?} has no free recording slot left (capacity {cap}), dropping task '{name}'");
                let _ = (handle, cap, name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut resources = std::mem::take(&mut self.resources);
        let baked = task.into_baked(&mut resources);
        self.resources = resources;

        self.frame.publish_baked(batch, slot, baked)?;

        #[cfg(feature = "logging")]
        log::trace!("recorded task '{name}' into batch {batch:?} slot {slot}");
        let _ = name;
        Ok(())
    }

    ///Finalizes `batch`: locks its recording slots, replays every published task's baked
    ///stream onto its own leased command buffer, and enqueues the batch for `end_frame` to
    ///submit in dependency order. Matches the split `marpii-rmg` draws between encoding
    ///and execution — only this step (and the replay it triggers) touches the device.
    pub fn submit_batch(&self, batch: BatchHandle) -> Result<(), RenderGraphError> {
        self.frame.submit_batch(batch)?;
        Ok(())
    }

    ///Convenience wrapping [Self::begin_batch]/[Self::record_task]/[Self::submit_batch] for
    ///the common case of one task per batch.
    pub fn submit_task(&mut self, task: RenderTask) -> Result<BatchHandle, RenderGraphError> {
        let handle = self.begin_batch(task.queue_family())?;
        self.record_task(handle, task)?;
        self.submit_batch(handle)?;
        Ok(handle)
    }

    pub fn add_dependency(&self, batch: BatchHandle, depends_on: BatchHandle) -> Result<(), RenderGraphError> {
        self.frame.add_dependency(batch, depends_on)?;
        Ok(())
    }

    pub fn end_frame(&self) -> Result<(), RenderGraphError> {
        self.frame.end_frame()?;
        self.frame.retire_complete_batches();
        Ok(())
    }

    pub fn wait_all(&self) -> Result<(), RenderGraphError> {
        self.frame.wait_all()?;
        Ok(())
    }

    pub fn deinitialize(&self) -> Result<(), RenderGraphError> {
        self.frame.deinitialize()?;
        Ok(())
    }

    pub fn spawn(&self, work: Box<dyn FnOnce() + Send>) {
        self.scheduler.spawn(work);
    }
}

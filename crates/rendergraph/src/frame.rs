//! [FrameOrchestrator]: the `BeginFrame`/`RecordFrame`/`EndFrame` state machine and the
//! per-queue timeline semaphores and submission that go with it.
//!
//! Grounded on `marpii::sync::Semaphore` for the timeline-semaphore wrapper and the
//! `vkQueueSubmit2`/`SemaphoreSubmitInfo` shape used to submit against it. Cross-task
//! ordering is not inferred from a declared resource graph; this orchestrator instead
//! submits batches in the explicit dependency order the host declares via
//! [crate::batch::CommandBatch::add_dependency] (see `DESIGN.md`). Completion is tracked
//! two ways: a timeline semaphore per queue orders cross-queue submissions against each
//! other on the GPU, while each batch's own `vk::Fence` is what `end_frame` waits on from
//! the CPU before recycling that frame slot's command pools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use marpii::{ash::vk, context::Device, sync::Semaphore};
use parking_lot::Mutex;
use thiserror::Error;

use rendergraph_commands::{CommandPoolManager, PoolError};

use crate::batch::{BatchError, BatchHandle, BatchState, CommandBatch};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("vulkan error")]
    Vk(#[from] vk::Result),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("no queue registered for family {0}")]
    UnknownQueue(u32),
    #[error("batch handle is stale or belongs to a different orchestrator")]
    UnknownBatch,
    #[error("frame orchestrator is {0:?}, expected {1:?}")]
    InvalidTransition(FrameState, FrameState),
    #[error("end_frame could not make progress: {0} batch(es) still blocked on an unsatisfied dependency")]
    Deadlock(usize),
}

///The frame lifecycle, tracked the same way as [crate::batch::BatchState]: an `AtomicU8`
///CAS machine. `Idle` is re-entered after every `EndFrame`, so the cycle from the second
///frame on is `Idle -> BeginFrame -> RecordFrame -> Idle -> ...` until `deinitialize` moves
///it to `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameState {
    Initial = 0,
    Initialization = 1,
    Idle = 2,
    BeginFrame = 3,
    RecordFrame = 4,
    Destroyed = 5,
}

impl From<u8> for FrameState {
    fn from(v: u8) -> Self {
        match v {
            0 => FrameState::Initial,
            1 => FrameState::Initialization,
            2 => FrameState::Idle,
            3 => FrameState::BeginFrame,
            4 => FrameState::RecordFrame,
            5 => FrameState::Destroyed,
            _ => unreachable!("FrameState only ever stores 0..=5"),
        }
    }
}

struct AtomicFrameState(AtomicU8);

impl AtomicFrameState {
    fn new(state: FrameState) -> Self {
        AtomicFrameState(AtomicU8::new(state as u8))
    }

    fn load(&self) -> FrameState {
        FrameState::from(self.0.load(Ordering::Acquire))
    }

    fn advance(&self, from: FrameState, to: FrameState) -> Result<(), FrameError> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| FrameError::InvalidTransition(FrameState::from(actual), to))
    }
}

///One queue's submission state: its timeline semaphore, the next value it will signal, and
///the FIFO of batches recorded against it this frame, waiting for `end_frame` to drain them.
struct QueueState {
    queue_family: u32,
    queue: vk::Queue,
    semaphore: Arc<Semaphore>,
    next_value: AtomicU64,
    pending: Mutex<VecDeque<BatchHandle>>,
}

///Drives the frame lifecycle, owns the command-pool grid every [CommandBatch] leases from,
///and submits each frame's batches across however many queues the host registered.
pub struct FrameOrchestrator {
    device: Arc<Device>,
    state: AtomicFrameState,
    pool: CommandPoolManager,
    queues: Vec<QueueState>,
    batches: Mutex<slotmap::SlotMap<BatchHandle, Arc<CommandBatch>>>,
    frames_in_flight: usize,
    current_frame: AtomicUsize,
    current_frame_uid: AtomicU64,
}

impl FrameOrchestrator {
    pub fn new(device: Arc<Device>, frames_in_flight: usize, queue_families: &[u32]) -> Result<Self, FrameError> {
        let state = AtomicFrameState::new(FrameState::Initial);
        state.advance(FrameState::Initial, FrameState::Initialization)?;

        let pool = CommandPoolManager::new(&device, frames_in_flight, queue_families);

        let mut queues = Vec::with_capacity(queue_families.len());
        for &queue_family in queue_families {
            let native = device
                .get_first_queue_for_family(queue_family)
                .ok_or(FrameError::UnknownQueue(queue_family))?
                .inner;
            queues.push(QueueState {
                queue_family,
                queue: native,
                semaphore: Semaphore::new(&device, 0)?,
                next_value: AtomicU64::new(0),
                pending: Mutex::new(VecDeque::new()),
            });
        }

        state.advance(FrameState::Initialization, FrameState::Idle)?;

        Ok(FrameOrchestrator {
            device,
            state,
            pool,
            queues,
            batches: Mutex::new(slotmap::SlotMap::with_key()),
            frames_in_flight,
            current_frame: AtomicUsize::new(0),
            current_frame_uid: AtomicU64::new(0),
        })
    }

    ///Clones the device handle a host needs to build a [crate::context::Direct] backend or
    ///to replay a batch's baked command stream.
    pub fn device_handle(&self) -> Arc<Device> {
        self.device.clone()
    }

    fn queue_index(&self, queue_family: u32) -> Result<usize, FrameError> {
        self.queues
            .iter()
            .position(|q| q.queue_family == queue_family)
            .ok_or(FrameError::UnknownQueue(queue_family))
    }

    fn batch_arc(&self, handle: BatchHandle) -> Result<Arc<CommandBatch>, FrameError> {
        self.batches.lock().get(handle).cloned().ok_or(FrameError::UnknownBatch)
    }

    ///Advances `Idle -> BeginFrame -> RecordFrame` and picks the frame slot this frame's
    ///batches will lease command buffers from. The slot's pools were already reset by the
    ///previous `end_frame` call that last used this slot (or are untouched, the first time
    ///around); `begin_frame` itself does no waiting.
    pub fn begin_frame(&self) -> Result<(), FrameError> {
        self.state.advance(FrameState::Idle, FrameState::BeginFrame)?;

        let uid = self.current_frame_uid.fetch_add(1, Ordering::AcqRel) + 1;
        let slot = (uid as usize) % self.frames_in_flight;
        self.current_frame.store(slot, Ordering::Release);

        self.state.advance(FrameState::BeginFrame, FrameState::RecordFrame)?;
        Ok(())
    }

    ///Creates a fresh, empty [CommandBatch] targeting `queue_family` for the current frame
    ///slot. Only valid while `RecordFrame` is active. The batch leases no command buffer
    ///yet — tasks claim a recording slot in it via [Self::acquire_slot] and [Self::submit_batch]
    ///leases one buffer per published slot when it finalizes the batch.
    pub fn create_batch(&self, queue_family: u32) -> Result<BatchHandle, FrameError> {
        if self.state.load() != FrameState::RecordFrame {
            return Err(FrameError::InvalidTransition(self.state.load(), FrameState::RecordFrame));
        }
        let frame = self.current_frame.load(Ordering::Acquire);
        let frame_uid = self.current_frame_uid.load(Ordering::Acquire);
        let device = self.device.clone();
        let fence = CommandBatch::create_fence(&device)?;

        let mut batches = self.batches.lock();
        let handle = batches.insert_with_key(|key| Arc::new(CommandBatch::new(key, queue_family, frame, frame_uid, device, fence)));
        Ok(handle)
    }

    pub fn add_dependency(&self, batch: BatchHandle, depends_on: BatchHandle) -> Result<(), FrameError> {
        let b = self.batch_arc(batch)?;
        b.add_dependency(depends_on)?;
        Ok(())
    }

    ///Claims a recording slot in `handle`'s batch for a task about to produce a baked
    ///command stream.
    pub fn acquire_slot(&self, handle: BatchHandle) -> Result<usize, FrameError> {
        let batch = self.batch_arc(handle)?;
        Ok(batch.acquire_slot()?)
    }

    ///Publishes the baked command stream a task recorded for the slot it claimed.
    pub fn publish_baked(&self, handle: BatchHandle, slot: usize, baked: crate::encode::BakedCommands) -> Result<(), FrameError> {
        let batch = self.batch_arc(handle)?;
        batch.publish_baked(slot, baked);
        Ok(())
    }

    ///Releases a claimed slot without publishing anything, for a task that was cancelled.
    pub fn cancel_slot(&self, handle: BatchHandle, slot: usize) -> Result<(), FrameError> {
        let batch = self.batch_arc(handle)?;
        batch.cancel_slot(slot);
        Ok(())
    }

    ///Locks `handle`'s batch, replays every published slot into a freshly leased command
    ///buffer, and enqueues it on its queue's FIFO. `end_frame` drains these FIFOs in
    ///dependency order.
    pub fn submit_batch(&self, handle: BatchHandle) -> Result<(), FrameError> {
        let batch = self.batch_arc(handle)?;
        batch.mark_pending()?;

        let frame = batch.frame();
        let queue_family = batch.queue_family();
        batch.finalize(|| self.pool.get_command_buffer(frame, queue_family))?;

        let qi = self.queue_index(queue_family)?;
        self.queues[qi].pending.lock().push_back(handle);
        Ok(())
    }

    fn submit_one(&self, qi: usize, handle: BatchHandle) -> Result<(), FrameError> {
        let batch = self.batch_arc(handle)?;
        let signal_value = self.queues[qi].next_value.fetch_add(1, Ordering::AcqRel) + 1;

        let command_buffers = batch.command_buffers();
        let cmd_info: Vec<vk::CommandBufferSubmitInfo> =
            command_buffers.iter().map(|&cb| vk::CommandBufferSubmitInfo::default().command_buffer(cb)).collect();

        //cross-queue dependencies need an explicit GPU-side wait; same-queue ones are
        //already ordered by submission order within this FIFO.
        let mut wait_info = Vec::new();
        for dep in batch.dependencies() {
            let Ok(dep_batch) = self.batch_arc(dep) else { continue };
            if dep_batch.queue_family() == batch.queue_family() {
                continue;
            }
            let dep_qi = self.queue_index(dep_batch.queue_family())?;
            wait_info.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(self.queues[dep_qi].semaphore.inner)
                    .value(dep_batch.signal_value())
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }

        let signal_info = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.queues[qi].semaphore.inner)
            .value(signal_value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let submit = vk::SubmitInfo2::default()
            .command_buffer_infos(&cmd_info)
            .wait_semaphore_infos(&wait_info)
            .signal_semaphore_infos(&signal_info);

        unsafe {
            self.device.inner.queue_submit2(self.queues[qi].queue, core::slice::from_ref(&submit), batch.fence())?;
        }

        batch.mark_submitted(signal_value)?;

        #[cfg(feature = "logging")]
        log::trace!("submitted batch {handle:?} on queue family {} signalling {signal_value}", self.queues[qi].queue_family);

        Ok(())
    }

    ///Drains every queue's pending FIFO in dependency order, submits them, then waits on
    ///the fences of every batch occupying the frame slot the *next* `begin_frame` will
    ///reuse before resetting that slot's command pools. Advances `RecordFrame -> Idle`.
    ///Bounded to `O(pending * queues)` iterations: a batch only blocks on a dependency's
    ///`Submitted`/`Complete` state, which in a well-formed dependency graph without cycles
    ///is reached within one pass per queue in the worst case.
    pub fn end_frame(&self) -> Result<(), FrameError> {
        if self.state.load() != FrameState::RecordFrame {
            return Err(FrameError::InvalidTransition(self.state.load(), FrameState::RecordFrame));
        }

        let mut remaining: usize = self.queues.iter().map(|q| q.pending.lock().len()).sum();
        let max_iterations = remaining.max(1) * (self.queues.len().max(1) + 1);
        let mut iterations = 0usize;

        while remaining > 0 {
            iterations += 1;
            if iterations > max_iterations {
                return Err(FrameError::Deadlock(remaining));
            }

            let mut progressed = false;
            for qi in 0..self.queues.len() {
                let next = self.queues[qi].pending.lock().front().copied();
                let Some(handle) = next else { continue };

                let ready = {
                    let Ok(batch) = self.batch_arc(handle) else { continue };
                    batch.dependencies().iter().all(|dep| {
                        self.batch_arc(*dep)
                            .map(|b| matches!(b.state(), BatchState::Submitted | BatchState::Complete))
                            .unwrap_or(true)
                    })
                };
                if !ready {
                    continue;
                }

                self.submit_one(qi, handle)?;
                self.queues[qi].pending.lock().pop_front();
                progressed = true;
                remaining -= 1;
            }

            if !progressed && remaining > 0 {
                return Err(FrameError::Deadlock(remaining));
            }
        }

        let next_slot = ((self.current_frame_uid.load(Ordering::Acquire) + 1) as usize) % self.frames_in_flight;
        self.reclaim_slot(next_slot)?;

        self.state.advance(FrameState::RecordFrame, FrameState::Idle)?;
        Ok(())
    }

    ///Blocks on the fences of every batch still occupying `slot`, then resets that slot's
    ///command pools so the frame about to begin can lease fresh buffers from them.
    fn reclaim_slot(&self, slot: usize) -> Result<(), FrameError> {
        let occupants: Vec<(BatchHandle, Arc<CommandBatch>)> =
            self.batches.lock().iter().filter(|(_, b)| b.frame() == slot).map(|(h, b)| (h, b.clone())).collect();

        let fences: Vec<vk::Fence> = occupants
            .iter()
            .filter(|(_, b)| b.state() == BatchState::Submitted)
            .map(|(_, b)| b.fence())
            .collect();
        if !fences.is_empty() {
            unsafe { self.device.inner.wait_for_fences(&fences, true, u64::MAX)? };
        }

        let mut batches = self.batches.lock();
        for (handle, batch) in &occupants {
            if batch.state() == BatchState::Submitted {
                let _ = batch.mark_complete();
            }
            batches.remove(*handle);
        }
        drop(batches);

        self.pool.next_frame(slot)?;
        Ok(())
    }

    ///Blocks until every queue's timeline semaphore has reached the last value it was asked
    ///to signal. Used by `deinitialize` and by hosts that need a hard synchronization point.
    pub fn wait_all(&self) -> Result<(), FrameError> {
        for q in &self.queues {
            let target = q.next_value.load(Ordering::Acquire);
            if target > 0 {
                q.semaphore.wait(target, u64::MAX)?;
            }
        }
        Ok(())
    }

    ///Opportunistically retires every `Submitted` batch whose fence has already signalled,
    ///without blocking. Safe to call at any point; `end_frame` already blocks on the
    ///relevant fences itself before reusing a slot, so calling this is purely an
    ///optimization that frees a batch's command buffers earlier when polled.
    pub fn retire_complete_batches(&self) {
        let mut batches = self.batches.lock();
        let mut to_remove = Vec::new();
        for (handle, batch) in batches.iter() {
            if batch.state() == BatchState::Submitted {
                let signalled = unsafe { self.device.inner.get_fence_status(batch.fence()) };
                if matches!(signalled, Ok(true)) {
                    let _ = batch.mark_complete();
                    to_remove.push(handle);
                }
            }
        }
        for handle in to_remove {
            batches.remove(handle);
        }
    }

    pub fn deinitialize(&self) -> Result<(), FrameError> {
        self.wait_all()?;
        self.pool.release_resources();
        let _ = self.state.advance(FrameState::Idle, FrameState::Destroyed);
        Ok(())
    }
}

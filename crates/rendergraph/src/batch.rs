//! [CommandBatch]: a cooperative slot pool for many recorded tasks plus its lifecycle
//! state, fence, and dependency list. A batch is created by
//! [crate::frame::FrameOrchestrator::create_batch] during `RecordFrame`; any number of
//! tasks targeting the same queue family may concurrently acquire a slot, record into it
//! (either natively or via a baked [crate::encode::BakedCommands] replay), and publish —
//! before the frame orchestrator locks the batch, collects every slot's command buffer,
//! and submits them as one `vkQueueSubmit2` call. Grounded on
//! `VCommandBatch::CmdBufPool`/`VRenderTask` (`original_source/.../VCommandBatch.{h,cpp}`).

use std::sync::{
    atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
    Arc,
};

use marpii::{ash::vk, context::Device};
use parking_lot::Mutex;
use smallvec::SmallVec;
use thiserror::Error;

use rendergraph_commands::{CommandBufferLease, PoolError};

use crate::encode::BakedCommands;

slotmap::new_key_type! {
    pub struct BatchHandle;
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("vulkan error")]
    Vk(#[from] vk::Result),
    #[error("command pool error")]
    Pool(#[from] PoolError),
    #[error("batch {0:?} is still {1:?}, expected {2:?}")]
    InvalidTransition(BatchHandle, BatchState, BatchState),
    #[error("batch {0:?} has no dependency slot left (capacity {1})")]
    TooManyDependencies(BatchHandle, usize),
    #[error("batch {0:?} has no free recording slot left (capacity {1})")]
    SlotsExhausted(BatchHandle, usize),
}

///A batch's lifecycle, tracked as a 4-state `AtomicU8` CAS machine. Transitions only
///ever move forward; a batch recycled for a later frame is a fresh [CommandBatch], not a
///rewind of an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchState {
    ///Created, still accepting task recordings.
    Initial = 0,
    ///`finalize` has locked the slot pool; queued for submission by the frame orchestrator.
    Pending = 1,
    ///Handed to `vkQueueSubmit2`; `fence` now guards its completion.
    Submitted = 2,
    ///The fence has signalled; the leased command buffers may be recycled.
    Complete = 3,
}

impl From<u8> for BatchState {
    fn from(v: u8) -> Self {
        match v {
            0 => BatchState::Initial,
            1 => BatchState::Pending,
            2 => BatchState::Submitted,
            3 => BatchState::Complete,
            _ => unreachable!("BatchState only ever stores 0..=3"),
        }
    }
}

struct AtomicBatchState(AtomicU8);

impl AtomicBatchState {
    fn new(state: BatchState) -> Self {
        AtomicBatchState(AtomicU8::new(state as u8))
    }

    fn load(&self) -> BatchState {
        BatchState::from(self.0.load(Ordering::Acquire))
    }

    ///Advances the state from `from` to `to`, failing with [BatchError::InvalidTransition] if
    ///another thread already moved it elsewhere. Batches are single-producer in practice (one
    ///recorder thread per batch) but the CAS keeps the invariant enforced rather than assumed.
    fn advance(&self, handle: BatchHandle, from: BatchState, to: BatchState) -> Result<(), BatchError> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| BatchError::InvalidTransition(handle, BatchState::from(actual), to))
    }
}

const MAX_DEPENDENCIES: usize = 8;
///How many render tasks may concurrently record into one batch, mirroring
///`GraphicsConfig::MaxCmdBufPerBatch`.
pub const MAX_CMD_BUF_PER_BATCH: usize = 16;

///What a recording task handed a slot: either a command buffer it recorded into directly
///(native recording) or a baked command stream still to be replayed into a leased buffer
///at `finalize` time. Safe-Rust stand-in for the original's raw `Cmdbuf` union.
enum SlotContent {
    Native(vk::CommandBuffer),
    Baked(BakedCommands),
}

struct Slot {
    ready: AtomicBool,
    content: Mutex<Option<SlotContent>>,
}

impl Slot {
    fn new() -> Self {
        Slot { ready: AtomicBool::new(false), content: Mutex::new(None) }
    }
}

///A cooperative pool of recording slots shared by every task targeting one batch. Tasks
///call [Self::acquire] to claim an index, record independently (no locking against one
///another), then [Self::publish_native]/[Self::publish_baked] to hand their result back.
///Grounded on `VCommandBatch::CmdBufPool`.
struct CmdBufPool {
    counter: AtomicUsize,
    slots: Box<[Slot]>,
}

impl CmdBufPool {
    fn new() -> Self {
        CmdBufPool {
            counter: AtomicUsize::new(0),
            slots: (0..MAX_CMD_BUF_PER_BATCH).map(|_| Slot::new()).collect(),
        }
    }

    ///Claims the next free slot index, or `None` once every slot in the batch is taken.
    fn acquire(&self) -> Option<usize> {
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        (idx < self.slots.len()).then_some(idx)
    }

    fn publish_native(&self, idx: usize, cmdbuf: vk::CommandBuffer) {
        let slot = &self.slots[idx];
        *slot.content.lock() = Some(SlotContent::Native(cmdbuf));
        slot.ready.store(true, Ordering::Release);
    }

    fn publish_baked(&self, idx: usize, baked: BakedCommands) {
        let slot = &self.slots[idx];
        *slot.content.lock() = Some(SlotContent::Baked(baked));
        slot.ready.store(true, Ordering::Release);
    }

    ///Marks a slot done without any content, for a task that cancelled after acquiring one.
    fn complete_empty(&self, idx: usize) {
        self.slots[idx].ready.store(true, Ordering::Release);
    }

    ///Locks the pool against further `acquire` calls by pinning the counter at capacity,
    ///and marks every slot past the high-water mark as trivially ready. Not safe to call
    ///concurrently with `acquire`; the batch's `Pending` transition guards that.
    fn lock(&self, used: &mut usize) {
        let count = self.counter.swap(self.slots.len(), Ordering::Relaxed);
        *used = count.min(self.slots.len());
        for slot in &self.slots[*used..] {
            slot.ready.store(true, Ordering::Relaxed);
        }
    }

    fn is_ready(&self, used: usize) -> bool {
        self.slots[..used].iter().all(|s| s.ready.load(Ordering::Relaxed))
    }
}

///One recorded unit of work targeting a single queue family: a cooperative pool of
///recording slots, a fence guarding GPU completion, and the batches it must wait on
///before submission. Dependencies are declared by the recording task itself — the core
///never infers them from resource use (see `DESIGN.md`).
pub struct CommandBatch {
    handle: BatchHandle,
    queue_family: u32,
    frame: usize,
    frame_uid: u64,
    device: Arc<Device>,
    fence: vk::Fence,
    pool: CmdBufPool,
    used_slots: Mutex<usize>,
    native_buffers: Mutex<Vec<vk::CommandBuffer>>,
    state: AtomicBatchState,
    dependencies: Mutex<SmallVec<[BatchHandle; MAX_DEPENDENCIES]>>,
    ///The timeline value this batch's submission will signal once complete. Assigned when
    ///the frame orchestrator submits it; `0` means "not yet submitted".
    signal_value: std::sync::atomic::AtomicU64,
}

impl CommandBatch {
    ///Creates the fence `new` needs up front, so a caller assembling a batch inside a
    ///`SlotMap::insert_with_key` closure (which must be infallible) can surface the one
    ///fallible step — fence creation — before committing to the insert.
    pub(crate) fn create_fence(device: &Device) -> Result<vk::Fence, BatchError> {
        Ok(unsafe { device.inner.create_fence(&vk::FenceCreateInfo::default(), None)? })
    }

    pub(crate) fn new(handle: BatchHandle, queue_family: u32, frame: usize, frame_uid: u64, device: Arc<Device>, fence: vk::Fence) -> Self {
        CommandBatch {
            handle,
            queue_family,
            frame,
            frame_uid,
            device,
            fence,
            pool: CmdBufPool::new(),
            used_slots: Mutex::new(0),
            native_buffers: Mutex::new(Vec::new()),
            state: AtomicBatchState::new(BatchState::Initial),
            dependencies: Mutex::new(SmallVec::new()),
            signal_value: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> BatchHandle {
        self.handle
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn frame_uid(&self) -> u64 {
        self.frame_uid
    }

    pub fn fence(&self) -> vk::Fence {
        self.fence
    }

    pub fn state(&self) -> BatchState {
        self.state.load()
    }

    pub fn signal_value(&self) -> u64 {
        self.signal_value.load(Ordering::Acquire)
    }

    ///Claims a recording slot for a task about to record directly into a leased native
    ///command buffer. Returns [BatchError::SlotsExhausted] once `MAX_CMD_BUF_PER_BATCH`
    ///tasks have already claimed one this batch.
    pub fn acquire_slot(&self) -> Result<usize, BatchError> {
        self.pool.acquire().ok_or(BatchError::SlotsExhausted(self.handle, MAX_CMD_BUF_PER_BATCH))
    }

    ///Publishes the native command buffer a task recorded into the slot it acquired.
    pub fn publish_native(&self, slot: usize, cmdbuf: vk::CommandBuffer) {
        self.pool.publish_native(slot, cmdbuf);
    }

    ///Publishes a baked command stream still to be replayed into a leased buffer at
    ///`finalize` time.
    pub fn publish_baked(&self, slot: usize, baked: BakedCommands) {
        self.pool.publish_baked(slot, baked);
    }

    ///Releases a claimed slot without publishing anything, for a task that was cancelled
    ///after acquiring its slot.
    pub fn cancel_slot(&self, slot: usize) {
        self.pool.complete_empty(slot);
    }

    ///Locks the pool, replays every baked slot into a freshly leased command buffer via
    ///`lease_buffer`, and returns every native command buffer this batch will submit, in
    ///slot order. Grounded on `CmdBufPool::Lock`/`GetCommands`/`CommitIndirectBuffers`.
    pub(crate) fn finalize(&self, mut lease_buffer: impl FnMut() -> Result<CommandBufferLease, PoolError>) -> Result<Vec<vk::CommandBuffer>, BatchError> {
        let mut used = self.used_slots.lock();
        self.pool.lock(&mut used);
        debug_assert!(self.pool.is_ready(*used), "finalize called before every acquired slot published");

        let mut buffers = self.native_buffers.lock();
        for slot in &self.pool.slots[..*used] {
            match slot.content.lock().take() {
                Some(SlotContent::Native(cmdbuf)) => buffers.push(cmdbuf),
                Some(SlotContent::Baked(baked)) => {
                    let lease = lease_buffer()?;
                    let cmdbuf = lease.buffer();
                    unsafe {
                        self.device.inner.begin_command_buffer(cmdbuf, &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT))?;
                        baked.execute(&self.device, cmdbuf);
                        self.device.inner.end_command_buffer(cmdbuf)?;
                    }
                    buffers.push(cmdbuf);
                }
                None => {} //slot acquired then cancelled: nothing to submit
            }
        }
        Ok(buffers.clone())
    }

    pub fn command_buffers(&self) -> Vec<vk::CommandBuffer> {
        self.native_buffers.lock().clone()
    }

    ///Declares that this batch must not be submitted before `other` has been submitted.
    ///Dependencies only ever cross queue families in practice (same-queue ordering is
    ///already implied by submission order); cross-checking that is left to the caller.
    pub fn add_dependency(&self, other: BatchHandle) -> Result<(), BatchError> {
        let mut deps = self.dependencies.lock();
        if deps.len() == MAX_DEPENDENCIES {
            return Err(BatchError::TooManyDependencies(self.handle, MAX_DEPENDENCIES));
        }
        deps.push(other);
        Ok(())
    }

    pub(crate) fn dependencies(&self) -> SmallVec<[BatchHandle; MAX_DEPENDENCIES]> {
        self.dependencies.lock().clone()
    }

    pub(crate) fn mark_pending(&self) -> Result<(), BatchError> {
        self.state.advance(self.handle, BatchState::Initial, BatchState::Pending)
    }

    pub(crate) fn mark_submitted(&self, signal_value: u64) -> Result<(), BatchError> {
        self.state.advance(self.handle, BatchState::Pending, BatchState::Submitted)?;
        self.signal_value.store(signal_value, Ordering::Release);
        Ok(())
    }

    pub(crate) fn mark_complete(&self) -> Result<(), BatchError> {
        self.state.advance(self.handle, BatchState::Submitted, BatchState::Complete)
    }
}

impl Drop for CommandBatch {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_fence(self.fence, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(CommandBatch: Send, Sync);

    #[test]
    fn state_transitions_only_move_forward() {
        let state = AtomicBatchState::new(BatchState::Initial);
        let handle = slotmap::SlotMap::<BatchHandle, ()>::with_key().insert(());
        assert!(state.advance(handle, BatchState::Initial, BatchState::Pending).is_ok());
        assert!(state.advance(handle, BatchState::Initial, BatchState::Pending).is_err());
        assert!(state.advance(handle, BatchState::Pending, BatchState::Submitted).is_ok());
        assert_eq!(state.load(), BatchState::Submitted);
    }

    #[test]
    fn dependency_list_is_capacity_bounded() {
        let handle = slotmap::SlotMap::<BatchHandle, ()>::with_key().insert(());
        let deps: Mutex<SmallVec<[BatchHandle; MAX_DEPENDENCIES]>> = Mutex::new(SmallVec::new());
        for _ in 0..MAX_DEPENDENCIES {
            deps.lock().push(handle);
        }
        assert_eq!(deps.lock().len(), MAX_DEPENDENCIES);
    }

    #[test]
    fn slot_pool_caps_at_max_cmd_buf_per_batch() {
        let pool = CmdBufPool::new();
        let mut acquired = 0;
        while pool.acquire().is_some() {
            acquired += 1;
        }
        assert_eq!(acquired, MAX_CMD_BUF_PER_BATCH);
        assert!(pool.acquire().is_none());
    }
}

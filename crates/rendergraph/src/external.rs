//! Collaborators the core consumes but does not provide: a staging-buffer manager for
//! async upload/read, and a minimal task-scheduler seam so `BeginFrame`/`EndFrame` can be
//! posted as tasks without the core owning a thread pool.

use marpii::ash::vk;

///A short-lived staging allocation, valid for the frame it was leased in.
pub struct StagingAllocation {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub mapped_ptr: Option<std::ptr::NonNull<u8>>,
}

///Leases host-visible memory for upload/read streams. The core never allocates device
///memory itself; every `Transfer` upload/read call routes through here.
pub trait StagingBufferManager {
    #[allow(clippy::too_many_arguments)]
    fn get_staging_buffer(
        &mut self,
        size: u64,
        block: bool,
        align: u64,
        frame: usize,
        heap: vk::MemoryPropertyFlags,
        queue_family: u32,
        write: bool,
    ) -> Option<StagingAllocation>;
}

///A generic task-spawning seam. `BeginFrame`/`EndFrame` are posted as tasks on a dedicated
///renderer thread; the core only needs an executor, never a scheduler.
pub trait TaskScheduler {
    fn spawn(&self, task: Box<dyn FnOnce() + Send>);
}

///Runs spawned tasks synchronously on the calling thread. Sufficient for tests and for
///single-threaded hosts that drive `begin_frame`/`end_frame` themselves.
pub struct InlineScheduler;

impl TaskScheduler for InlineScheduler {
    fn spawn(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use marpii::{ash::vk, context::Device};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("vulkan error")]
    Vk(#[from] vk::Result),
    #[error("queue family {0} has exhausted all {1} of its command pools for this frame slot")]
    PoolsExhausted(u32, usize),
    #[error("frame index {0} is out of the manager's `frames_in_flight` range")]
    InvalidFrame(usize),
    #[error("command pool for queue family {0} is still leased during a frame reset")]
    StillLocked(u32),
}

///How many command buffers a single native pool hands out before a fresh pool is created
///for the same queue.
const MAX_CMD_BUFFERS_PER_POOL: u32 = 16;
///How many native pools one `(frame, queue_family)` slot may grow to under contention.
const MAX_POOLS_PER_QUEUE: usize = 8;

struct CmdPoolInner {
    handle: Option<vk::CommandPool>,
    buffers: Vec<vk::CommandBuffer>,
}

///One native `VkCommandPool` plus the buffers allocated from it so far. Locked for the
///whole lifetime of any command buffer leased out of it: `CommandBufferLease` holds this
///lock's guard directly, so the pool can't be reset out from under a buffer still being
///recorded into.
struct CmdPool {
    queue_family: u32,
    count: AtomicU32,
    lock: Arc<Mutex<CmdPoolInner>>,
}

impl CmdPool {
    fn new(queue_family: u32) -> Self {
        CmdPool {
            queue_family,
            count: AtomicU32::new(0),
            lock: Arc::new(Mutex::new(CmdPoolInner { handle: None, buffers: Vec::new() })),
        }
    }

    ///Creates the native pool on first use, then allocates one more primary command buffer
    ///from it. Caller already holds `guard`.
    fn allocate(&self, device: &Device, guard: &mut ArcMutexGuard<RawMutex, CmdPoolInner>) -> Result<vk::CommandBuffer, PoolError> {
        let handle = match guard.handle {
            Some(h) => h,
            None => {
                let h = unsafe {
                    device.inner.create_command_pool(
                        &vk::CommandPoolCreateInfo::default()
                            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                            .queue_family_index(self.queue_family),
                        None,
                    )?
                };
                guard.handle = Some(h);
                h
            }
        };

        let buf = unsafe {
            device.inner.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(handle)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?[0]
        };
        guard.buffers.push(buf);
        Ok(buf)
    }

    ///Resets the native pool, invalidating every command buffer handed out of it. Fails
    ///rather than skipping if a lease is still outstanding, since that means a caller
    ///recycled a frame slot without waiting for its batches to retire.
    fn reset(&self, device: &Device) -> Result<(), PoolError> {
        let Some(mut guard) = self.lock.try_lock() else {
            return Err(PoolError::StillLocked(self.queue_family));
        };
        if let Some(handle) = guard.handle {
            unsafe { device.inner.reset_command_pool(handle, vk::CommandPoolResetFlags::empty())? };
        }
        guard.buffers.clear();
        self.count.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn destroy(&self, device: &Device) {
        let mut guard = self.lock.lock();
        if let Some(handle) = guard.handle.take() {
            unsafe { device.inner.destroy_command_pool(handle, None) };
        }
        guard.buffers.clear();
        self.count.store(0, Ordering::Relaxed);
    }
}

///A leased command buffer. Holds the owning native pool's lock for as long as the lease
///lives, so the pool cannot be reset while a task is still recording into it; dropping the
///lease (or letting it fall out of scope once recording is done) releases the lock.
pub struct CommandBufferLease {
    buffer: vk::CommandBuffer,
    queue_family: u32,
    frame: usize,
    _guard: ArcMutexGuard<RawMutex, CmdPoolInner>,
}

impl CommandBufferLease {
    pub fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn frame(&self) -> usize {
        self.frame
    }
}

///All native pools for one `(frame, queue_family)` slot, grown up to [MAX_POOLS_PER_QUEUE]
///under contention.
struct CmdPoolPerQueue {
    queue_family: u32,
    pool_count: AtomicUsize,
    pools: Vec<CmdPool>,
}

impl CmdPoolPerQueue {
    fn new(queue_family: u32) -> Self {
        CmdPoolPerQueue {
            queue_family,
            pool_count: AtomicUsize::new(0),
            pools: (0..MAX_POOLS_PER_QUEUE).map(|_| CmdPool::new(queue_family)).collect(),
        }
    }

    ///Scans the pools created so far twice (contention may free one up between passes),
    ///picking the first one that is both lockable and not yet full. Falls through to
    ///creating a brand new pool, under its own exclusive lock, if every existing pool is
    ///either contended or exhausted.
    fn acquire(&self, device: &Device) -> Result<(vk::CommandBuffer, ArcMutexGuard<RawMutex, CmdPoolInner>), PoolError> {
        let mut pool_count = self.pool_count.load(Ordering::Relaxed);
        let mut pool_idx = 0usize;

        for pass in 0..2 {
            if pass == 1 {
                pool_count = self.pool_count.load(Ordering::Relaxed);
            }
            while pool_idx < pool_count {
                let pool = &self.pools[pool_idx];
                pool_idx += 1;

                let Some(mut guard) = pool.lock.try_lock_arc() else {
                    continue;
                };
                if guard.handle.is_none() {
                    continue; //not created yet
                }
                let index = pool.count.fetch_add(1, Ordering::Relaxed);
                if index < MAX_CMD_BUFFERS_PER_POOL {
                    let buf = pool.allocate(device, &mut guard)?;
                    return Ok((buf, guard));
                }
            }
        }

        let pool_idx = self.pool_count.fetch_add(1, Ordering::Relaxed);
        if pool_idx >= MAX_POOLS_PER_QUEUE {
            return Err(PoolError::PoolsExhausted(self.queue_family, MAX_POOLS_PER_QUEUE));
        }
        let pool = &self.pools[pool_idx];
        let mut guard = pool.lock.lock_arc();
        debug_assert!(guard.handle.is_none());
        let index = pool.count.fetch_add(1, Ordering::Relaxed);
        if index < MAX_CMD_BUFFERS_PER_POOL {
            let buf = pool.allocate(device, &mut guard)?;
            Ok((buf, guard))
        } else {
            Err(PoolError::PoolsExhausted(self.queue_family, MAX_POOLS_PER_QUEUE))
        }
    }

    fn reset(&self, device: &Device) -> Result<(), PoolError> {
        let pool_count = self.pool_count.load(Ordering::Relaxed).min(MAX_POOLS_PER_QUEUE);
        for pool in &self.pools[..pool_count] {
            pool.reset(device)?;
        }
        Ok(())
    }

    fn destroy(&self, device: &Device) {
        let pool_count = self.pool_count.swap(0, Ordering::Relaxed).min(MAX_POOLS_PER_QUEUE);
        for pool in &self.pools[..pool_count] {
            pool.destroy(device);
        }
    }
}

struct CommandPoolManagerInner {
    device: Arc<Device>,
    ///`frames[frame_idx]`, one [CmdPoolPerQueue] per queue family in that frame slot.
    frames: Vec<Vec<CmdPoolPerQueue>>,
}

impl CommandPoolManagerInner {
    fn queue(&self, frame: usize, queue_family: u32) -> Option<&CmdPoolPerQueue> {
        self.frames.get(frame)?.iter().find(|q| q.queue_family == queue_family)
    }
}

///Thread-safe manager for a `frames_in_flight x queue_families x pools_per_queue` grid of
///command pools. Each `(frame, queue_family)` slot starts with zero native pools and grows
///them lazily, under contention, up to [MAX_POOLS_PER_QUEUE]; acquiring a buffer never
///blocks on another thread leasing from a different pool, only on one contending for the
///exact same pool.
pub struct CommandPoolManager {
    inner: Arc<CommandPoolManagerInner>,
}

impl CommandPoolManager {
    ///Creates a manager for `frames_in_flight` frame slots, each with one queue slot per
    ///entry in `queue_families`.
    pub fn new(device: &Arc<Device>, frames_in_flight: usize, queue_families: &[u32]) -> Self {
        let frames = (0..frames_in_flight)
            .map(|_| queue_families.iter().map(|&qf| CmdPoolPerQueue::new(qf)).collect())
            .collect();

        CommandPoolManager {
            inner: Arc::new(CommandPoolManagerInner { device: device.clone(), frames }),
        }
    }

    ///Leases a command buffer for `queue_family` out of the pool grid belonging to `frame`.
    ///Returns [PoolError::PoolsExhausted] if every pool for that queue is both full and at
    ///the per-queue pool cap; this should only happen under a severe misconfiguration, since
    ///pools are reset every [Self::next_frame] once their frame's submissions have retired.
    pub fn get_command_buffer(&self, frame: usize, queue_family: u32) -> Result<CommandBufferLease, PoolError> {
        let queue = self.inner.queue(frame, queue_family).ok_or(PoolError::InvalidFrame(frame))?;
        let (buffer, guard) = queue.acquire(&self.inner.device)?;

        Ok(CommandBufferLease {
            buffer,
            queue_family,
            frame,
            _guard: guard,
        })
    }

    ///Resets every pool belonging to `frame`, recycling its command buffers for reuse. Only
    ///call this once the caller has confirmed (via fence or timeline semaphore) that no
    ///in-flight submission still references buffers from this frame slot.
    pub fn next_frame(&self, frame: usize) -> Result<(), PoolError> {
        let queues = self.inner.frames.get(frame).ok_or(PoolError::InvalidFrame(frame))?;
        for queue in queues {
            queue.reset(&self.inner.device)?;
        }
        Ok(())
    }

    ///Destroys every native pool this manager owns. Called on shutdown; no leases may be
    ///outstanding when this runs.
    pub fn release_resources(&self) {
        for frame in &self.inner.frames {
            for queue in frame {
                queue.destroy(&self.inner.device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(CommandPoolManager: Send, Sync);
    //`CommandBufferLease` holds an `ArcMutexGuard`, which is `Send` but not `Sync`: it may
    //move to the thread that finishes recording and drops it, but can't be shared.
    assert_impl_all!(CommandBufferLease: Send);
}

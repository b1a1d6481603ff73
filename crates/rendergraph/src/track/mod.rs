//! Per-resource last-use bookkeeping.
//!
//! A tracker never owns the resource it describes; it holds only the mutable
//! access state and is handed a reference to the resource's native handle at
//! `commit_barrier` time. Trackers are single-thread-owned by the recording
//! context that created them.

pub mod buffer;
pub mod image;
pub mod ranged;

pub use buffer::BufferTracker;
pub use image::ImageTracker;
pub use ranged::{RangedBufferTracker, RangedImageTracker};

use marpii::ash::vk;

///Read-only access bits we invalidate en masse after a write, mirroring an
///`unavailable` mask over an `EResourceState` read-bit union; expressed here over raw
///Vulkan access flags since the core has no intermediate state enum.
pub const ALL_READ_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::SHADER_READ.as_raw()
        | vk::AccessFlags2::UNIFORM_READ.as_raw()
        | vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw()
        | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw()
        | vk::AccessFlags2::INDEX_READ.as_raw()
        | vk::AccessFlags2::VERTEX_ATTRIBUTE_READ.as_raw()
        | vk::AccessFlags2::INDIRECT_COMMAND_READ.as_raw()
        | vk::AccessFlags2::TRANSFER_READ.as_raw()
        | vk::AccessFlags2::HOST_READ.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw(),
);

///A single accumulated access record: merged stage/access masks plus the
///highest `exe_order` stamped on any contributing call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

///One use of a resource, as passed to `add_pending_state`. `layout` is only
///meaningful for images; `None` means "don't care" there.
#[derive(Clone, Copy, Debug)]
pub struct Access {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub is_write: bool,
    pub exe_order: u32,
    pub layout: Option<vk::ImageLayout>,
}

///Chooses the barrier's source stage/access for case (1)/(2): if there
///are outstanding readers, the barrier must wait on them (with a zero access
///mask, since reads don't need to be "made visible"); otherwise it waits on
///the last writer.
fn write_barrier_source(current_write: AccessState, current_read: AccessState) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    if current_read.stage != vk::PipelineStageFlags2::empty() {
        (current_read.stage, vk::AccessFlags2::empty())
    } else {
        (current_write.stage, current_write.access)
    }
}

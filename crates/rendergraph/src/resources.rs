//! Generational resource handles and the concrete, `marpii`-backed [Resources] store.
//!
//! Trackers never point back into this module; [crate::external::ResourceManager] hands out
//! a `&mut` borrow to the tracker for the duration of one `commit_barrier` call and nothing
//! is retained afterward, per the design notes on avoiding cyclic ownership.

use marpii::{
    ash::vk,
    resources::{Buffer, Image},
};
use rendergraph_commands::BarrierAggregator;
use std::sync::Arc;

use crate::track::{BufferTracker, ImageTracker, RangedBufferTracker, RangedImageTracker};

slotmap::new_key_type! {
    pub struct BufferHandle;
}
slotmap::new_key_type! {
    pub struct ImageHandle;
}

pub enum SyncGranularity<W, R> {
    Whole(W),
    Ranged(R),
}

struct TrackedBuffer {
    buffer: Arc<Buffer>,
    tracker: SyncGranularity<BufferTracker, RangedBufferTracker>,
}

struct TrackedImage {
    image: Arc<Image>,
    default_layout: vk::ImageLayout,
    tracker: SyncGranularity<ImageTracker, RangedImageTracker>,
}

///Owns every buffer/image the graph knows about plus its resource-state tracker, keyed by
///generational [BufferHandle]/[ImageHandle]. Grounded on `marpii-rmg`'s `Resources` /
///`SlotMap` usage (`resources.rs`, `resources/res_states.rs`), simplified to drop the
///bindless-descriptor coupling that is out of this core's scope.
pub struct Resources {
    buffers: slotmap::SlotMap<BufferHandle, TrackedBuffer>,
    images: slotmap::SlotMap<ImageHandle, TrackedImage>,
}

impl Resources {
    pub fn new() -> Self {
        Resources {
            buffers: slotmap::SlotMap::with_key(),
            images: slotmap::SlotMap::with_key(),
        }
    }

    pub fn add_buffer(&mut self, buffer: Arc<Buffer>, ranged: bool) -> BufferHandle {
        let tracker = if ranged {
            SyncGranularity::Ranged(RangedBufferTracker::new(vk::ImageLayout::UNDEFINED))
        } else {
            SyncGranularity::Whole(BufferTracker::new())
        };
        self.buffers.insert(TrackedBuffer { buffer, tracker })
    }

    pub fn add_image(&mut self, image: Arc<Image>, default_layout: vk::ImageLayout, ranged: bool) -> ImageHandle {
        let tracker = if ranged {
            SyncGranularity::Ranged(RangedImageTracker::new(default_layout))
        } else {
            SyncGranularity::Whole(ImageTracker::new(default_layout))
        };
        self.images.insert(TrackedImage { image, default_layout, tracker })
    }

    pub fn buffer_native(&self, handle: BufferHandle) -> Option<vk::Buffer> {
        self.buffers.get(handle).map(|b| b.buffer.inner)
    }

    pub fn image_native(&self, handle: ImageHandle) -> Option<vk::Image> {
        self.images.get(handle).map(|i| i.image.inner)
    }

    pub fn whole_buffer_tracker_mut(&mut self, handle: BufferHandle) -> Option<&mut BufferTracker> {
        match &mut self.buffers.get_mut(handle)?.tracker {
            SyncGranularity::Whole(t) => Some(t),
            SyncGranularity::Ranged(_) => None,
        }
    }

    pub fn ranged_buffer_tracker_mut(&mut self, handle: BufferHandle) -> Option<&mut RangedBufferTracker> {
        match &mut self.buffers.get_mut(handle)?.tracker {
            SyncGranularity::Ranged(t) => Some(t),
            SyncGranularity::Whole(_) => None,
        }
    }

    pub fn whole_image_tracker_mut(&mut self, handle: ImageHandle) -> Option<&mut ImageTracker> {
        match &mut self.images.get_mut(handle)?.tracker {
            SyncGranularity::Whole(t) => Some(t),
            SyncGranularity::Ranged(_) => None,
        }
    }

    pub fn ranged_image_tracker_mut(&mut self, handle: ImageHandle) -> Option<&mut RangedImageTracker> {
        match &mut self.images.get_mut(handle)?.tracker {
            SyncGranularity::Ranged(t) => Some(t),
            SyncGranularity::Whole(_) => None,
        }
    }

    pub fn default_image_layout(&self, handle: ImageHandle) -> Option<vk::ImageLayout> {
        self.images.get(handle).map(|i| i.default_layout)
    }

    ///Removes `handle`, emitting whatever barrier makes its last write visible before the
    ///underlying `vk::Buffer` is dropped. Returns the resource so the caller still owns
    ///its last reference (dropping it is what actually frees the memory).
    pub fn destroy_buffer(&mut self, handle: BufferHandle, aggregator: &mut BarrierAggregator) -> Option<Arc<Buffer>> {
        let tracked = self.buffers.remove(handle)?;
        let native = tracked.buffer.inner;
        match tracked.tracker {
            SyncGranularity::Whole(mut t) => {
                t.destroy_barrier(aggregator, |src_stage, dst_stage, src_access, dst_access| {
                    vk::BufferMemoryBarrier2::default()
                        .buffer(native)
                        .offset(0)
                        .size(vk::WHOLE_SIZE)
                        .src_stage_mask(src_stage)
                        .dst_stage_mask(dst_stage)
                        .src_access_mask(src_access)
                        .dst_access_mask(dst_access)
                });
            }
            SyncGranularity::Ranged(mut t) => {
                t.destroy_barrier(|s, e, src_stage, dst_stage, src_access, dst_access, _old_layout, _new_layout| {
                    aggregator.add_buffer_barrier(
                        vk::BufferMemoryBarrier2::default()
                            .buffer(native)
                            .offset(s)
                            .size(e - s)
                            .src_stage_mask(src_stage)
                            .dst_stage_mask(dst_stage)
                            .src_access_mask(src_access)
                            .dst_access_mask(dst_access),
                    );
                });
            }
        }
        Some(tracked.buffer)
    }

    ///Removes `handle`, emitting whatever barrier transitions it back to its default
    ///layout (and makes the last write visible) before the underlying `vk::Image` is
    ///dropped.
    pub fn destroy_image(&mut self, handle: ImageHandle, aggregator: &mut BarrierAggregator) -> Option<Arc<Image>> {
        let tracked = self.images.remove(handle)?;
        let native = tracked.image.inner;
        match tracked.tracker {
            SyncGranularity::Whole(mut t) => {
                t.destroy_barrier(aggregator, |src_stage, dst_stage, src_access, dst_access, old_layout, new_layout| {
                    vk::ImageMemoryBarrier2::default()
                        .image(native)
                        .old_layout(old_layout)
                        .new_layout(new_layout)
                        .src_stage_mask(src_stage)
                        .dst_stage_mask(dst_stage)
                        .src_access_mask(src_access)
                        .dst_access_mask(dst_access)
                        .subresource_range(
                            vk::ImageSubresourceRange::default()
                                .aspect_mask(vk::ImageAspectFlags::COLOR)
                                .level_count(vk::REMAINING_MIP_LEVELS)
                                .layer_count(vk::REMAINING_ARRAY_LAYERS),
                        )
                });
            }
            SyncGranularity::Ranged(mut t) => {
                t.destroy_barrier(|s, e, src_stage, dst_stage, src_access, dst_access, old_layout, new_layout| {
                    aggregator.add_image_barrier(
                        vk::ImageMemoryBarrier2::default()
                            .image(native)
                            .old_layout(old_layout)
                            .new_layout(new_layout)
                            .src_stage_mask(src_stage)
                            .dst_stage_mask(dst_stage)
                            .src_access_mask(src_access)
                            .dst_access_mask(dst_access)
                            .subresource_range(
                                vk::ImageSubresourceRange::default()
                                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                                    .base_mip_level(s as u32)
                                    .level_count((e - s) as u32)
                                    .base_array_layer(0)
                                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
                            ),
                    );
                });
            }
        }
        Some(tracked.image)
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

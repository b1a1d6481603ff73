use marpii::ash::vk;
use rendergraph_commands::BarrierAggregator;

use crate::resources::{BufferHandle, ImageHandle, Resources};
use crate::track::Access;

///How a `Context` derives barriers for the resources it touches.
///`Manual` lets a caller batch several uses before flushing; `PerResource`/`PerRange`
///commit a barrier immediately after every call, trading a few extra `vkCmdPipelineBarrier2`
///submissions for never having to remember to flush.
pub trait ResourceSync: Default {
    fn sync_buffer(&self, resources: &mut Resources, handle: BufferHandle, range: Option<(u64, u64)>, access: Access, aggregator: &mut BarrierAggregator);
    fn sync_image(&self, resources: &mut Resources, handle: ImageHandle, range: Option<(u64, u64)>, access: Access, aggregator: &mut BarrierAggregator);
}

///Records the use but never calls `commit_barrier`; the caller is responsible for
///draining each tracker's pending state (e.g. a render-graph compiler batching barriers
///across an entire pass before flushing once).
#[derive(Default)]
pub struct Manual;

impl ResourceSync for Manual {
    fn sync_buffer(&self, resources: &mut Resources, handle: BufferHandle, _range: Option<(u64, u64)>, access: Access, _aggregator: &mut BarrierAggregator) {
        if let Some(tracker) = resources.whole_buffer_tracker_mut(handle) {
            tracker.add_pending_state(access);
        }
    }

    fn sync_image(&self, resources: &mut Resources, handle: ImageHandle, _range: Option<(u64, u64)>, access: Access, _aggregator: &mut BarrierAggregator) {
        if let Some(tracker) = resources.whole_image_tracker_mut(handle) {
            tracker.add_pending_state(access);
        }
    }
}

fn whole_image_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .base_array_layer(0)
        .layer_count(vk::REMAINING_ARRAY_LAYERS)
}

///Whole-resource synchronization, committing immediately after every use. The common
///case for resources that are never partially bound.
#[derive(Default)]
pub struct PerResource;

impl ResourceSync for PerResource {
    fn sync_buffer(&self, resources: &mut Resources, handle: BufferHandle, _range: Option<(u64, u64)>, access: Access, aggregator: &mut BarrierAggregator) {
        let Some(native) = resources.buffer_native(handle) else { return };
        let Some(tracker) = resources.whole_buffer_tracker_mut(handle) else { return };
        tracker.add_pending_state(access);
        tracker.commit_barrier(aggregator, |src_stage, dst_stage, src_access, dst_access| {
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

    fn sync_image(&self, resources: &mut Resources, handle: ImageHandle, _range: Option<(u64, u64)>, access: Access, aggregator: &mut BarrierAggregator) {
        let Some(native) = resources.image_native(handle) else { return };
        let Some(tracker) = resources.whole_image_tracker_mut(handle) else { return };
        tracker.add_pending_state(access);
        tracker.commit_barrier(aggregator, |src_stage, dst_stage, src_access, dst_access, old_layout, new_layout| {
            vk::ImageMemoryBarrier2::default()
                .image(native)
                .old_layout(old_layout)
                .new_layout(new_layout)
                .src_stage_mask(src_stage)
                .dst_stage_mask(dst_stage)
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .subresource_range(whole_image_subresource_range())
        });
    }
}

///Sub-range synchronization, committing immediately. `range` defaults to the whole
///resource (`0..vk::WHOLE_SIZE` for buffers) when not given.
#[derive(Default)]
pub struct PerRange;

impl ResourceSync for PerRange {
    fn sync_buffer(&self, resources: &mut Resources, handle: BufferHandle, range: Option<(u64, u64)>, access: Access, aggregator: &mut BarrierAggregator) {
        let Some(native) = resources.buffer_native(handle) else { return };
        let (start, end) = range.unwrap_or((0, vk::WHOLE_SIZE));
        let Some(tracker) = resources.ranged_buffer_tracker_mut(handle) else { return };
        tracker.add_pending_state(start, end, access);
        tracker.commit_barrier(|s, e, src_stage, dst_stage, src_access, dst_access, _old_layout, _new_layout| {
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

    ///`range` is interpreted as `(base_mip_level, base_mip_level + level_count)`; layers
    ///are always the full array, matching how most render-graph passes slice images.
    fn sync_image(&self, resources: &mut Resources, handle: ImageHandle, range: Option<(u64, u64)>, access: Access, aggregator: &mut BarrierAggregator) {
        let Some(native) = resources.image_native(handle) else { return };
        let (start, end) = range.unwrap_or((0, u64::MAX));
        let Some(tracker) = resources.ranged_image_tracker_mut(handle) else { return };
        tracker.add_pending_state(start, end, access);
        tracker.commit_barrier(|s, e, src_stage, dst_stage, src_access, dst_access, old_layout, new_layout| {
            let level_count = if e == u64::MAX { vk::REMAINING_MIP_LEVELS } else { (e - s) as u32 };
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
                            .level_count(level_count)
                            .base_array_layer(0)
                            .layer_count(vk::REMAINING_ARRAY_LAYERS),
                    ),
            );
        });
    }
}

use marpii::ash::vk;
use rendergraph_commands::BarrierAggregator;

use super::{write_barrier_source, AccessState, Access, ALL_READ_ACCESS};

///Whole-resource image state tracker: identical rules to [super::BufferTracker] plus a
///layout transition case. Grounded on `VLocalResManager.cpp`.
#[derive(Debug)]
pub struct ImageTracker {
    current_write: AccessState,
    current_write_order: u32,
    current_read: AccessState,
    unavailable: vk::AccessFlags2,
    current_layout: vk::ImageLayout,
    default_layout: vk::ImageLayout,
    pending: Option<Access>,
}

impl ImageTracker {
    pub fn new(default_layout: vk::ImageLayout) -> Self {
        ImageTracker {
            current_write: AccessState::default(),
            current_write_order: 0,
            current_read: AccessState::default(),
            unavailable: vk::AccessFlags2::empty(),
            current_layout: default_layout,
            default_layout,
            pending: None,
        }
    }

    pub fn current_layout(&self) -> vk::ImageLayout {
        self.current_layout
    }

    pub fn set_initial_state(
        &mut self,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        layout: vk::ImageLayout,
        is_write: bool,
    ) {
        debug_assert!(self.pending.is_none(), "set_initial_state with a pending record outstanding");
        self.current_layout = layout;
        if is_write {
            self.current_write = AccessState { stage, access };
            self.current_read = AccessState::default();
            self.unavailable = vk::AccessFlags2::empty();
        } else {
            self.current_read = AccessState { stage, access };
        }
    }

    ///`access.layout` must agree across repeated calls within one commit cycle, or be
    ///`None` ("don't care").
    pub fn add_pending_state(&mut self, access: Access) {
        match &mut self.pending {
            None => self.pending = Some(access),
            Some(p) => {
                debug_assert!(
                    p.layout.is_none() || access.layout.is_none() || p.layout == access.layout,
                    "conflicting pending image layouts in one commit cycle"
                );
                p.stage |= access.stage;
                p.access |= access.access;
                p.is_write |= access.is_write;
                p.exe_order = p.exe_order.max(access.exe_order);
                p.layout = p.layout.or(access.layout);
            }
        }
    }

    pub fn commit_barrier(
        &mut self,
        aggregator: &mut BarrierAggregator,
        barrier_of: impl Fn(
            vk::PipelineStageFlags2,
            vk::PipelineStageFlags2,
            vk::AccessFlags2,
            vk::AccessFlags2,
            vk::ImageLayout,
            vk::ImageLayout,
        ) -> vk::ImageMemoryBarrier2<'static>,
    ) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let target_layout = pending.layout.unwrap_or(self.current_layout);

        if pending.is_write {
            let (src_stage, src_access) = write_barrier_source(self.current_write, self.current_read);
            aggregator.add_image_barrier(barrier_of(
                src_stage,
                pending.stage,
                src_access,
                pending.access,
                self.current_layout,
                target_layout,
            ));

            self.current_write = AccessState { stage: pending.stage, access: pending.access };
            self.current_write_order = pending.exe_order;
            self.current_read = AccessState::default();
            self.unavailable = ALL_READ_ACCESS;
            self.current_layout = target_layout;
        } else if self.current_layout != target_layout {
            let (src_stage, src_access) = write_barrier_source(self.current_write, self.current_read);
            aggregator.add_image_barrier(barrier_of(
                src_stage,
                pending.stage,
                src_access,
                pending.access,
                self.current_layout,
                target_layout,
            ));
            self.current_layout = target_layout;
            self.unavailable &= !pending.access;
            self.current_read.stage |= pending.stage;
            self.current_read.access |= pending.access;
        } else if self.unavailable.intersects(pending.access) {
            aggregator.add_image_barrier(barrier_of(
                self.current_write.stage,
                pending.stage,
                self.current_write.access,
                pending.access,
                self.current_layout,
                target_layout,
            ));
            self.unavailable &= !pending.access;
            self.current_read.stage |= pending.stage;
            self.current_read.access |= pending.access;
        } else {
            self.current_read.stage |= pending.stage;
            self.current_read.access |= pending.access;
        }
    }

    ///On destruction, transitions back to the default layout if anything has diverged from
    ///it. Emits no barrier if the image is already in its default state.
    pub fn destroy_barrier(
        &mut self,
        aggregator: &mut BarrierAggregator,
        barrier_of: impl FnOnce(
            vk::PipelineStageFlags2,
            vk::PipelineStageFlags2,
            vk::AccessFlags2,
            vk::AccessFlags2,
            vk::ImageLayout,
            vk::ImageLayout,
        ) -> vk::ImageMemoryBarrier2<'static>,
    ) {
        let needs_transition = self.current_layout != self.default_layout || self.unavailable != vk::AccessFlags2::empty();
        if !needs_transition {
            return;
        }
        let (src_stage, src_access) = write_barrier_source(self.current_write, self.current_read);
        aggregator.add_image_barrier(barrier_of(
            src_stage,
            vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            src_access,
            vk::AccessFlags2::empty(),
            self.current_layout,
            self.default_layout,
        ));
        self.current_layout = self.default_layout;
        self.unavailable = vk::AccessFlags2::empty();
    }

    pub fn current_write_order(&self) -> u32 {
        self.current_write_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_barrier(
        src_stage: vk::PipelineStageFlags2,
        dst_stage: vk::PipelineStageFlags2,
        src_access: vk::AccessFlags2,
        dst_access: vk::AccessFlags2,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .dst_stage_mask(dst_stage)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .old_layout(old_layout)
            .new_layout(new_layout)
    }

    #[test]
    fn write_then_multiple_readers_then_writer_again() {
        let mut tracker = ImageTracker::new(vk::ImageLayout::UNDEFINED);
        let mut agg = BarrierAggregator::new();

        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            is_write: true,
            exe_order: 1,
            layout: Some(vk::ImageLayout::TRANSFER_DST_OPTIMAL),
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        agg.clear_barriers();

        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::VERTEX_SHADER,
            access: vk::AccessFlags2::SHADER_READ,
            is_write: false,
            exe_order: 2,
            layout: Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        });
        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            access: vk::AccessFlags2::SHADER_READ,
            is_write: false,
            exe_order: 2,
            layout: Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        let pending = agg.get_barriers().unwrap();
        assert_eq!(pending.image_barriers.len(), 1);
        assert_eq!(pending.image_barriers[0].old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(pending.image_barriers[0].new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        agg.clear_barriers();

        //second draw using the same sampled image: no further barrier
        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::VERTEX_SHADER | vk::PipelineStageFlags2::FRAGMENT_SHADER,
            access: vk::AccessFlags2::SHADER_READ,
            is_write: false,
            exe_order: 3,
            layout: Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        assert!(agg.get_barriers().is_none());

        //writer after readers: src stages must be the readers' union, src access zero
        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            is_write: true,
            exe_order: 4,
            layout: Some(vk::ImageLayout::TRANSFER_DST_OPTIMAL),
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        let pending = agg.get_barriers().unwrap();
        assert_eq!(
            pending.image_barriers[0].src_stage_mask,
            vk::PipelineStageFlags2::VERTEX_SHADER | vk::PipelineStageFlags2::FRAGMENT_SHADER
        );
        assert_eq!(pending.image_barriers[0].src_access_mask, vk::AccessFlags2::empty());
    }

    #[test]
    fn destroy_at_default_layout_emits_nothing() {
        let mut tracker = ImageTracker::new(vk::ImageLayout::UNDEFINED);
        let mut agg = BarrierAggregator::new();
        tracker.destroy_barrier(&mut agg, dummy_barrier);
        assert!(agg.get_barriers().is_none());
    }
}

use marpii::ash::vk;
use rendergraph_commands::BarrierAggregator;

use super::{write_barrier_source, AccessState, Access, ALL_READ_ACCESS};

///Whole-resource buffer state tracker. Grounded on `VLocalResManager.cpp`'s
///buffer barrier derivation.
#[derive(Debug)]
pub struct BufferTracker {
    current_write: AccessState,
    current_write_order: u32,
    current_read: AccessState,
    unavailable: vk::AccessFlags2,
    pending: Option<Access>,
}

impl BufferTracker {
    pub fn new() -> Self {
        BufferTracker {
            current_write: AccessState::default(),
            current_write_order: 0,
            current_read: AccessState::default(),
            unavailable: vk::AccessFlags2::empty(),
            pending: None,
        }
    }

    ///Seeds the current record without emitting a barrier. No pending record may be
    ///outstanding.
    pub fn set_initial_state(&mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, is_write: bool) {
        debug_assert!(self.pending.is_none(), "set_initial_state with a pending record outstanding");
        if is_write {
            self.current_write = AccessState { stage, access };
            self.current_read = AccessState::default();
            self.unavailable = vk::AccessFlags2::empty();
        } else {
            self.current_read = AccessState { stage, access };
        }
    }

    ///Accumulates a use. May be called multiple times per commit cycle; repeated calls OR
    ///stage/access masks and take the max of `exe_order`.
    pub fn add_pending_state(&mut self, access: Access) {
        match &mut self.pending {
            None => self.pending = Some(access),
            Some(p) => {
                p.stage |= access.stage;
                p.access |= access.access;
                p.is_write |= access.is_write;
                p.exe_order = p.exe_order.max(access.exe_order);
            }
        }
    }

    ///Reduces pending into current, emitting a barrier into `aggregator` if needed.
    pub fn commit_barrier(
        &mut self,
        aggregator: &mut BarrierAggregator,
        barrier_of: impl FnOnce(vk::PipelineStageFlags2, vk::PipelineStageFlags2, vk::AccessFlags2, vk::AccessFlags2) -> vk::BufferMemoryBarrier2<'static>,
    ) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if pending.is_write {
            let (src_stage, src_access) = write_barrier_source(self.current_write, self.current_read);
            aggregator.add_buffer_barrier(barrier_of(src_stage, pending.stage, src_access, pending.access));

            self.current_write = AccessState { stage: pending.stage, access: pending.access };
            self.current_write_order = pending.exe_order;
            self.current_read = AccessState::default();
            self.unavailable = ALL_READ_ACCESS;
        } else if self.unavailable.intersects(pending.access) {
            aggregator.add_buffer_barrier(barrier_of(
                self.current_write.stage,
                pending.stage,
                self.current_write.access,
                pending.access,
            ));
            self.unavailable &= !pending.access;
            self.current_read.stage |= pending.stage;
            self.current_read.access |= pending.access;
        } else {
            //parallel reader: no barrier needed, just accumulate.
            self.current_read.stage |= pending.stage;
            self.current_read.access |= pending.access;
        }
    }

    pub fn current_write_order(&self) -> u32 {
        self.current_write_order
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    ///On destruction, makes the last write visible to whatever reads/writes come after the
    ///buffer's memory is reused. Emits no barrier if nothing is outstanding.
    pub fn destroy_barrier(
        &mut self,
        aggregator: &mut BarrierAggregator,
        barrier_of: impl FnOnce(vk::PipelineStageFlags2, vk::PipelineStageFlags2, vk::AccessFlags2, vk::AccessFlags2) -> vk::BufferMemoryBarrier2<'static>,
    ) {
        if self.unavailable == vk::AccessFlags2::empty() {
            return;
        }
        let (src_stage, src_access) = write_barrier_source(self.current_write, self.current_read);
        aggregator.add_buffer_barrier(barrier_of(src_stage, vk::PipelineStageFlags2::BOTTOM_OF_PIPE, src_access, vk::AccessFlags2::empty()));
        self.unavailable = vk::AccessFlags2::empty();
    }
}

impl Default for BufferTracker {
    fn default() -> Self {
        Self::new()
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
    ) -> vk::BufferMemoryBarrier2<'static> {
        vk::BufferMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .dst_stage_mask(dst_stage)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
    }

    #[test]
    fn upload_then_sample_emits_single_barrier() {
        let mut tracker = BufferTracker::new();
        tracker.set_initial_state(vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty(), false);

        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            is_write: true,
            exe_order: 1,
            layout: None,
        });
        let mut agg = BarrierAggregator::new();
        tracker.commit_barrier(&mut agg, dummy_barrier);
        assert!(agg.get_barriers().unwrap().buffer_barriers.len() == 1);
        agg.clear_barriers();

        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::UNIFORM_READ,
            is_write: false,
            exe_order: 2,
            layout: None,
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        let pending = agg.get_barriers().unwrap();
        assert_eq!(pending.buffer_barriers.len(), 1);
        assert_eq!(pending.buffer_barriers[0].src_stage_mask, vk::PipelineStageFlags2::TRANSFER);
        assert_eq!(pending.buffer_barriers[0].dst_stage_mask, vk::PipelineStageFlags2::COMPUTE_SHADER);
        agg.clear_barriers();

        //second dispatch reading the same binding: parallel reader, no barrier
        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::UNIFORM_READ,
            is_write: false,
            exe_order: 3,
            layout: None,
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        assert!(agg.get_barriers().is_none());
    }

    #[test]
    fn committing_equal_pending_and_current_emits_no_barrier() {
        let mut tracker = BufferTracker::new();
        tracker.set_initial_state(vk::PipelineStageFlags2::VERTEX_SHADER, vk::AccessFlags2::SHADER_READ, false);
        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::VERTEX_SHADER,
            access: vk::AccessFlags2::SHADER_READ,
            is_write: false,
            exe_order: 1,
            layout: None,
        });
        let mut agg = BarrierAggregator::new();
        tracker.commit_barrier(&mut agg, dummy_barrier);
        assert!(agg.get_barriers().is_none());
    }

    #[test]
    fn destroy_after_write_emits_visibility_barrier() {
        let mut tracker = BufferTracker::new();
        let mut agg = BarrierAggregator::new();
        tracker.add_pending_state(Access {
            stage: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            is_write: true,
            exe_order: 1,
            layout: None,
        });
        tracker.commit_barrier(&mut agg, dummy_barrier);
        agg.clear_barriers();

        tracker.destroy_barrier(&mut agg, dummy_barrier);
        let pending = agg.get_barriers().unwrap();
        assert_eq!(pending.buffer_barriers.len(), 1);
        assert_eq!(pending.buffer_barriers[0].src_access_mask, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(pending.buffer_barriers[0].dst_access_mask, vk::AccessFlags2::empty());
    }

    #[test]
    fn destroy_with_no_outstanding_access_emits_nothing() {
        let mut tracker = BufferTracker::new();
        let mut agg = BarrierAggregator::new();
        tracker.destroy_barrier(&mut agg, dummy_barrier);
        assert!(agg.get_barriers().is_none());
    }
}

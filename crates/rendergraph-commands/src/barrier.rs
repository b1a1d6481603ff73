use marpii::ash::vk;
use smallvec::SmallVec;

///View into the barriers currently held by a [BarrierAggregator], ready to be submitted
///via `vkCmdPipelineBarrier2`/[ash::Device::cmd_pipeline_barrier2].
///
///Empty slices are valid, `is_empty()` tells you if there is anything to submit at all.
pub struct PendingBarriers<'a> {
    pub memory_barriers: &'a [vk::MemoryBarrier2<'a>],
    pub buffer_barriers: &'a [vk::BufferMemoryBarrier2<'a>],
    pub image_barriers: &'a [vk::ImageMemoryBarrier2<'a>],
}

impl<'a> PendingBarriers<'a> {
    pub fn is_empty(&self) -> bool {
        self.memory_barriers.is_empty() && self.buffer_barriers.is_empty() && self.image_barriers.is_empty()
    }

    pub fn dependency_info(&self) -> vk::DependencyInfo<'a> {
        vk::DependencyInfo::default()
            .memory_barriers(self.memory_barriers)
            .buffer_memory_barriers(self.buffer_barriers)
            .image_memory_barriers(self.image_barriers)
    }
}

///Accumulates pipeline barriers for a single command-buffer recording pass.
///
///Barriers are collected per resource (buffer/image) and an additional catch-all memory
///barrier accumulates any access-mask transitions that don't target a specific resource.
///`src`/`dst` stage masks are OR-accumulated across every barrier added, so the aggregator
///always tracks the widest pipeline stages touched since the last [Self::clear_barriers].
///
///Not `Send`/`Sync`: exactly one recording context owns an aggregator at a time.
pub struct BarrierAggregator {
    memory_barrier: vk::MemoryBarrier2<'static>,
    buffer_barriers: SmallVec<[vk::BufferMemoryBarrier2<'static>; 16]>,
    image_barriers: SmallVec<[vk::ImageMemoryBarrier2<'static>; 16]>,
}

impl BarrierAggregator {
    pub fn new() -> Self {
        BarrierAggregator {
            memory_barrier: vk::MemoryBarrier2::default(),
            buffer_barriers: SmallVec::new(),
            image_barriers: SmallVec::new(),
        }
    }

    ///Adds a barrier for a memory range that isn't tied to a single buffer or image, for
    ///instance a host-visible mapped range. Only the access masks are merged into the
    ///aggregator's catch-all memory barrier; stage masks are always accumulated.
    pub fn add_memory_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags2,
        dst_stage: vk::PipelineStageFlags2,
        src_access: vk::AccessFlags2,
        dst_access: vk::AccessFlags2,
    ) {
        self.memory_barrier.src_stage_mask |= src_stage;
        self.memory_barrier.dst_stage_mask |= dst_stage;
        self.memory_barrier.src_access_mask |= src_access;
        self.memory_barrier.dst_access_mask |= dst_access;
    }

    pub fn add_buffer_barrier(&mut self, barrier: vk::BufferMemoryBarrier2<'static>) {
        self.buffer_barriers.push(barrier);
    }

    pub fn add_image_barrier(&mut self, barrier: vk::ImageMemoryBarrier2<'static>) {
        self.image_barriers.push(barrier);
    }

    ///Returns `true` if there is at least one barrier pending (buffer, image, or a non-zero
    ///catch-all memory barrier).
    pub fn has_barriers(&self) -> bool {
        let mem_pending = self.memory_barrier.src_access_mask != vk::AccessFlags2::empty()
            || self.memory_barrier.dst_access_mask != vk::AccessFlags2::empty();
        mem_pending || !self.buffer_barriers.is_empty() || !self.image_barriers.is_empty()
    }

    ///Returns a view of the currently aggregated barriers, or `None` if nothing is pending.
    ///Does not clear the aggregator; call [Self::clear_barriers] once the batch has been
    ///recorded into a command buffer.
    pub fn get_barriers(&self) -> Option<PendingBarriers<'_>> {
        if !self.has_barriers() {
            return None;
        }

        let memory_barriers: &[vk::MemoryBarrier2<'static>] = if self.memory_barrier.src_access_mask
            != vk::AccessFlags2::empty()
            || self.memory_barrier.dst_access_mask != vk::AccessFlags2::empty()
        {
            std::slice::from_ref(&self.memory_barrier)
        } else {
            &[]
        };

        Some(PendingBarriers {
            memory_barriers,
            buffer_barriers: &self.buffer_barriers,
            image_barriers: &self.image_barriers,
        })
    }

    ///Resets the aggregator to an empty state. Must be called after submitting the barriers
    ///returned by [Self::get_barriers], otherwise the next pass would re-submit them.
    pub fn clear_barriers(&mut self) {
        self.memory_barrier.src_access_mask = vk::AccessFlags2::empty();
        self.memory_barrier.dst_access_mask = vk::AccessFlags2::empty();
        self.memory_barrier.src_stage_mask = vk::PipelineStageFlags2::empty();
        self.memory_barrier.dst_stage_mask = vk::PipelineStageFlags2::empty();
        self.buffer_barriers.clear();
        self.image_barriers.clear();
    }
}

impl Default for BarrierAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn empty_on_construction() {
        let agg = BarrierAggregator::new();
        assert!(agg.get_barriers().is_none());
    }

    #[test]
    fn accumulates_and_clears() {
        let mut agg = BarrierAggregator::new();
        agg.add_memory_barrier(
            vk::PipelineStageFlags2::TRANSFER,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::AccessFlags2::SHADER_READ,
        );
        assert!(agg.get_barriers().unwrap().memory_barriers.len() == 1);

        agg.clear_barriers();
        assert!(agg.get_barriers().is_none());
    }

    #[test]
    fn buffer_and_image_barriers_are_independent_of_memory_barrier() {
        let mut agg = BarrierAggregator::new();
        agg.add_buffer_barrier(vk::BufferMemoryBarrier2::default());
        let pending = agg.get_barriers().unwrap();
        assert_eq!(pending.buffer_barriers.len(), 1);
        assert!(pending.memory_barriers.is_empty());
    }

    assert_impl_all!(BarrierAggregator: Send);
}

use marpii::ash::vk;

use crate::resources::{BufferHandle, Resources};
use crate::track::Access;

use super::{Backend, Context, ResourceSync, TransferRecorder};

///Adds pipeline binding, dispatch, and push-constant recording on top of [TransferRecorder]
///(the compute catalogue is a superset of the transfer catalogue).
pub trait ComputeRecorder: TransferRecorder {
    fn bind_compute_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet);
    fn push_constant(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]);
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_base(&mut self, base_x: u32, base_y: u32, base_z: u32, x: u32, y: u32, z: u32);
    fn dispatch_indirect(&mut self, resources: &mut Resources, args: BufferHandle, offset: u64);
}

impl<B: Backend, S: ResourceSync> ComputeRecorder for Context<B, S> {
    fn bind_compute_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.backend.bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline);
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet) {
        self.backend.bind_descriptor_set(vk::PipelineBindPoint::COMPUTE, layout, first_set, set);
    }

    fn push_constant(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        self.backend.push_constant(layout, stages, offset, data);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.backend.dispatch(x, y, z);
    }

    fn dispatch_base(&mut self, base_x: u32, base_y: u32, base_z: u32, x: u32, y: u32, z: u32) {
        self.backend.dispatch_base(base_x, base_y, base_z, x, y, z);
    }

    fn dispatch_indirect(&mut self, resources: &mut Resources, args: BufferHandle, offset: u64) {
        let order = self.next_exe_order();
        let access = Access {
            stage: vk::PipelineStageFlags2::DRAW_INDIRECT,
            access: vk::AccessFlags2::INDIRECT_COMMAND_READ,
            is_write: false,
            exe_order: order,
            layout: None,
        };
        self.sync_buffer(resources, args, Some((offset, offset + 12)), access);
        let Some(native) = resources.buffer_native(args) else { return };
        self.backend.dispatch_indirect(native, offset);
    }
}

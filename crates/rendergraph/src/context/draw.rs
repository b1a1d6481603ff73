use marpii::ash::vk;

use super::{DrawBackend, DrawContext};

///The draw tier's recording API. A disjoint catalogue from transfer/compute/graphics
///, with its own context type since nothing about draw state composes with the
///other tiers' barrier bookkeeping.
pub trait DrawRecorder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType);
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]);
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32);
    fn draw_indirect(&mut self, buffer: vk::Buffer, offset: u64, draw_count: u32, stride: u32);
}

impl<B: DrawBackend> DrawRecorder for DrawContext<B> {
    ///Elides the bind if the same pipeline is already bound, mirroring the redundant-bind
    ///skip in [crate::encode::execute_draw].
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        if self.bound_pipeline == Some(pipeline) {
            return;
        }
        self.backend.bind_pipeline(pipeline);
        self.bound_pipeline = Some(pipeline);
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType) {
        if self.bound_index_buffer == Some((buffer, offset)) {
            return;
        }
        self.backend.bind_index_buffer(buffer, offset, index_type);
        self.bound_index_buffer = Some((buffer, offset));
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]) {
        self.backend.bind_vertex_buffers(first_binding, buffers, offsets);
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.backend.draw(vertex_count, instance_count, first_vertex, first_instance);
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        self.backend.draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance);
    }

    fn draw_indirect(&mut self, buffer: vk::Buffer, offset: u64, draw_count: u32, stride: u32) {
        self.backend.draw_indirect(buffer, offset, draw_count, stride);
    }
}

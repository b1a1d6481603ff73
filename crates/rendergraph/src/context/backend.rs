use marpii::{ash::vk, context::Device};
use rendergraph_commands::PendingBarriers;

use crate::encode::{catalogue, CommandEncoder};

///The non-draw tiers' (transfer/compute/graphics) native operations, implemented once for
///a direct backend (issues `vkCmd*` immediately) and once for an indirect backend (encodes
///a baked command record). A `Context` is generic over this trait so the recording API
///itself never branches on backend.
pub trait Backend {
    fn clear_color_image(&mut self, image: vk::Image, layout: vk::ImageLayout, color: vk::ClearColorValue, range: vk::ImageSubresourceRange);
    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: u64, size: u64, data: u32);
    fn update_buffer(&mut self, buffer: vk::Buffer, offset: u64, data: &[u8]);
    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy);
    fn debug_marker(&mut self, name: &str, color: [f32; 4]);
    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);
    fn bind_descriptor_set(&mut self, bind_point: vk::PipelineBindPoint, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet);
    fn push_constant(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]);
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_indirect(&mut self, buffer: vk::Buffer, offset: u64);
    fn dispatch_base(&mut self, base_x: u32, base_y: u32, base_z: u32, x: u32, y: u32, z: u32);
    fn clear_depth_stencil_image(&mut self, image: vk::Image, layout: vk::ImageLayout, value: vk::ClearDepthStencilValue, range: vk::ImageSubresourceRange);
    fn copy_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageCopy);
    fn copy_buffer_to_image(&mut self, buffer: vk::Buffer, image: vk::Image, layout: vk::ImageLayout, region: vk::BufferImageCopy);
    fn copy_image_to_buffer(&mut self, image: vk::Image, layout: vk::ImageLayout, buffer: vk::Buffer, region: vk::BufferImageCopy);
    fn begin_debug_label(&mut self, name: &str, color: [f32; 4]);
    fn end_debug_label(&mut self);
    fn blit_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageBlit, filter: vk::Filter);
    fn resolve_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageResolve);
    ///Flushes accumulated barriers. `device` is only used by the direct backend; the
    ///indirect backend just encodes a pipeline-barrier record for later replay.
    fn pipeline_barrier(&mut self, device: &Device, pending: &PendingBarriers<'_>);
}

///Draw-tier native operations. Kept as a separate trait since the draw family is a
///disjoint command catalogue, not a superset of transfer/compute/graphics.
pub trait DrawBackend {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType);
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]);
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32);
    fn draw_indirect(&mut self, buffer: vk::Buffer, offset: u64, draw_count: u32, stride: u32);
}

///Writes straight to a native secondary command buffer.
pub struct Direct {
    pub device: std::sync::Arc<Device>,
    pub command_buffer: vk::CommandBuffer,
}

impl Backend for Direct {
    fn clear_color_image(&mut self, image: vk::Image, layout: vk::ImageLayout, color: vk::ClearColorValue, range: vk::ImageSubresourceRange) {
        unsafe {
            self.device.inner.cmd_clear_color_image(self.command_buffer, image, layout, &color, core::slice::from_ref(&range));
        }
    }

    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: u64, size: u64, data: u32) {
        unsafe { self.device.inner.cmd_fill_buffer(self.command_buffer, buffer, offset, size, data) };
    }

    fn update_buffer(&mut self, buffer: vk::Buffer, offset: u64, data: &[u8]) {
        unsafe { self.device.inner.cmd_update_buffer(self.command_buffer, buffer, offset, data) };
    }

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy) {
        unsafe { self.device.inner.cmd_copy_buffer(self.command_buffer, src, dst, core::slice::from_ref(&region)) };
    }

    fn debug_marker(&mut self, _name: &str, _color: [f32; 4]) {
        #[cfg(feature = "debug_marker")]
        {
            //left for the device-debug-utils extension to fill in; the core only decides
            //*when* a marker is emitted, not the extension dispatch.
        }
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.inner.cmd_bind_pipeline(self.command_buffer, bind_point, pipeline) };
    }

    fn bind_descriptor_set(&mut self, bind_point: vk::PipelineBindPoint, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet) {
        unsafe {
            self.device
                .inner
                .cmd_bind_descriptor_sets(self.command_buffer, bind_point, layout, first_set, core::slice::from_ref(&set), &[]);
        }
    }

    fn push_constant(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe { self.device.inner.cmd_push_constants(self.command_buffer, layout, stages, offset, data) };
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.device.inner.cmd_dispatch(self.command_buffer, x, y, z) };
    }

    fn dispatch_indirect(&mut self, buffer: vk::Buffer, offset: u64) {
        unsafe { self.device.inner.cmd_dispatch_indirect(self.command_buffer, buffer, offset) };
    }

    fn dispatch_base(&mut self, base_x: u32, base_y: u32, base_z: u32, x: u32, y: u32, z: u32) {
        unsafe { self.device.inner.cmd_dispatch_base(self.command_buffer, base_x, base_y, base_z, x, y, z) };
    }

    fn clear_depth_stencil_image(&mut self, image: vk::Image, layout: vk::ImageLayout, value: vk::ClearDepthStencilValue, range: vk::ImageSubresourceRange) {
        unsafe {
            self.device
                .inner
                .cmd_clear_depth_stencil_image(self.command_buffer, image, layout, &value, core::slice::from_ref(&range));
        }
    }

    fn copy_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageCopy) {
        unsafe {
            self.device
                .inner
                .cmd_copy_image(self.command_buffer, src, src_layout, dst, dst_layout, core::slice::from_ref(&region));
        }
    }

    fn copy_buffer_to_image(&mut self, buffer: vk::Buffer, image: vk::Image, layout: vk::ImageLayout, region: vk::BufferImageCopy) {
        unsafe {
            self.device
                .inner
                .cmd_copy_buffer_to_image(self.command_buffer, buffer, image, layout, core::slice::from_ref(&region));
        }
    }

    fn copy_image_to_buffer(&mut self, image: vk::Image, layout: vk::ImageLayout, buffer: vk::Buffer, region: vk::BufferImageCopy) {
        unsafe {
            self.device
                .inner
                .cmd_copy_image_to_buffer(self.command_buffer, image, layout, buffer, core::slice::from_ref(&region));
        }
    }

    fn begin_debug_label(&mut self, _name: &str, _color: [f32; 4]) {
        #[cfg(feature = "debug_marker")]
        {
            //left for the device-debug-utils extension to fill in; the core only decides
            //*when* a label is pushed, not the extension dispatch.
        }
    }

    fn end_debug_label(&mut self) {
        #[cfg(feature = "debug_marker")]
        {
            //paired with begin_debug_label; same extension gap.
        }
    }

    fn blit_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageBlit, filter: vk::Filter) {
        unsafe {
            self.device
                .inner
                .cmd_blit_image(self.command_buffer, src, src_layout, dst, dst_layout, core::slice::from_ref(&region), filter);
        }
    }

    fn resolve_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageResolve) {
        unsafe {
            self.device
                .inner
                .cmd_resolve_image(self.command_buffer, src, src_layout, dst, dst_layout, core::slice::from_ref(&region));
        }
    }

    fn pipeline_barrier(&mut self, device: &Device, pending: &PendingBarriers<'_>) {
        unsafe { device.inner.cmd_pipeline_barrier2(self.command_buffer, &pending.dependency_info()) };
    }
}

impl DrawBackend for Direct {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .inner
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType) {
        unsafe { self.device.inner.cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type) };
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]) {
        unsafe {
            self.device
                .inner
                .cmd_bind_vertex_buffers(self.command_buffer, first_binding, buffers, offsets)
        };
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device
                .inner
                .cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance)
        };
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        unsafe {
            self.device
                .inner
                .cmd_draw_indexed(self.command_buffer, index_count, instance_count, first_index, vertex_offset, first_instance)
        };
    }

    fn draw_indirect(&mut self, buffer: vk::Buffer, offset: u64, draw_count: u32, stride: u32) {
        unsafe { self.device.inner.cmd_draw_indirect(self.command_buffer, buffer, offset, draw_count, stride) };
    }
}

///Encodes into a baked-command arena for later replay.
pub struct Indirect {
    pub encoder: CommandEncoder,
}

impl Indirect {
    pub fn new(block_size: usize) -> Self {
        Indirect { encoder: CommandEncoder::new(block_size) }
    }
}

impl Backend for Indirect {
    fn clear_color_image(&mut self, image: vk::Image, layout: vk::ImageLayout, color: vk::ClearColorValue, range: vk::ImageSubresourceRange) {
        catalogue::encode_clear_color_image(&mut self.encoder, image, layout, color, range);
    }

    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: u64, size: u64, data: u32) {
        catalogue::encode_fill_buffer(&mut self.encoder, buffer, offset, size, data);
    }

    fn update_buffer(&mut self, buffer: vk::Buffer, offset: u64, data: &[u8]) {
        catalogue::encode_update_buffer(&mut self.encoder, buffer, offset, data);
    }

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy) {
        catalogue::encode_copy_buffer(&mut self.encoder, src, dst, region);
    }

    fn debug_marker(&mut self, name: &str, color: [f32; 4]) {
        catalogue::encode_debug_marker(&mut self.encoder, color, name);
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        catalogue::encode_bind_pipeline(&mut self.encoder, pipeline, bind_point);
    }

    fn bind_descriptor_set(&mut self, bind_point: vk::PipelineBindPoint, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet) {
        catalogue::encode_bind_descriptor_set(&mut self.encoder, layout, bind_point, first_set, set);
    }

    fn push_constant(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        catalogue::encode_push_constant(&mut self.encoder, layout, stages, offset, data);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        catalogue::encode_dispatch(&mut self.encoder, x, y, z);
    }

    fn dispatch_indirect(&mut self, buffer: vk::Buffer, offset: u64) {
        catalogue::encode_dispatch_indirect(&mut self.encoder, buffer, offset);
    }

    fn dispatch_base(&mut self, base_x: u32, base_y: u32, base_z: u32, x: u32, y: u32, z: u32) {
        catalogue::encode_dispatch_base(&mut self.encoder, base_x, base_y, base_z, x, y, z);
    }

    fn clear_depth_stencil_image(&mut self, image: vk::Image, layout: vk::ImageLayout, value: vk::ClearDepthStencilValue, range: vk::ImageSubresourceRange) {
        catalogue::encode_clear_depth_stencil_image(&mut self.encoder, image, layout, value, range);
    }

    fn copy_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageCopy) {
        catalogue::encode_copy_image(&mut self.encoder, src, src_layout, dst, dst_layout, region);
    }

    fn copy_buffer_to_image(&mut self, buffer: vk::Buffer, image: vk::Image, layout: vk::ImageLayout, region: vk::BufferImageCopy) {
        catalogue::encode_copy_buffer_to_image(&mut self.encoder, buffer, image, layout, region);
    }

    fn copy_image_to_buffer(&mut self, image: vk::Image, layout: vk::ImageLayout, buffer: vk::Buffer, region: vk::BufferImageCopy) {
        catalogue::encode_copy_image_to_buffer(&mut self.encoder, image, layout, buffer, region);
    }

    fn begin_debug_label(&mut self, name: &str, color: [f32; 4]) {
        catalogue::encode_begin_debug_label(&mut self.encoder, color, name);
    }

    fn end_debug_label(&mut self) {
        catalogue::encode_end_debug_label(&mut self.encoder);
    }

    fn blit_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageBlit, filter: vk::Filter) {
        catalogue::encode_blit_image(&mut self.encoder, src, src_layout, dst, dst_layout, region, filter);
    }

    fn resolve_image(&mut self, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageResolve) {
        catalogue::encode_resolve_image(&mut self.encoder, src, src_layout, dst, dst_layout, region);
    }

    fn pipeline_barrier(&mut self, _device: &Device, pending: &PendingBarriers<'_>) {
        if pending.buffer_barriers.is_empty() {
            #[cfg(feature = "logging")]
            if !pending.image_barriers.is_empty() || !pending.memory_barriers.is_empty() {
                log::trace!("indirect backend dropped a non-buffer barrier; not yet representable in the baked catalogue");
            }
            return;
        }
        let records: smallvec::SmallVec<[catalogue::BufferBarrierRecord; 8]> = pending
            .buffer_barriers
            .iter()
            .map(|b| catalogue::BufferBarrierRecord {
                buffer: b.buffer,
                src_stage: b.src_stage_mask,
                dst_stage: b.dst_stage_mask,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
                offset: b.offset,
                size: b.size,
            })
            .collect();
        catalogue::encode_pipeline_barrier(&mut self.encoder, &records);
    }
}

impl DrawBackend for Indirect {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        catalogue::encode_draw_bind_pipeline(&mut self.encoder, pipeline);
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType) {
        catalogue::encode_bind_index_buffer(&mut self.encoder, buffer, offset, index_type);
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]) {
        catalogue::encode_bind_vertex_buffers(&mut self.encoder, first_binding, buffers, offsets);
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        catalogue::encode_draw(&mut self.encoder, vertex_count, instance_count, first_vertex, first_instance);
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        catalogue::encode_draw_indexed(&mut self.encoder, index_count, instance_count, first_index, vertex_offset, first_instance);
    }

    fn draw_indirect(&mut self, buffer: vk::Buffer, offset: u64, draw_count: u32, stride: u32) {
        catalogue::encode_draw_indirect(&mut self.encoder, buffer, offset, draw_count, stride);
    }
}

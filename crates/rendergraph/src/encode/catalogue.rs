//! Typed command records. The transfer catalogue is a prefix of the compute catalogue,
//! which is a prefix of the graphics catalogue (merged leaves-to-root, per the design
//! notes); the draw family is disjoint and keeps its own id space.

use marpii::ash::vk;

use super::arena::{align_up, CommandEncoder, HEADER_SIZE};

pub mod ids {
    pub const END: u16 = 0;
    pub const CLEAR_COLOR_IMAGE: u16 = 1;
    pub const FILL_BUFFER: u16 = 2;
    pub const UPDATE_BUFFER: u16 = 3;
    pub const COPY_BUFFER: u16 = 4;
    pub const PIPELINE_BARRIER: u16 = 5;
    pub const DEBUG_MARKER: u16 = 6;

    pub const BIND_PIPELINE: u16 = 7;
    pub const BIND_DESCRIPTOR_SET: u16 = 8;
    pub const PUSH_CONSTANT: u16 = 9;
    pub const DISPATCH: u16 = 10;
    pub const DISPATCH_INDIRECT: u16 = 11;

    pub const BLIT_IMAGE: u16 = 12;
    pub const RESOLVE_IMAGE: u16 = 13;

    pub const CLEAR_DEPTH_STENCIL_IMAGE: u16 = 14;
    pub const COPY_IMAGE: u16 = 15;
    pub const COPY_BUFFER_TO_IMAGE: u16 = 16;
    pub const COPY_IMAGE_TO_BUFFER: u16 = 17;
    pub const BEGIN_DEBUG_LABEL: u16 = 18;
    pub const END_DEBUG_LABEL: u16 = 19;

    pub const DISPATCH_BASE: u16 = 20;
}

pub mod draw_ids {
    pub const END: u16 = 0;
    pub const BIND_PIPELINE: u16 = 1;
    pub const BIND_INDEX_BUFFER: u16 = 2;
    pub const BIND_VERTEX_BUFFERS: u16 = 3;
    pub const DRAW: u16 = 4;
    pub const DRAW_INDEXED: u16 = 5;
    pub const DRAW_INDIRECT: u16 = 6;
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ClearColorImagePayload {
    pub image: vk::Image,
    pub layout: vk::ImageLayout,
    pub color: vk::ClearColorValue,
    pub range: vk::ImageSubresourceRange,
}

pub fn encode_clear_color_image(enc: &mut CommandEncoder, image: vk::Image, layout: vk::ImageLayout, color: vk::ClearColorValue, range: vk::ImageSubresourceRange) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<ClearColorImagePayload>();
    let ptr = enc.alloc_record(ids::CLEAR_COLOR_IMAGE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut ClearColorImagePayload).write(ClearColorImagePayload { image, layout, color, range });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FillBufferPayload {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub size: u64,
    pub data: u32,
}

pub fn encode_fill_buffer(enc: &mut CommandEncoder, buffer: vk::Buffer, offset: u64, size: u64, data: u32) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<FillBufferPayload>();
    let ptr = enc.alloc_record(ids::FILL_BUFFER, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut FillBufferPayload).write(FillBufferPayload { buffer, offset, size, data });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct UpdateBufferPayload {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub data_len: u32,
}

///`data` trails the fixed payload as a raw byte array.
pub fn encode_update_buffer(enc: &mut CommandEncoder, buffer: vk::Buffer, offset: u64, data: &[u8]) {
    let fixed = HEADER_SIZE + core::mem::size_of::<UpdateBufferPayload>();
    let total = fixed + data.len();
    let ptr = enc.alloc_record(ids::UPDATE_BUFFER, total);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut UpdateBufferPayload).write(UpdateBufferPayload {
            buffer,
            offset,
            data_len: data.len() as u32,
        });
        core::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(fixed), data.len());
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CopyBufferPayload {
    pub src: vk::Buffer,
    pub dst: vk::Buffer,
    pub region: vk::BufferCopy,
}

pub fn encode_copy_buffer(enc: &mut CommandEncoder, src: vk::Buffer, dst: vk::Buffer, region: vk::BufferCopy) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<CopyBufferPayload>();
    let ptr = enc.alloc_record(ids::COPY_BUFFER, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut CopyBufferPayload).write(CopyBufferPayload { src, dst, region });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct BufferBarrierRecord {
    pub buffer: vk::Buffer,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub offset: u64,
    pub size: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct PipelineBarrierPayload {
    pub buffer_barrier_count: u32,
}

///`barriers` trails the fixed payload as a `BufferBarrierRecord` array, aligned to its own
///natural alignment within the padded record.
pub fn encode_pipeline_barrier(enc: &mut CommandEncoder, barriers: &[BufferBarrierRecord]) {
    let fixed = HEADER_SIZE + core::mem::size_of::<PipelineBarrierPayload>();
    let array_offset = align_up(fixed, core::mem::align_of::<BufferBarrierRecord>());
    let total = array_offset + barriers.len() * core::mem::size_of::<BufferBarrierRecord>();
    let ptr = enc.alloc_record(ids::PIPELINE_BARRIER, total);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut PipelineBarrierPayload).write(PipelineBarrierPayload {
            buffer_barrier_count: barriers.len() as u32,
        });
        let arr = ptr.add(array_offset) as *mut BufferBarrierRecord;
        for (i, b) in barriers.iter().enumerate() {
            arr.add(i).write(*b);
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DebugMarkerPayload {
    pub color: [f32; 4],
    pub name_len: u32,
}

pub fn encode_debug_marker(enc: &mut CommandEncoder, color: [f32; 4], name: &str) {
    let fixed = HEADER_SIZE + core::mem::size_of::<DebugMarkerPayload>();
    let total = fixed + name.len();
    let ptr = enc.alloc_record(ids::DEBUG_MARKER, total);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DebugMarkerPayload).write(DebugMarkerPayload { color, name_len: name.len() as u32 });
        core::ptr::copy_nonoverlapping(name.as_bytes().as_ptr(), ptr.add(fixed), name.len());
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ClearDepthStencilImagePayload {
    pub image: vk::Image,
    pub layout: vk::ImageLayout,
    pub value: vk::ClearDepthStencilValue,
    pub range: vk::ImageSubresourceRange,
}

pub fn encode_clear_depth_stencil_image(enc: &mut CommandEncoder, image: vk::Image, layout: vk::ImageLayout, value: vk::ClearDepthStencilValue, range: vk::ImageSubresourceRange) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<ClearDepthStencilImagePayload>();
    let ptr = enc.alloc_record(ids::CLEAR_DEPTH_STENCIL_IMAGE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut ClearDepthStencilImagePayload).write(ClearDepthStencilImagePayload { image, layout, value, range });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CopyImagePayload {
    pub src: vk::Image,
    pub src_layout: vk::ImageLayout,
    pub dst: vk::Image,
    pub dst_layout: vk::ImageLayout,
    pub region: vk::ImageCopy,
}

pub fn encode_copy_image(enc: &mut CommandEncoder, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageCopy) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<CopyImagePayload>();
    let ptr = enc.alloc_record(ids::COPY_IMAGE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut CopyImagePayload).write(CopyImagePayload { src, src_layout, dst, dst_layout, region });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CopyBufferToImagePayload {
    pub buffer: vk::Buffer,
    pub image: vk::Image,
    pub layout: vk::ImageLayout,
    pub region: vk::BufferImageCopy,
}

pub fn encode_copy_buffer_to_image(enc: &mut CommandEncoder, buffer: vk::Buffer, image: vk::Image, layout: vk::ImageLayout, region: vk::BufferImageCopy) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<CopyBufferToImagePayload>();
    let ptr = enc.alloc_record(ids::COPY_BUFFER_TO_IMAGE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut CopyBufferToImagePayload).write(CopyBufferToImagePayload { buffer, image, layout, region });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CopyImageToBufferPayload {
    pub image: vk::Image,
    pub layout: vk::ImageLayout,
    pub buffer: vk::Buffer,
    pub region: vk::BufferImageCopy,
}

pub fn encode_copy_image_to_buffer(enc: &mut CommandEncoder, image: vk::Image, layout: vk::ImageLayout, buffer: vk::Buffer, region: vk::BufferImageCopy) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<CopyImageToBufferPayload>();
    let ptr = enc.alloc_record(ids::COPY_IMAGE_TO_BUFFER, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut CopyImageToBufferPayload).write(CopyImageToBufferPayload { image, layout, buffer, region });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DebugLabelPayload {
    pub color: [f32; 4],
    pub name_len: u32,
}

///A debug-group open, as opposed to [encode_debug_marker]'s point annotation. `name` trails
///the fixed payload the same way [encode_debug_marker]'s does.
pub fn encode_begin_debug_label(enc: &mut CommandEncoder, color: [f32; 4], name: &str) {
    let fixed = HEADER_SIZE + core::mem::size_of::<DebugLabelPayload>();
    let total = fixed + name.len();
    let ptr = enc.alloc_record(ids::BEGIN_DEBUG_LABEL, total);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DebugLabelPayload).write(DebugLabelPayload { color, name_len: name.len() as u32 });
        core::ptr::copy_nonoverlapping(name.as_bytes().as_ptr(), ptr.add(fixed), name.len());
    }
}

pub fn encode_end_debug_label(enc: &mut CommandEncoder) {
    enc.alloc_record(ids::END_DEBUG_LABEL, HEADER_SIZE);
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct BindPipelinePayload {
    pub pipeline: vk::Pipeline,
    pub bind_point: vk::PipelineBindPoint,
}

pub fn encode_bind_pipeline(enc: &mut CommandEncoder, pipeline: vk::Pipeline, bind_point: vk::PipelineBindPoint) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<BindPipelinePayload>();
    let ptr = enc.alloc_record(ids::BIND_PIPELINE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut BindPipelinePayload).write(BindPipelinePayload { pipeline, bind_point });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct BindDescriptorSetPayload {
    pub pipeline_layout: vk::PipelineLayout,
    pub bind_point: vk::PipelineBindPoint,
    pub first_set: u32,
    pub descriptor_set: vk::DescriptorSet,
}

pub fn encode_bind_descriptor_set(enc: &mut CommandEncoder, pipeline_layout: vk::PipelineLayout, bind_point: vk::PipelineBindPoint, first_set: u32, descriptor_set: vk::DescriptorSet) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<BindDescriptorSetPayload>();
    let ptr = enc.alloc_record(ids::BIND_DESCRIPTOR_SET, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut BindDescriptorSetPayload).write(BindDescriptorSetPayload { pipeline_layout, bind_point, first_set, descriptor_set });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct PushConstantPayload {
    pub pipeline_layout: vk::PipelineLayout,
    pub stage_flags: vk::ShaderStageFlags,
    pub offset: u32,
    pub data_len: u32,
}

pub fn encode_push_constant(enc: &mut CommandEncoder, pipeline_layout: vk::PipelineLayout, stage_flags: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
    let fixed = HEADER_SIZE + core::mem::size_of::<PushConstantPayload>();
    let total = fixed + data.len();
    let ptr = enc.alloc_record(ids::PUSH_CONSTANT, total);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut PushConstantPayload).write(PushConstantPayload {
            pipeline_layout,
            stage_flags,
            offset,
            data_len: data.len() as u32,
        });
        core::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(fixed), data.len());
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DispatchPayload {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

pub fn encode_dispatch(enc: &mut CommandEncoder, x: u32, y: u32, z: u32) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DispatchPayload>();
    let ptr = enc.alloc_record(ids::DISPATCH, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DispatchPayload).write(DispatchPayload { x, y, z });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DispatchIndirectPayload {
    pub buffer: vk::Buffer,
    pub offset: u64,
}

pub fn encode_dispatch_indirect(enc: &mut CommandEncoder, buffer: vk::Buffer, offset: u64) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DispatchIndirectPayload>();
    let ptr = enc.alloc_record(ids::DISPATCH_INDIRECT, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DispatchIndirectPayload).write(DispatchIndirectPayload { buffer, offset });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DispatchBasePayload {
    pub base_x: u32,
    pub base_y: u32,
    pub base_z: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

pub fn encode_dispatch_base(enc: &mut CommandEncoder, base_x: u32, base_y: u32, base_z: u32, x: u32, y: u32, z: u32) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DispatchBasePayload>();
    let ptr = enc.alloc_record(ids::DISPATCH_BASE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DispatchBasePayload).write(DispatchBasePayload { base_x, base_y, base_z, x, y, z });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct BlitImagePayload {
    pub src: vk::Image,
    pub src_layout: vk::ImageLayout,
    pub dst: vk::Image,
    pub dst_layout: vk::ImageLayout,
    pub region: vk::ImageBlit,
    pub filter: vk::Filter,
}

pub fn encode_blit_image(enc: &mut CommandEncoder, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageBlit, filter: vk::Filter) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<BlitImagePayload>();
    let ptr = enc.alloc_record(ids::BLIT_IMAGE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut BlitImagePayload).write(BlitImagePayload { src, src_layout, dst, dst_layout, region, filter });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ResolveImagePayload {
    pub src: vk::Image,
    pub src_layout: vk::ImageLayout,
    pub dst: vk::Image,
    pub dst_layout: vk::ImageLayout,
    pub region: vk::ImageResolve,
}

pub fn encode_resolve_image(enc: &mut CommandEncoder, src: vk::Image, src_layout: vk::ImageLayout, dst: vk::Image, dst_layout: vk::ImageLayout, region: vk::ImageResolve) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<ResolveImagePayload>();
    let ptr = enc.alloc_record(ids::RESOLVE_IMAGE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut ResolveImagePayload).write(ResolveImagePayload { src, src_layout, dst, dst_layout, region });
    }
}

pub fn encode_end(enc: &mut CommandEncoder) {
    enc.alloc_record(ids::END, HEADER_SIZE);
}

// --- Draw tier: a disjoint catalogue, own id space. ---

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DrawBindPipelinePayload {
    pub pipeline: vk::Pipeline,
}

pub fn encode_draw_bind_pipeline(enc: &mut CommandEncoder, pipeline: vk::Pipeline) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DrawBindPipelinePayload>();
    let ptr = enc.alloc_record(draw_ids::BIND_PIPELINE, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DrawBindPipelinePayload).write(DrawBindPipelinePayload { pipeline });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct BindIndexBufferPayload {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub index_type: vk::IndexType,
}

pub fn encode_bind_index_buffer(enc: &mut CommandEncoder, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<BindIndexBufferPayload>();
    let ptr = enc.alloc_record(draw_ids::BIND_INDEX_BUFFER, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut BindIndexBufferPayload).write(BindIndexBufferPayload { buffer, offset, index_type });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct BindVertexBuffersPayload {
    pub first_binding: u32,
    pub count: u32,
}

///Two parallel trailing arrays (`vk::Buffer` then `u64` offsets), each aligned to its own
///element type within the padded record.
pub fn encode_bind_vertex_buffers(enc: &mut CommandEncoder, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]) {
    debug_assert_eq!(buffers.len(), offsets.len());
    let fixed = HEADER_SIZE + core::mem::size_of::<BindVertexBuffersPayload>();
    let buffers_offset = align_up(fixed, core::mem::align_of::<vk::Buffer>());
    let buffers_bytes = buffers.len() * core::mem::size_of::<vk::Buffer>();
    let offsets_offset = align_up(buffers_offset + buffers_bytes, core::mem::align_of::<u64>());
    let total = offsets_offset + offsets.len() * core::mem::size_of::<u64>();

    let ptr = enc.alloc_record(draw_ids::BIND_VERTEX_BUFFERS, total);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut BindVertexBuffersPayload).write(BindVertexBuffersPayload {
            first_binding,
            count: buffers.len() as u32,
        });
        let buf_arr = ptr.add(buffers_offset) as *mut vk::Buffer;
        for (i, b) in buffers.iter().enumerate() {
            buf_arr.add(i).write(*b);
        }
        let off_arr = ptr.add(offsets_offset) as *mut u64;
        for (i, o) in offsets.iter().enumerate() {
            off_arr.add(i).write(*o);
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DrawIndexedPayload {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

pub fn encode_draw_indexed(enc: &mut CommandEncoder, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DrawIndexedPayload>();
    let ptr = enc.alloc_record(draw_ids::DRAW_INDEXED, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DrawIndexedPayload).write(DrawIndexedPayload {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DrawPayload {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

pub fn encode_draw(enc: &mut CommandEncoder, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DrawPayload>();
    let ptr = enc.alloc_record(draw_ids::DRAW, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DrawPayload).write(DrawPayload { vertex_count, instance_count, first_vertex, first_instance });
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DrawIndirectPayload {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub draw_count: u32,
    pub stride: u32,
}

pub fn encode_draw_indirect(enc: &mut CommandEncoder, buffer: vk::Buffer, offset: u64, draw_count: u32, stride: u32) {
    let payload_size = HEADER_SIZE + core::mem::size_of::<DrawIndirectPayload>();
    let ptr = enc.alloc_record(draw_ids::DRAW_INDIRECT, payload_size);
    unsafe {
        (ptr.add(HEADER_SIZE) as *mut DrawIndirectPayload).write(DrawIndirectPayload { buffer, offset, draw_count, stride });
    }
}

pub fn encode_draw_end(enc: &mut CommandEncoder) {
    enc.alloc_record(draw_ids::END, HEADER_SIZE);
}

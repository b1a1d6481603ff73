use marpii::{ash::vk, context::Device};

use super::{
    arena::{align_up, CommandHeader, HEADER_SIZE},
    catalogue::{draw_ids, ids, *},
};

fn read_header(buffer: &[u8], cursor: usize) -> CommandHeader {
    debug_assert!(cursor + HEADER_SIZE <= buffer.len(), "cursor ran past the end of the baked buffer");
    unsafe { *(buffer.as_ptr().add(cursor) as *const CommandHeader) }
}

unsafe fn payload<T: Copy>(buffer: &[u8], cursor: usize) -> T {
    *(buffer.as_ptr().add(cursor + HEADER_SIZE) as *const T)
}

unsafe fn trailing_slice<T: Copy>(buffer: &[u8], offset: usize, len: usize) -> &[T] {
    core::slice::from_raw_parts(buffer.as_ptr().add(offset) as *const T, len)
}

///Replays transfer-tier commands. Stops on `End` or once the cursor runs past the buffer.
pub fn execute_transfer(device: &Device, cmd: vk::CommandBuffer, buffer: &[u8]) {
    let mut cursor = 0usize;
    while cursor < buffer.len() {
        let header = read_header(buffer, cursor);
        if header.command_id == ids::END {
            break;
        }
        dispatch_transfer(device, cmd, header, buffer, cursor);
        cursor += header.size_in_bytes as usize;
    }
}

///Replays compute-tier commands: the compute catalogue is transfer's catalogue plus
///compute-only ids, so unrecognised transfer ids fall through to [dispatch_transfer].
pub fn execute_compute(device: &Device, cmd: vk::CommandBuffer, buffer: &[u8]) {
    let mut cursor = 0usize;
    while cursor < buffer.len() {
        let header = read_header(buffer, cursor);
        if header.command_id == ids::END {
            break;
        }
        if !dispatch_compute(device, cmd, header, buffer, cursor) {
            dispatch_transfer(device, cmd, header, buffer, cursor);
        }
        cursor += header.size_in_bytes as usize;
    }
}

///Replays graphics-tier commands: compute's catalogue plus blit/resolve.
pub fn execute_graphics(device: &Device, cmd: vk::CommandBuffer, buffer: &[u8]) {
    let mut cursor = 0usize;
    while cursor < buffer.len() {
        let header = read_header(buffer, cursor);
        if header.command_id == ids::END {
            break;
        }
        match header.command_id {
            ids::BLIT_IMAGE => {
                let p: BlitImagePayload = unsafe { payload(buffer, cursor) };
                unsafe {
                    device
                        .inner
                        .cmd_blit_image(cmd, p.src, p.src_layout, p.dst, p.dst_layout, core::slice::from_ref(&p.region), p.filter);
                }
            }
            ids::RESOLVE_IMAGE => {
                let p: ResolveImagePayload = unsafe { payload(buffer, cursor) };
                unsafe {
                    device
                        .inner
                        .cmd_resolve_image(cmd, p.src, p.src_layout, p.dst, p.dst_layout, core::slice::from_ref(&p.region));
                }
            }
            _ => {
                if !dispatch_compute(device, cmd, header, buffer, cursor) {
                    dispatch_transfer(device, cmd, header, buffer, cursor);
                }
            }
        }
        cursor += header.size_in_bytes as usize;
    }
}

///Replays the disjoint draw-tier catalogue. Record ids here are not comparable to the
///transfer/compute/graphics id space.
pub fn execute_draw(device: &Device, cmd: vk::CommandBuffer, buffer: &[u8]) {
    let mut cursor = 0usize;
    //caches to elide redundant binds, mirroring the draw tier's contract.
    let mut bound_pipeline: Option<vk::Pipeline> = None;
    let mut bound_index_buffer: Option<(vk::Buffer, u64)> = None;

    while cursor < buffer.len() {
        let header = read_header(buffer, cursor);
        match header.command_id {
            draw_ids::END => break,
            draw_ids::BIND_PIPELINE => {
                let p: DrawBindPipelinePayload = unsafe { payload(buffer, cursor) };
                if bound_pipeline != Some(p.pipeline) {
                    unsafe { device.inner.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, p.pipeline) };
                    bound_pipeline = Some(p.pipeline);
                }
            }
            draw_ids::BIND_INDEX_BUFFER => {
                let p: BindIndexBufferPayload = unsafe { payload(buffer, cursor) };
                if bound_index_buffer != Some((p.buffer, p.offset)) {
                    unsafe { device.inner.cmd_bind_index_buffer(cmd, p.buffer, p.offset, p.index_type) };
                    bound_index_buffer = Some((p.buffer, p.offset));
                }
            }
            draw_ids::BIND_VERTEX_BUFFERS => {
                let p: BindVertexBuffersPayload = unsafe { payload(buffer, cursor) };
                let fixed = HEADER_SIZE + core::mem::size_of::<BindVertexBuffersPayload>();
                let buffers_offset = cursor + align_up(fixed, core::mem::align_of::<vk::Buffer>());
                let buffers_bytes = p.count as usize * core::mem::size_of::<vk::Buffer>();
                let offsets_offset = align_up(buffers_offset + buffers_bytes, core::mem::align_of::<u64>());
                let buffers: &[vk::Buffer] = unsafe { trailing_slice(buffer, buffers_offset, p.count as usize) };
                let offsets: &[u64] = unsafe { trailing_slice(buffer, offsets_offset, p.count as usize) };
                unsafe { device.inner.cmd_bind_vertex_buffers(cmd, p.first_binding, buffers, offsets) };
            }
            draw_ids::DRAW_INDEXED => {
                let p: DrawIndexedPayload = unsafe { payload(buffer, cursor) };
                unsafe {
                    device.inner.cmd_draw_indexed(cmd, p.index_count, p.instance_count, p.first_index, p.vertex_offset, p.first_instance);
                }
            }
            draw_ids::DRAW => {
                let p: DrawPayload = unsafe { payload(buffer, cursor) };
                unsafe { device.inner.cmd_draw(cmd, p.vertex_count, p.instance_count, p.first_vertex, p.first_instance) };
            }
            draw_ids::DRAW_INDIRECT => {
                let p: DrawIndirectPayload = unsafe { payload(buffer, cursor) };
                unsafe { device.inner.cmd_draw_indirect(cmd, p.buffer, p.offset, p.draw_count, p.stride) };
            }
            other => panic!("unknown draw command id {other}"),
        }
        cursor += header.size_in_bytes as usize;
    }
}

fn dispatch_transfer(device: &Device, cmd: vk::CommandBuffer, header: CommandHeader, buffer: &[u8], cursor: usize) {
    match header.command_id {
        ids::CLEAR_COLOR_IMAGE => {
            let p: ClearColorImagePayload = unsafe { payload(buffer, cursor) };
            unsafe {
                device.inner.cmd_clear_color_image(cmd, p.image, p.layout, &p.color, core::slice::from_ref(&p.range));
            }
        }
        ids::FILL_BUFFER => {
            let p: FillBufferPayload = unsafe { payload(buffer, cursor) };
            unsafe { device.inner.cmd_fill_buffer(cmd, p.buffer, p.offset, p.size, p.data) };
        }
        ids::UPDATE_BUFFER => {
            let p: UpdateBufferPayload = unsafe { payload(buffer, cursor) };
            let data_offset = cursor + HEADER_SIZE + core::mem::size_of::<UpdateBufferPayload>();
            let data: &[u8] = unsafe { trailing_slice(buffer, data_offset, p.data_len as usize) };
            unsafe { device.inner.cmd_update_buffer(cmd, p.buffer, p.offset, data) };
        }
        ids::COPY_BUFFER => {
            let p: CopyBufferPayload = unsafe { payload(buffer, cursor) };
            unsafe { device.inner.cmd_copy_buffer(cmd, p.src, p.dst, core::slice::from_ref(&p.region)) };
        }
        ids::PIPELINE_BARRIER => {
            let p: PipelineBarrierPayload = unsafe { payload(buffer, cursor) };
            let fixed = HEADER_SIZE + core::mem::size_of::<PipelineBarrierPayload>();
            let array_offset = cursor + align_up(fixed, core::mem::align_of::<BufferBarrierRecord>());
            let records: &[BufferBarrierRecord] = unsafe { trailing_slice(buffer, array_offset, p.buffer_barrier_count as usize) };
            let barriers: smallvec::SmallVec<[vk::BufferMemoryBarrier2; 8]> = records
                .iter()
                .map(|r| {
                    vk::BufferMemoryBarrier2::default()
                        .buffer(r.buffer)
                        .offset(r.offset)
                        .size(r.size)
                        .src_stage_mask(r.src_stage)
                        .dst_stage_mask(r.dst_stage)
                        .src_access_mask(r.src_access)
                        .dst_access_mask(r.dst_access)
                })
                .collect();
            unsafe {
                device.inner.cmd_pipeline_barrier2(cmd, &vk::DependencyInfo::default().buffer_memory_barriers(&barriers));
            }
        }
        ids::DEBUG_MARKER => {
            #[cfg(feature = "logging")]
            {
                let p: DebugMarkerPayload = unsafe { payload(buffer, cursor) };
                let data_offset = cursor + HEADER_SIZE + core::mem::size_of::<DebugMarkerPayload>();
                let name_bytes: &[u8] = unsafe { trailing_slice(buffer, data_offset, p.name_len as usize) };
                log::trace!("debug marker: {}", String::from_utf8_lossy(name_bytes));
            }
        }
        ids::CLEAR_DEPTH_STENCIL_IMAGE => {
            let p: ClearDepthStencilImagePayload = unsafe { payload(buffer, cursor) };
            unsafe {
                device
                    .inner
                    .cmd_clear_depth_stencil_image(cmd, p.image, p.layout, &p.value, core::slice::from_ref(&p.range));
            }
        }
        ids::COPY_IMAGE => {
            let p: CopyImagePayload = unsafe { payload(buffer, cursor) };
            unsafe {
                device
                    .inner
                    .cmd_copy_image(cmd, p.src, p.src_layout, p.dst, p.dst_layout, core::slice::from_ref(&p.region));
            }
        }
        ids::COPY_BUFFER_TO_IMAGE => {
            let p: CopyBufferToImagePayload = unsafe { payload(buffer, cursor) };
            unsafe {
                device
                    .inner
                    .cmd_copy_buffer_to_image(cmd, p.buffer, p.image, p.layout, core::slice::from_ref(&p.region));
            }
        }
        ids::COPY_IMAGE_TO_BUFFER => {
            let p: CopyImageToBufferPayload = unsafe { payload(buffer, cursor) };
            unsafe {
                device
                    .inner
                    .cmd_copy_image_to_buffer(cmd, p.image, p.layout, p.buffer, core::slice::from_ref(&p.region));
            }
        }
        ids::BEGIN_DEBUG_LABEL => {
            #[cfg(feature = "logging")]
            {
                let p: DebugLabelPayload = unsafe { payload(buffer, cursor) };
                let data_offset = cursor + HEADER_SIZE + core::mem::size_of::<DebugLabelPayload>();
                let name_bytes: &[u8] = unsafe { trailing_slice(buffer, data_offset, p.name_len as usize) };
                log::trace!("debug label begin: {}", String::from_utf8_lossy(name_bytes));
            }
        }
        ids::END_DEBUG_LABEL => {
            #[cfg(feature = "logging")]
            log::trace!("debug label end");
        }
        other => panic!("unknown transfer command id {other}"),
    }
}

///Returns `true` if `header` named a compute-tier id and was handled.
fn dispatch_compute(device: &Device, cmd: vk::CommandBuffer, header: CommandHeader, buffer: &[u8], cursor: usize) -> bool {
    match header.command_id {
        ids::BIND_PIPELINE => {
            let p: BindPipelinePayload = unsafe { payload(buffer, cursor) };
            unsafe { device.inner.cmd_bind_pipeline(cmd, p.bind_point, p.pipeline) };
            true
        }
        ids::BIND_DESCRIPTOR_SET => {
            let p: BindDescriptorSetPayload = unsafe { payload(buffer, cursor) };
            unsafe {
                device.inner.cmd_bind_descriptor_sets(cmd, p.bind_point, p.pipeline_layout, p.first_set, core::slice::from_ref(&p.descriptor_set), &[]);
            }
            true
        }
        ids::PUSH_CONSTANT => {
            let p: PushConstantPayload = unsafe { payload(buffer, cursor) };
            let data_offset = cursor + HEADER_SIZE + core::mem::size_of::<PushConstantPayload>();
            let data: &[u8] = unsafe { trailing_slice(buffer, data_offset, p.data_len as usize) };
            unsafe { device.inner.cmd_push_constants(cmd, p.pipeline_layout, p.stage_flags, p.offset, data) };
            true
        }
        ids::DISPATCH => {
            let p: DispatchPayload = unsafe { payload(buffer, cursor) };
            unsafe { device.inner.cmd_dispatch(cmd, p.x, p.y, p.z) };
            true
        }
        ids::DISPATCH_INDIRECT => {
            let p: DispatchIndirectPayload = unsafe { payload(buffer, cursor) };
            unsafe { device.inner.cmd_dispatch_indirect(cmd, p.buffer, p.offset) };
            true
        }
        ids::DISPATCH_BASE => {
            let p: DispatchBasePayload = unsafe { payload(buffer, cursor) };
            unsafe { device.inner.cmd_dispatch_base(cmd, p.base_x, p.base_y, p.base_z, p.x, p.y, p.z) };
            true
        }
        _ => false,
    }
}

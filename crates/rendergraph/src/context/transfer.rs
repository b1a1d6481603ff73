use std::sync::Arc;

use marpii::ash::vk;
use marpii::resources::{Buffer, Image};

use crate::resources::{BufferHandle, ImageHandle, Resources};
use crate::track::Access;

use super::{Backend, Context, ResourceSync};

///The transfer tier: clears, fills, buffer/image copies, and debug markers. Every other
///recorder tier extends this one, mirroring the command catalogue's prefix relationship
///.
pub trait TransferRecorder {
    fn clear_color_image(&mut self, resources: &mut Resources, image: ImageHandle, layout: vk::ImageLayout, color: vk::ClearColorValue);
    fn clear_depth_stencil_image(&mut self, resources: &mut Resources, image: ImageHandle, layout: vk::ImageLayout, value: vk::ClearDepthStencilValue);
    fn fill_buffer(&mut self, resources: &mut Resources, buffer: BufferHandle, offset: u64, size: u64, data: u32);
    fn update_buffer(&mut self, resources: &mut Resources, buffer: BufferHandle, offset: u64, data: &[u8]);
    fn copy_buffer(&mut self, resources: &mut Resources, src: BufferHandle, dst: BufferHandle, region: vk::BufferCopy);
    fn copy_image(&mut self, resources: &mut Resources, src: ImageHandle, src_layout: vk::ImageLayout, dst: ImageHandle, dst_layout: vk::ImageLayout, region: vk::ImageCopy);
    fn copy_buffer_to_image(&mut self, resources: &mut Resources, buffer: BufferHandle, image: ImageHandle, layout: vk::ImageLayout, region: vk::BufferImageCopy);
    fn copy_image_to_buffer(&mut self, resources: &mut Resources, image: ImageHandle, layout: vk::ImageLayout, buffer: BufferHandle, region: vk::BufferImageCopy);
    fn debug_marker(&mut self, name: &str, color: [f32; 4]);
    fn begin_debug_label(&mut self, name: &str, color: [f32; 4]);
    fn end_debug_label(&mut self);
    ///Removes `handle` from `resources`, committing whatever barrier makes its last write
    ///visible before the underlying buffer is freed.
    fn destroy_buffer(&mut self, resources: &mut Resources, handle: BufferHandle) -> Option<Arc<Buffer>>;
    ///Removes `handle` from `resources`, committing whatever barrier returns it to its
    ///default layout before the underlying image is freed.
    fn destroy_image(&mut self, resources: &mut Resources, handle: ImageHandle) -> Option<Arc<Image>>;
}

fn write_access(exe_order: u32) -> Access {
    Access {
        stage: vk::PipelineStageFlags2::TRANSFER,
        access: vk::AccessFlags2::TRANSFER_WRITE,
        is_write: true,
        exe_order,
        layout: None,
    }
}

fn read_access(exe_order: u32) -> Access {
    Access {
        stage: vk::PipelineStageFlags2::TRANSFER,
        access: vk::AccessFlags2::TRANSFER_READ,
        is_write: false,
        exe_order,
        layout: None,
    }
}

impl<B: Backend, S: ResourceSync> TransferRecorder for Context<B, S> {
    fn clear_color_image(&mut self, resources: &mut Resources, image: ImageHandle, layout: vk::ImageLayout, color: vk::ClearColorValue) {
        let order = self.next_exe_order();
        let access = Access { layout: Some(layout), ..write_access(order) };
        self.sync_image(resources, image, None, access);
        let Some(native) = resources.image_native(image) else { return };
        let range = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .level_count(vk::REMAINING_MIP_LEVELS)
            .layer_count(vk::REMAINING_ARRAY_LAYERS);
        self.backend.clear_color_image(native, layout, color, range);
    }

    fn clear_depth_stencil_image(&mut self, resources: &mut Resources, image: ImageHandle, layout: vk::ImageLayout, value: vk::ClearDepthStencilValue) {
        let order = self.next_exe_order();
        let access = Access { layout: Some(layout), ..write_access(order) };
        self.sync_image(resources, image, None, access);
        let Some(native) = resources.image_native(image) else { return };
        let range = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
            .level_count(vk::REMAINING_MIP_LEVELS)
            .layer_count(vk::REMAINING_ARRAY_LAYERS);
        self.backend.clear_depth_stencil_image(native, layout, value, range);
    }

    fn fill_buffer(&mut self, resources: &mut Resources, buffer: BufferHandle, offset: u64, size: u64, data: u32) {
        let order = self.next_exe_order();
        self.sync_buffer(resources, buffer, Some((offset, offset + size)), write_access(order));
        let Some(native) = resources.buffer_native(buffer) else { return };
        self.backend.fill_buffer(native, offset, size, data);
    }

    fn update_buffer(&mut self, resources: &mut Resources, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let order = self.next_exe_order();
        self.sync_buffer(resources, buffer, Some((offset, offset + data.len() as u64)), write_access(order));
        let Some(native) = resources.buffer_native(buffer) else { return };
        self.backend.update_buffer(native, offset, data);
    }

    fn copy_buffer(&mut self, resources: &mut Resources, src: BufferHandle, dst: BufferHandle, region: vk::BufferCopy) {
        let order = self.next_exe_order();
        let read_access = Access {
            stage: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_READ,
            is_write: false,
            exe_order: order,
            layout: None,
        };
        self.sync_buffer(resources, src, Some((region.src_offset, region.src_offset + region.size)), read_access);
        self.sync_buffer(resources, dst, Some((region.dst_offset, region.dst_offset + region.size)), write_access(order));

        let (Some(src_native), Some(dst_native)) = (resources.buffer_native(src), resources.buffer_native(dst)) else { return };
        self.backend.copy_buffer(src_native, dst_native, region);
    }

    fn copy_image(&mut self, resources: &mut Resources, src: ImageHandle, src_layout: vk::ImageLayout, dst: ImageHandle, dst_layout: vk::ImageLayout, region: vk::ImageCopy) {
        let order = self.next_exe_order();
        self.sync_image(resources, src, None, Access { layout: Some(src_layout), ..read_access(order) });
        self.sync_image(resources, dst, None, Access { layout: Some(dst_layout), ..write_access(order) });
        let (Some(src_native), Some(dst_native)) = (resources.image_native(src), resources.image_native(dst)) else { return };
        self.backend.copy_image(src_native, src_layout, dst_native, dst_layout, region);
    }

    fn copy_buffer_to_image(&mut self, resources: &mut Resources, buffer: BufferHandle, image: ImageHandle, layout: vk::ImageLayout, region: vk::BufferImageCopy) {
        let order = self.next_exe_order();
        //exact byte span needs the image's format/block size; track from the offset onward.
        self.sync_buffer(resources, buffer, Some((region.buffer_offset, vk::WHOLE_SIZE)), read_access(order));
        self.sync_image(resources, image, None, Access { layout: Some(layout), ..write_access(order) });
        let (Some(buffer_native), Some(image_native)) = (resources.buffer_native(buffer), resources.image_native(image)) else { return };
        self.backend.copy_buffer_to_image(buffer_native, image_native, layout, region);
    }

    fn copy_image_to_buffer(&mut self, resources: &mut Resources, image: ImageHandle, layout: vk::ImageLayout, buffer: BufferHandle, region: vk::BufferImageCopy) {
        let order = self.next_exe_order();
        self.sync_image(resources, image, None, Access { layout: Some(layout), ..read_access(order) });
        //exact byte span needs the image's format/block size; track from the offset onward.
        self.sync_buffer(resources, buffer, Some((region.buffer_offset, vk::WHOLE_SIZE)), write_access(order));
        let (Some(image_native), Some(buffer_native)) = (resources.image_native(image), resources.buffer_native(buffer)) else { return };
        self.backend.copy_image_to_buffer(image_native, layout, buffer_native, region);
    }

    fn debug_marker(&mut self, name: &str, color: [f32; 4]) {
        self.backend.debug_marker(name, color);
    }

    fn begin_debug_label(&mut self, name: &str, color: [f32; 4]) {
        self.backend.begin_debug_label(name, color);
    }

    fn end_debug_label(&mut self) {
        self.backend.end_debug_label();
    }

    fn destroy_buffer(&mut self, resources: &mut Resources, handle: BufferHandle) -> Option<Arc<Buffer>> {
        let buffer = resources.destroy_buffer(handle, &mut self.aggregator)?;
        self.flush_barriers();
        Some(buffer)
    }

    fn destroy_image(&mut self, resources: &mut Resources, handle: ImageHandle) -> Option<Arc<Image>> {
        let image = resources.destroy_image(handle, &mut self.aggregator)?;
        self.flush_barriers();
        Some(image)
    }
}

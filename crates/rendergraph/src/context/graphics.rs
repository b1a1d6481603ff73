use marpii::ash::vk;

use crate::resources::{ImageHandle, Resources};
use crate::track::Access;

use super::{Backend, ComputeRecorder, Context, ResourceSync};

///Adds graphics-bind-point pipeline/descriptor binding and image blit/resolve on top of
///[ComputeRecorder] (the graphics catalogue is a superset of the compute catalogue).
///
///Render-pass `Begin`/`NextSubpass`/`End` are intentionally not part of this trait — they
///are left to a higher layer built on `dynamic_rendering` (see `DESIGN.md`).
pub trait GraphicsRecorder: ComputeRecorder {
    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_graphics_descriptor_set(&mut self, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet);
    fn blit_image(&mut self, resources: &mut Resources, src: ImageHandle, src_layout: vk::ImageLayout, dst: ImageHandle, dst_layout: vk::ImageLayout, region: vk::ImageBlit, filter: vk::Filter);
    fn resolve_image(&mut self, resources: &mut Resources, src: ImageHandle, src_layout: vk::ImageLayout, dst: ImageHandle, dst_layout: vk::ImageLayout, region: vk::ImageResolve);
}

impl<B: Backend, S: ResourceSync> GraphicsRecorder for Context<B, S> {
    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.backend.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline);
    }

    fn bind_graphics_descriptor_set(&mut self, layout: vk::PipelineLayout, first_set: u32, set: vk::DescriptorSet) {
        self.backend.bind_descriptor_set(vk::PipelineBindPoint::GRAPHICS, layout, first_set, set);
    }

    fn blit_image(&mut self, resources: &mut Resources, src: ImageHandle, src_layout: vk::ImageLayout, dst: ImageHandle, dst_layout: vk::ImageLayout, region: vk::ImageBlit, filter: vk::Filter) {
        let order = self.next_exe_order();
        let read_access = Access {
            stage: vk::PipelineStageFlags2::BLIT,
            access: vk::AccessFlags2::TRANSFER_READ,
            is_write: false,
            exe_order: order,
            layout: Some(src_layout),
        };
        let write_access = Access {
            stage: vk::PipelineStageFlags2::BLIT,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            is_write: true,
            exe_order: order,
            layout: Some(dst_layout),
        };
        self.sync_image(resources, src, None, read_access);
        self.sync_image(resources, dst, None, write_access);
        let (Some(src_native), Some(dst_native)) = (resources.image_native(src), resources.image_native(dst)) else { return };
        self.backend.blit_image(src_native, src_layout, dst_native, dst_layout, region, filter);
    }

    fn resolve_image(&mut self, resources: &mut Resources, src: ImageHandle, src_layout: vk::ImageLayout, dst: ImageHandle, dst_layout: vk::ImageLayout, region: vk::ImageResolve) {
        let order = self.next_exe_order();
        let read_access = Access {
            stage: vk::PipelineStageFlags2::RESOLVE,
            access: vk::AccessFlags2::TRANSFER_READ,
            is_write: false,
            exe_order: order,
            layout: Some(src_layout),
        };
        let write_access = Access {
            stage: vk::PipelineStageFlags2::RESOLVE,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            is_write: true,
            exe_order: order,
            layout: Some(dst_layout),
        };
        self.sync_image(resources, src, None, read_access);
        self.sync_image(resources, dst, None, write_access);
        let (Some(src_native), Some(dst_native)) = (resources.image_native(src), resources.image_native(dst)) else { return };
        self.backend.resolve_image(src_native, src_layout, dst_native, dst_layout, region);
    }
}

//! Recording contexts: the typed API a render task records into.
//!
//! A `Context` is generic over two orthogonal choices: a [Backend] (native command buffer
//! vs. a baked, indirect command stream) and a [ResourceSync] policy (manual batching vs.
//! automatic per-resource/per-range barrier commits). The four recorder traits form a tier
//! hierarchy mirroring the command catalogue: `Transfer ⊂ Compute ⊂ Graphics`; `Draw` is a
//! disjoint fifth tier with its own catalogue and its own context type.

pub mod backend;
mod compute;
mod draw;
mod graphics;
mod sync_policy;
mod transfer;

pub use backend::{Backend, Direct, DrawBackend, Indirect};
pub use sync_policy::{Manual, PerRange, PerResource, ResourceSync};

pub use compute::ComputeRecorder;
pub use draw::DrawRecorder;
pub use graphics::GraphicsRecorder;
pub use transfer::TransferRecorder;

use std::sync::Arc;

use marpii::context::Device;
use rendergraph_commands::BarrierAggregator;

use crate::encode::{BakedCommands, ExecuteFn};
use crate::resources::Resources;

///A transfer/compute/graphics recording context. `exe_order` is a monotonically
///increasing counter stamped onto every tracked access, used by the resource trackers to
///order writers against readers within one recording.
pub struct Context<B, S> {
    pub(crate) backend: B,
    pub(crate) sync: S,
    pub(crate) aggregator: BarrierAggregator,
    pub(crate) device: Arc<Device>,
    pub(crate) exe_order: u32,
}

impl<B, S: Default> Context<B, S> {
    pub fn new(device: Arc<Device>, backend: B) -> Self {
        Context {
            backend,
            sync: S::default(),
            aggregator: BarrierAggregator::new(),
            device,
            exe_order: 0,
        }
    }
}

impl<B: Backend, S: ResourceSync> Context<B, S> {
    ///Submits any barriers the sync policy has accumulated so far. Recorders call this
    ///automatically before an operation that reads/writes a resource still carrying a
    ///pending state; [Manual] users call it explicitly between batched passes.
    pub fn flush_barriers(&mut self) {
        if let Some(pending) = self.aggregator.get_barriers() {
            self.backend.pipeline_barrier(&self.device, &pending);
        }
        self.aggregator.clear_barriers();
    }

    fn next_exe_order(&mut self) -> u32 {
        self.exe_order += 1;
        self.exe_order
    }

    ///Tracks one buffer use and immediately flushes any barrier the sync policy derived
    ///for it. A no-op flush (nothing pending) costs one `Option` check.
    pub(crate) fn sync_buffer(&mut self, resources: &mut Resources, handle: crate::resources::BufferHandle, range: Option<(u64, u64)>, access: crate::track::Access) {
        self.sync.sync_buffer(resources, handle, range, access, &mut self.aggregator);
        self.flush_barriers();
    }

    ///Tracks one image use and immediately flushes any barrier the sync policy derived for
    ///it.
    pub(crate) fn sync_image(&mut self, resources: &mut Resources, handle: crate::resources::ImageHandle, range: Option<(u64, u64)>, access: crate::track::Access) {
        self.sync.sync_image(resources, handle, range, access, &mut self.aggregator);
        self.flush_barriers();
    }
}

impl<S: ResourceSync> Context<Indirect, S> {
    ///Bakes the recorded command stream for later replay. `execute` picks which tier's
    ///dispatcher (`execute_transfer`/`execute_compute`/`execute_graphics`) the indirect
    ///catalogue is replayed through; the recorder trait the task used determines which one
    ///is correct.
    pub fn finish(self, execute: ExecuteFn) -> BakedCommands {
        self.backend.encoder.prepare(execute)
    }
}

///A draw recording context. Kept separate from [Context] since the draw catalogue and its
///Direct/Indirect backends do not share the transfer/compute/graphics tier.
pub struct DrawContext<B> {
    pub(crate) backend: B,
    pub(crate) bound_pipeline: Option<marpii::ash::vk::Pipeline>,
    ///Buffer and offset together: rebinding the same buffer at a different offset is a
    ///real `vkCmdBindIndexBuffer` call, not a redundant one.
    pub(crate) bound_index_buffer: Option<(marpii::ash::vk::Buffer, u64)>,
}

impl<B> DrawContext<B> {
    pub fn new(backend: B) -> Self {
        DrawContext {
            backend,
            bound_pipeline: None,
            bound_index_buffer: None,
        }
    }
}

//! [RenderTask]: a closure-based unit of recording work posted into a [crate::batch::CommandBatch].
//!
//! A task already runs inside a particular batch on a particular queue, so acquiring a
//! resource happens naturally as the task's closure calls `Context::sync_buffer`/`sync_image`
//! while recording, and publishing is just returning the baked command stream. `RenderTask`
//! only keeps what that needs: a name (for debug markers/logging), a queue family, and the
//! recording closure itself.

use crate::encode::BakedCommands;
use crate::resources::Resources;

///One recorded unit of work, ready to be handed to a [crate::frame::FrameOrchestrator].
///`record` is `FnOnce` since a task runs exactly once per frame it's posted in; tasks that
///recur every frame are expected to be re-built (cheaply, since they're just closures) by the
///host's per-frame render loop, matching how `marpii-rmg`'s call-site task construction works.
pub struct RenderTask {
    name: &'static str,
    queue_family: u32,
    record: Box<dyn FnOnce(&mut Resources) -> BakedCommands + Send>,
}

impl RenderTask {
    pub fn new(
        name: &'static str,
        queue_family: u32,
        record: impl FnOnce(&mut Resources) -> BakedCommands + Send + 'static,
    ) -> Self {
        RenderTask {
            name,
            queue_family,
            record: Box::new(record),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    ///Consumes the task, running its closure to produce the command stream a batch will
    ///replay. Called by the frame orchestrator once the task's batch is ready to record.
    pub fn into_baked(self, resources: &mut Resources) -> BakedCommands {
        (self.record)(resources)
    }
}

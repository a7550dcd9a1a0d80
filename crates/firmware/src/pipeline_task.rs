//! LL task that drives one pipeline (and the pipelines it schedules).

use alloc::sync::Arc;

use audio::{CopyError, PipelineId, Topology, TriggerCmd};
use platform::HostMessage;
use schedule::{TaskContext, TaskId, TaskOps, TaskReturn};

use crate::ipc::{IpcPriority, OutboundQueue};

/// Header class of an xrun notification; the low bits carry the pipeline id.
pub const NOTIFY_XRUN: u32 = 0x6100_0000;

/// LL task id of the pipeline `pid`'s task.
#[must_use]
pub const fn task_id(pid: PipelineId) -> TaskId {
    TaskId(pid.0)
}

/// Xrun notification for the host: header carries the pipeline, payload
/// the little-endian errno.
#[must_use]
pub fn xrun_notification(pid: PipelineId, errno: i32) -> HostMessage {
    let mut msg = HostMessage::new(NOTIFY_XRUN | (pid.0 & 0x00FF_FFFF));
    let _ = msg.payload.extend_from_slice(&errno.to_le_bytes());
    msg
}

/// Runs one copy pass per tick. On an xrun it forces the pipeline out of
/// streaming, tells the host and leaves the LL queue.
pub struct PipelineTask {
    pipeline: PipelineId,
    topology: Arc<Topology>,
    outbound: Arc<OutboundQueue>,
}

impl PipelineTask {
    /// Task for `pipeline`.
    #[must_use]
    pub fn new(pipeline: PipelineId, topology: Arc<Topology>, outbound: Arc<OutboundQueue>) -> Self {
        Self {
            pipeline,
            topology,
            outbound,
        }
    }

    fn recover(&self, err: CopyError) {
        platform::warn!("{}: {}", self.pipeline, err);
        let endpoint = self
            .topology
            .pipeline_info(self.pipeline)
            .and_then(|info| info.trigger_endpoint());
        if let Some(endpoint) = endpoint {
            if let Err(e) = self.topology.trigger(endpoint, TriggerCmd::Xrun) {
                platform::error!("{} xrun stop failed: {}", self.pipeline, e);
            }
        }
        let note = xrun_notification(self.pipeline, err.errno());
        if let Err(e) = self.outbound.enqueue(note, IpcPriority::High) {
            platform::error!("{} xrun not reported: {}", self.pipeline, e);
        }
    }
}

impl TaskOps for PipelineTask {
    fn run(&mut self, _cx: &TaskContext) -> TaskReturn {
        match self.topology.pipeline_copy(self.pipeline) {
            Ok(stats) => {
                platform::trace!("{} copied {} bytes", self.pipeline, stats.bytes);
                TaskReturn::Reschedule
            }
            Err(err @ CopyError::Xrun { .. }) => {
                self.recover(err);
                TaskReturn::Completed
            }
            Err(err) => {
                platform::error!("{} copy failed: {}", self.pipeline, err);
                TaskReturn::Completed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_carries_pipeline_and_errno() {
        let msg = xrun_notification(PipelineId(3), -5);
        assert_eq!(msg.header, NOTIFY_XRUN | 3);
        assert_eq!(msg.payload.as_slice(), &(-5i32).to_le_bytes());
    }
}

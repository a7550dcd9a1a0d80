//! Pipeline model.
//!
//! A pipeline owns a connected subgraph of components and the buffers
//! between them. All members share one scheduling priority and one core.
//! Pipelines that share a `sched_id` on the same core are driven by the same
//! task and are walked together; any other neighbor is a boundary.

use platform::config::{MAX_BUFFERS, MAX_COMPONENTS};
use platform::CoreId;

use crate::state::CompState;
use crate::{BufferId, CompId, PipelineId};

/// Data direction of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host → hardware.
    Playback,
    /// Hardware → host.
    Capture,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Playback => "playback",
            Self::Capture => "capture",
        })
    }
}

/// Creation parameters for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineConfig {
    /// Host-assigned id.
    pub id: PipelineId,
    /// Core that runs every member.
    pub core: CoreId,
    /// Scheduling priority; lower runs first within an LL tick.
    pub priority: u32,
    /// Scheduling period in microseconds.
    pub period_us: u32,
    /// Data direction.
    pub direction: Direction,
    /// Pipeline whose task drives this one; `None` means itself.
    pub sched_id: Option<PipelineId>,
}

impl PipelineConfig {
    /// Config for a self-scheduled pipeline.
    #[must_use]
    pub const fn new(id: PipelineId, core: CoreId, direction: Direction) -> Self {
        Self {
            id,
            core,
            priority: 0,
            period_us: platform::config::LL_TICK_PERIOD_US,
            direction,
            sched_id: None,
        }
    }

    /// Same config with `priority`.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Same config driven by `sched_id`'s task.
    #[must_use]
    pub const fn scheduled_by(mut self, sched_id: PipelineId) -> Self {
        self.sched_id = Some(sched_id);
        self
    }

    /// Pipeline whose task drives this one.
    #[must_use]
    pub fn sched_id(&self) -> PipelineId {
        self.sched_id.unwrap_or(self.id)
    }
}

/// Snapshot of one pipeline, for callers outside the topology lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineInfo {
    /// Creation parameters.
    pub config: PipelineConfig,
    /// Upstream endpoint, known once complete.
    pub source: Option<CompId>,
    /// Downstream endpoint, known once complete.
    pub sink: Option<CompId>,
    /// State of the trigger endpoint (`Uninit` until complete).
    pub state: CompState,
    /// `pipeline_complete` has run.
    pub complete: bool,
    /// Copy failures seen so far.
    pub xrun_count: u32,
    /// Number of member components.
    pub members: usize,
}

impl PipelineInfo {
    /// Component a host trigger starts from: the source of a playback
    /// pipeline, the sink of a capture pipeline.
    #[must_use]
    pub fn trigger_endpoint(&self) -> Option<CompId> {
        match self.config.direction {
            Direction::Playback => self.source,
            Direction::Capture => self.sink,
        }
    }

    /// `true` if this pipeline owns its scheduling task.
    #[must_use]
    pub fn owns_task(&self) -> bool {
        self.config.sched_id() == self.config.id
    }
}

pub(crate) struct Pipeline {
    pub(crate) cfg: PipelineConfig,
    pub(crate) source: Option<CompId>,
    pub(crate) sink: Option<CompId>,
    pub(crate) complete: bool,
    pub(crate) xrun_count: u32,
    /// Insertion order = creation order.
    pub(crate) members: heapless::Vec<CompId, MAX_COMPONENTS>,
    pub(crate) buffers: heapless::Vec<BufferId, MAX_BUFFERS>,
}

impl Pipeline {
    pub(crate) fn new(cfg: PipelineConfig) -> Self {
        Self {
            cfg,
            source: None,
            sink: None,
            complete: false,
            xrun_count: 0,
            members: heapless::Vec::new(),
            buffers: heapless::Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> PipelineId {
        self.cfg.id
    }

    /// Same task, same core: walked as one unit.
    pub(crate) fn scheduled_with(&self, other: &Pipeline) -> bool {
        self.cfg.sched_id() == other.cfg.sched_id() && self.cfg.core == other.cfg.core
    }
}

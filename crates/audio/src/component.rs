//! Component model: configuration, driver contract and the arena record.
//!
//! The core never inspects component-type-specific state. Everything a
//! component does happens behind [`ComponentOps`], created by the
//! [`ComponentDriver`] registered for its type.

use alloc::boxed::Box;
use alloc::sync::Arc;

use platform::config::MAX_COMP_PORTS;
use platform::Allocator;

use crate::buffer::CompBuffer;
use crate::state::{CompState, InvalidTransition, TriggerCmd};
use crate::walk::TriggerContext;
use crate::{BufferId, CompId, PipelineId};

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors a component (or the state machine in front of it) reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompError {
    /// The command is not valid from the component's current state.
    InvalidTransition(InvalidTransition),
    /// Stream parameters the component cannot handle.
    InvalidParams,
    /// The component could not get memory.
    NoMemory,
    /// The component is streaming and cannot take the request.
    Busy,
    /// Driver-specific failure, as a positive errno.
    Driver(i32),
}

impl CompError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        use platform::errno::{reply, EBUSY, EINVAL, ENOMEM};
        match self {
            Self::InvalidTransition(_) | Self::InvalidParams => reply(EINVAL),
            Self::NoMemory => reply(ENOMEM),
            Self::Busy => reply(EBUSY),
            Self::Driver(errno) => reply(errno),
        }
    }
}

impl From<InvalidTransition> for CompError {
    fn from(e: InvalidTransition) -> Self {
        Self::InvalidTransition(e)
    }
}

impl core::fmt::Display for CompError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidTransition(t) => write!(f, "{} invalid from {}", t.cmd, t.from),
            Self::InvalidParams => f.write_str("unsupported stream parameters"),
            Self::NoMemory => f.write_str("out of memory"),
            Self::Busy => f.write_str("component busy"),
            Self::Driver(errno) => write!(f, "driver error {errno}"),
        }
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

/// What sits at the edge of the graph behind a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointKind {
    /// Host DMA endpoint.
    Host,
    /// Hardware audio interface; always able to supply data once running.
    Dai,
    /// Purely internal processing node.
    Internal,
}

impl EndpointKind {
    /// `true` for hardware endpoints.
    #[must_use]
    pub const fn is_hardware(self) -> bool {
        matches!(self, Self::Dai)
    }
}

/// Sample container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFormat {
    /// 16-bit signed.
    S16,
    /// 24-bit signed in 32-bit container.
    S24,
    /// 32-bit signed.
    S32,
    /// 32-bit float.
    Float,
}

impl FrameFormat {
    /// Bytes per sample.
    #[must_use]
    pub const fn sample_bytes(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::S24 | Self::S32 | Self::Float => 4,
        }
    }
}

/// Stream parameters delivered by the params walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamParams {
    /// Sample rate in Hz.
    pub rate: u32,
    /// Interleaved channel count.
    pub channels: u8,
    /// Sample format.
    pub format: FrameFormat,
    /// Frames processed per scheduling period.
    pub period_frames: u32,
}

impl StreamParams {
    /// Bytes moved per period.
    #[must_use]
    pub fn period_bytes(&self) -> usize {
        let frames = usize::try_from(self.period_frames).unwrap_or(usize::MAX);
        frames
            .saturating_mul(usize::from(self.channels))
            .saturating_mul(self.format.sample_bytes())
    }
}

/// Creation parameters for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompConfig {
    /// Host-assigned id, unique in the topology.
    pub id: CompId,
    /// Pipeline the component belongs to.
    pub pipeline: PipelineId,
    /// Driver type id, resolved through the [`DriverRegistry`](crate::driver::DriverRegistry).
    pub comp_type: u32,
    /// Endpoint classification.
    pub endpoint: EndpointKind,
}

// ── Driver contract ──────────────────────────────────────────────────────────

/// Answer of a trigger callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerOutcome {
    /// Accepted; keep propagating.
    Continue,
    /// Accepted, but do not propagate past this component.
    PathStop,
}

/// Answer of a copy callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CopyStatus {
    /// Moved this many bytes.
    Copied(usize),
    /// Nothing to do this period; not an error.
    NoData,
}

/// Buffers visible to one `copy` call.
pub struct CopyIo<'a> {
    /// Input buffers, in connection order.
    pub sources: &'a [Arc<CompBuffer>],
    /// Output buffers, in connection order.
    pub sinks: &'a [Arc<CompBuffer>],
}

/// Per-component operations supplied by a driver.
///
/// Every callback runs without the topology lock held, so a callback may
/// request a nested walk on another pipeline through its context.
pub trait ComponentOps: Send {
    /// Apply stream parameters. Called only while the component is idle.
    fn params(&mut self, _params: &StreamParams) -> Result<(), CompError> {
        Ok(())
    }

    /// Get ready to stream.
    fn prepare(&mut self) -> Result<(), CompError> {
        Ok(())
    }

    /// React to a trigger command. `cx.already_set()` tells whether the
    /// component was already in the target state.
    fn trigger(&mut self, cx: &mut TriggerContext<'_>) -> Result<TriggerOutcome, CompError>;

    /// Move one period of data from `io.sources` to `io.sinks`.
    fn copy(&mut self, io: &mut CopyIo<'_>) -> Result<CopyStatus, CompError>;

    /// Drop runtime state and return to the freshly created condition.
    fn reset(&mut self) -> Result<(), CompError> {
        Ok(())
    }

    /// Release driver resources before the component is destroyed.
    fn free(&mut self, _heap: &dyn Allocator) {}
}

/// Factory for one component type (`new` of the operation table).
pub trait ComponentDriver: Send + Sync {
    /// Create the operations object for a component described by `cfg`.
    ///
    /// Memory the driver needs comes from `heap`; on error nothing may be
    /// left allocated.
    #[allow(clippy::new_ret_no_self)] // factory method of the operation table
    fn new(&self, cfg: &CompConfig, heap: &dyn Allocator)
        -> Result<Box<dyn ComponentOps>, CompError>;
}

// ── Arena record ─────────────────────────────────────────────────────────────

/// Snapshot of one component, for callers outside the topology lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompInfo {
    /// Component id.
    pub id: CompId,
    /// Owning pipeline.
    pub pipeline: PipelineId,
    /// Current run state.
    pub state: CompState,
    /// Trigger callbacks delivered, including already-set ones.
    pub trigger_count: u32,
    /// Copy callbacks delivered.
    pub copy_count: u32,
    /// Endpoint classification.
    pub endpoint: EndpointKind,
}

pub(crate) struct Component {
    pub(crate) cfg: CompConfig,
    pub(crate) state: CompState,
    pub(crate) resume_to: Option<CompState>,
    /// `None` while a callback runs outside the lock.
    pub(crate) ops: Option<Box<dyn ComponentOps>>,
    pub(crate) sources: heapless::Vec<BufferId, MAX_COMP_PORTS>,
    pub(crate) sinks: heapless::Vec<BufferId, MAX_COMP_PORTS>,
    pub(crate) trigger_count: u32,
    pub(crate) copy_count: u32,
}

impl Component {
    pub(crate) fn new(cfg: CompConfig, ops: Box<dyn ComponentOps>) -> Self {
        Self {
            cfg,
            state: CompState::Uninit,
            resume_to: None,
            ops: Some(ops),
            sources: heapless::Vec::new(),
            sinks: heapless::Vec::new(),
            trigger_count: 0,
            copy_count: 0,
        }
    }

    pub(crate) fn id(&self) -> CompId {
        self.cfg.id
    }

    pub(crate) fn pipeline(&self) -> PipelineId {
        self.cfg.pipeline
    }

    pub(crate) fn in_transition(&self) -> bool {
        self.ops.is_none()
    }

    pub(crate) fn info(&self) -> CompInfo {
        CompInfo {
            id: self.cfg.id,
            pipeline: self.cfg.pipeline,
            state: self.state,
            trigger_count: self.trigger_count,
            copy_count: self.copy_count,
            endpoint: self.cfg.endpoint,
        }
    }

    /// Commit a state accepted by the driver.
    pub(crate) fn commit(&mut self, cmd: TriggerCmd, to: CompState) {
        if cmd == TriggerCmd::Suspend && self.state != CompState::Suspend {
            self.resume_to = Some(self.state);
        }
        if cmd == TriggerCmd::Resume {
            self.resume_to = None;
        }
        self.state = to;
        self.trigger_count = self.trigger_count.saturating_add(1);
    }
}

//! Graph, walk and copy errors.
//!
//! Recoverable outcomes are ordinary values. `ENODATA` is an error variant
//! the dispatcher branches on; `EPIPE` is not an error at all but a
//! [`WalkReport`](crate::walk::WalkReport) status. Only the variants for
//! which `is_fatal()` returns `true` go to the firmware panic path.

use platform::errno::{reply, EBUSY, EINVAL, EIO, ENODATA, ENODEV, ENOMEM};
use platform::AllocError;

use crate::component::CompError;
use crate::{BufferId, CompId, PipelineId};

/// Topology construction and lookup errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GraphError {
    /// No component with this id.
    UnknownComponent(CompId),
    /// No pipeline with this id.
    UnknownPipeline(PipelineId),
    /// No buffer with this id.
    UnknownBuffer(BufferId),
    /// No driver registered for this component type.
    UnknownDriver(u32),
    /// Component id already in use.
    DuplicateComponent(CompId),
    /// Pipeline id already in use.
    DuplicatePipeline(PipelineId),
    /// Buffer id already in use.
    DuplicateBuffer(BufferId),
    /// Component type already registered.
    DuplicateDriver(u32),
    /// A fixed-size table is full.
    CapacityExceeded,
    /// The buffer already has a producer and consumer.
    BufferAttached(BufferId),
    /// The pipeline is complete; its membership is frozen.
    PipelineComplete(PipelineId),
    /// The pipeline has no components.
    PipelineEmpty(PipelineId),
    /// The pipeline was never completed.
    PipelineIncomplete(PipelineId),
    /// The component is streaming or mid-callback.
    Busy(CompId),
    /// The allocator service failed.
    Alloc(AllocError),
    /// The driver refused to create the component.
    Driver(CompError),
    /// Arena links point at records that do not exist.
    Corrupted,
}

impl GraphError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::UnknownComponent(_)
            | Self::UnknownPipeline(_)
            | Self::UnknownBuffer(_)
            | Self::UnknownDriver(_) => reply(ENODEV),
            Self::DuplicateComponent(_)
            | Self::DuplicatePipeline(_)
            | Self::DuplicateBuffer(_)
            | Self::DuplicateDriver(_)
            | Self::BufferAttached(_)
            | Self::PipelineComplete(_)
            | Self::PipelineEmpty(_)
            | Self::PipelineIncomplete(_) => reply(EINVAL),
            Self::CapacityExceeded => reply(ENOMEM),
            Self::Alloc(e) => e.errno(),
            Self::Busy(_) => reply(EBUSY),
            Self::Driver(e) => e.errno(),
            Self::Corrupted => reply(EIO),
        }
    }

    /// `true` for consistency faults that must reach the panic path.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Corrupted)
    }
}

impl From<AllocError> for GraphError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

impl core::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownComponent(id) => write!(f, "unknown component {id}"),
            Self::UnknownPipeline(id) => write!(f, "unknown pipeline {id}"),
            Self::UnknownBuffer(id) => write!(f, "unknown buffer {id}"),
            Self::UnknownDriver(t) => write!(f, "no driver for type {t}"),
            Self::DuplicateComponent(id) => write!(f, "{id} already exists"),
            Self::DuplicatePipeline(id) => write!(f, "{id} already exists"),
            Self::DuplicateBuffer(id) => write!(f, "{id} already exists"),
            Self::DuplicateDriver(t) => write!(f, "type {t} already registered"),
            Self::CapacityExceeded => f.write_str("topology table full"),
            Self::BufferAttached(id) => write!(f, "{id} already connected"),
            Self::PipelineComplete(id) => write!(f, "{id} is complete"),
            Self::PipelineEmpty(id) => write!(f, "{id} has no components"),
            Self::PipelineIncomplete(id) => write!(f, "{id} is not complete"),
            Self::Busy(id) => write!(f, "{id} is busy"),
            Self::Alloc(e) => write!(f, "allocation failed: {e}"),
            Self::Driver(e) => write!(f, "driver refused: {e}"),
            Self::Corrupted => f.write_str("topology links corrupted"),
        }
    }
}

/// Errors of the Trigger Walk and the other pipeline walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerError {
    /// A capture start reached an inactive upstream pipeline whose source
    /// is not a hardware endpoint: "not ready yet", not "broken".
    NoData {
        /// The upstream pipeline that cannot supply data.
        pipeline: PipelineId,
    },
    /// A driver callback (or the state machine in front of it) refused.
    /// Components already visited keep their new state.
    Component {
        /// First component that failed.
        comp: CompId,
        /// Its error.
        error: CompError,
    },
    /// The walk reached a component that is mid-callback.
    Reentered(CompId),
    /// Lookup or consistency failure.
    Graph(GraphError),
}

impl TriggerError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::NoData { .. } => reply(ENODATA),
            Self::Component { error, .. } => error.errno(),
            Self::Reentered(_) => reply(EBUSY),
            Self::Graph(e) => e.errno(),
        }
    }

    /// `true` for faults that must reach the panic path.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        match self {
            Self::Reentered(_) => true,
            Self::Graph(e) => e.is_fatal(),
            Self::NoData { .. } | Self::Component { .. } => false,
        }
    }
}

impl From<GraphError> for TriggerError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

impl core::fmt::Display for TriggerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoData { pipeline } => write!(f, "{pipeline} cannot supply capture data"),
            Self::Component { comp, error } => write!(f, "{comp} failed: {error}"),
            Self::Reentered(comp) => write!(f, "walk re-entered {comp} mid-transition"),
            Self::Graph(e) => write!(f, "{e}"),
        }
    }
}

/// Errors of one copy pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CopyError {
    /// A component's copy failed: the pipeline is in xrun.
    Xrun {
        /// Failing component.
        comp: CompId,
        /// Its error.
        error: CompError,
    },
    /// Lookup failure.
    Graph(GraphError),
}

impl CopyError {
    /// Negative errno for the host notification.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::Xrun { error, .. } => error.errno(),
            Self::Graph(e) => e.errno(),
        }
    }
}

impl From<GraphError> for CopyError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

impl core::fmt::Display for CopyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Xrun { comp, error } => write!(f, "xrun at {comp}: {error}"),
            Self::Graph(e) => write!(f, "{e}"),
        }
    }
}

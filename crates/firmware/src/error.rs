use audio::{GraphError, PipelineId, TriggerError};
use idc::IdcError;
use platform::errno::{reply, EBUSY, EINVAL, ENODEV, ESHUTDOWN};
use platform::CoreId;
use schedule::ScheduleError;

use crate::ipc::IpcError;

/// Errors of the system layer. Each maps to the errno of the host reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemError {
    /// A [`SystemConfig`](crate::SystemConfig) field is out of range.
    InvalidConfig(&'static str),
    /// No pipeline with this id.
    UnknownPipeline(PipelineId),
    /// The core is not present on this part.
    InvalidCore(CoreId),
    /// The core is powered down.
    CoreDown(CoreId),
    /// The core still has scheduled work.
    CoreBusy(CoreId),
    /// Trigger or pipeline walk failure.
    Trigger(TriggerError),
    /// Topology failure.
    Graph(GraphError),
    /// Inter-core message failure.
    Idc(IdcError),
    /// Scheduler failure.
    Schedule(ScheduleError),
    /// Outbound host queue failure.
    Ipc(IpcError),
}

impl SystemError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidConfig(_) | Self::InvalidCore(_) => reply(EINVAL),
            Self::UnknownPipeline(_) => reply(ENODEV),
            Self::CoreDown(_) => reply(ESHUTDOWN),
            Self::CoreBusy(_) => reply(EBUSY),
            Self::Trigger(e) => e.errno(),
            Self::Graph(e) => e.errno(),
            Self::Idc(e) => e.errno(),
            Self::Schedule(e) => e.errno(),
            Self::Ipc(e) => e.errno(),
        }
    }

    /// Faults that go to the [`PanicSink`](crate::PanicSink) instead of a
    /// host reply.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        match self {
            Self::InvalidCore(_) => true,
            Self::Trigger(e) => e.is_fatal(),
            Self::Graph(e) => e.is_fatal(),
            Self::Idc(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl From<TriggerError> for SystemError {
    fn from(e: TriggerError) -> Self {
        Self::Trigger(e)
    }
}

impl From<GraphError> for SystemError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

impl From<IdcError> for SystemError {
    fn from(e: IdcError) -> Self {
        Self::Idc(e)
    }
}

impl From<ScheduleError> for SystemError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<IpcError> for SystemError {
    fn from(e: IpcError) -> Self {
        Self::Ipc(e)
    }
}

impl core::fmt::Display for SystemError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidConfig(field) => write!(f, "invalid config: {field}"),
            Self::UnknownPipeline(id) => write!(f, "unknown {id}"),
            Self::InvalidCore(core) => write!(f, "{core} not present"),
            Self::CoreDown(core) => write!(f, "{core} is powered down"),
            Self::CoreBusy(core) => write!(f, "{core} still has scheduled tasks"),
            Self::Trigger(e) => write!(f, "{e}"),
            Self::Graph(e) => write!(f, "{e}"),
            Self::Idc(e) => write!(f, "{e}"),
            Self::Schedule(e) => write!(f, "{e}"),
            Self::Ipc(e) => write!(f, "{e}"),
        }
    }
}

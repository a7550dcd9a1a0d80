//! Audio graph: ring buffers, components, pipelines and the Trigger Walk
//!
//! The topology is an arena addressed by host-assigned ids. Components talk
//! to each other only through [`CompBuffer`] rings; run-state changes travel
//! through the graph with [`Topology::trigger`], and the pipeline task moves
//! data with [`Topology::pipeline_copy`].
//!
//! ```text
//!   host ──▶ [comp] ──buf──▶ [comp] ──buf──▶ [dai]      pipeline 1 (core 0)
//!                               │
//!                               └──buf──▶ [comp]        pipeline 2 (core 1)
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

extern crate alloc;

pub mod buffer;
pub mod component;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod topology;
pub mod walk;

pub use buffer::{BufferError, CompBuffer};
pub use component::{
    CompConfig, CompError, CompInfo, ComponentDriver, ComponentOps, CopyIo, CopyStatus,
    EndpointKind, FrameFormat, StreamParams, TriggerOutcome,
};
pub use driver::DriverRegistry;
pub use error::{CopyError, GraphError, TriggerError};
pub use pipeline::{Direction, PipelineConfig, PipelineInfo};
pub use state::{CompState, TriggerCmd};
pub use topology::{BufferDesc, PipelineDesc, Topology};
pub use walk::{CopyStats, TriggerContext, WalkReport, WalkStatus};

/// Host-assigned component id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompId(pub u32);

/// Host-assigned buffer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferId(pub u32);

/// Host-assigned pipeline id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineId(pub u32);

impl core::fmt::Display for CompId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "comp{}", self.0)
    }
}

impl core::fmt::Display for BufferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

impl core::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ppl{}", self.0)
    }
}

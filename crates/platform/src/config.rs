//! Compile-time capacities shared by every crate in the workspace.
//!
//! All fixed-size tables (`heapless` collections, per-core arrays) are sized
//! from these constants. Runtime policy lives in the firmware crate's
//! `SystemConfig`.

/// Maximum number of DSP cores the core can address.
pub const MAX_CORES: usize = 4;

/// Index of the primary core (drains the host IPC queue, owns bring-up).
pub const PRIMARY_CORE: u8 = 0;

/// Maximum number of pipelines in one topology.
pub const MAX_PIPELINES: usize = 16;

/// Maximum number of components in one topology.
pub const MAX_COMPONENTS: usize = 64;

/// Maximum number of ring buffers in one topology.
pub const MAX_BUFFERS: usize = 64;

/// Maximum number of buffers attached to one side of a component.
pub const MAX_COMP_PORTS: usize = 8;

/// Maximum number of tasks per scheduler instance.
pub const MAX_TASKS: usize = 32;

/// Depth of the outbound host IPC queue.
pub const IPC_QUEUE_DEPTH: usize = 16;

/// Maximum payload carried by one outbound host message, in bytes.
pub const IPC_PAYLOAD_MAX: usize = 64;

/// Number of 32-bit words in the fixed-layout IDC record
/// (type word, two data words, target core).
pub const IDC_MSG_WORDS: usize = 4;

/// Words a receiving core can post back with its status: room for one
/// boundary list.
pub const IDC_REPLY_WORDS: usize = MAX_PIPELINES;

/// Default LL domain tick period in microseconds (1 ms audio tick).
pub const LL_TICK_PERIOD_US: u32 = 1000;

/// Default LL overrun budget in cycles (observability only).
pub const LL_MAX_RUN_CYCLES: u64 = 400_000;

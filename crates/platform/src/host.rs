//! Outbound host mailbox contract.
//!
//! The host wire encoding is not this crate's concern: a message is an
//! opaque header word plus a bounded payload.

use crate::config::IPC_PAYLOAD_MAX;

/// One message for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessage {
    /// Opaque header word (message class and type).
    pub header: u32,
    /// Opaque payload bytes.
    pub payload: heapless::Vec<u8, IPC_PAYLOAD_MAX>,
}

impl HostMessage {
    /// A message with an empty payload.
    #[must_use]
    pub const fn new(header: u32) -> Self {
        Self {
            header,
            payload: heapless::Vec::new(),
        }
    }

    /// A message carrying `payload`; `None` if it exceeds [`IPC_PAYLOAD_MAX`].
    #[must_use]
    pub fn with_payload(header: u32, payload: &[u8]) -> Option<Self> {
        let payload = heapless::Vec::from_slice(payload).ok()?;
        Some(Self { header, payload })
    }
}

/// The host has not yet consumed the previous message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostBusy;

impl core::fmt::Display for HostBusy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("host mailbox busy")
    }
}

/// Outbound window to the host driver.
pub trait HostMailbox: Send + Sync {
    /// Post `msg` to the host.
    ///
    /// # Errors
    ///
    /// Returns [`HostBusy`] while the host still owns the window; the caller
    /// keeps the message queued and retries later.
    fn send(&self, msg: &HostMessage) -> Result<(), HostBusy>;
}

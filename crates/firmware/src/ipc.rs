//! Outbound host message queue.
//!
//! Any core may queue a message; only the primary core drains the queue
//! into the host mailbox, from its idle loop. A message whose header is
//! already queued replaces the queued payload in place, so a burst of
//! position or xrun updates costs one slot.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;
use platform::config::IPC_QUEUE_DEPTH;
use platform::errno::{reply, EBUSY, ENOMEM};
use platform::{HostMailbox, HostMessage};

/// Where a new message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpcPriority {
    /// Behind everything already queued.
    Normal,
    /// In front of everything already queued.
    High,
}

/// Outbound queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpcError {
    /// Every slot is taken.
    QueueFull,
    /// The host window is still owned by the host.
    HostBusy,
}

impl IpcError {
    /// Negative errno.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::QueueFull => reply(ENOMEM),
            Self::HostBusy => reply(EBUSY),
        }
    }
}

impl core::fmt::Display for IpcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::QueueFull => "outbound queue full",
            Self::HostBusy => "host mailbox busy",
        })
    }
}

/// Bounded FIFO of messages for the host.
pub struct OutboundQueue {
    depth: usize,
    coalesce: bool,
    queue: Mutex<CriticalSectionRawMutex, RefCell<Deque<HostMessage, IPC_QUEUE_DEPTH>>>,
}

impl OutboundQueue {
    /// Queue holding at most `depth` messages (capped at
    /// [`IPC_QUEUE_DEPTH`]).
    #[must_use]
    pub fn new(depth: usize, coalesce: bool) -> Self {
        Self {
            depth: depth.min(IPC_QUEUE_DEPTH),
            coalesce,
            queue: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Queue `msg`.
    ///
    /// # Errors
    ///
    /// [`IpcError::QueueFull`] when no slot is free and no queued message
    /// shares its header.
    pub fn enqueue(&self, msg: HostMessage, priority: IpcPriority) -> Result<(), IpcError> {
        self.queue.lock(|q| {
            let mut q = q.borrow_mut();
            if self.coalesce {
                if let Some(queued) = q.iter_mut().find(|m| m.header == msg.header) {
                    queued.payload = msg.payload;
                    return Ok(());
                }
            }
            if q.len() >= self.depth {
                platform::warn!("ipc queue full, dropping {}", msg.header);
                return Err(IpcError::QueueFull);
            }
            let pushed = match priority {
                IpcPriority::Normal => q.push_back(msg),
                IpcPriority::High => q.push_front(msg),
            };
            pushed.map_err(|_| IpcError::QueueFull)
        })
    }

    /// Post queued messages to `host`, oldest first, until the queue is
    /// empty or the host is busy. Returns the number delivered.
    pub fn drain(&self, host: &dyn HostMailbox) -> usize {
        let mut sent = 0usize;
        while let Some(msg) = self.queue.lock(|q| q.borrow_mut().pop_front()) {
            if host.send(&msg).is_err() {
                platform::trace!("host busy, {} stays queued", msg.header);
                // Back to the head: nothing was queued in front of it.
                let _ = self.queue.lock(|q| q.borrow_mut().push_front(msg));
                break;
            }
            sent = sent.saturating_add(1);
        }
        sent
    }

    /// Post only the oldest message.
    ///
    /// # Errors
    ///
    /// [`IpcError::HostBusy`]; the message stays queued.
    pub fn send_one(&self, host: &dyn HostMailbox) -> Result<bool, IpcError> {
        let Some(msg) = self.queue.lock(|q| q.borrow_mut().pop_front()) else {
            return Ok(false);
        };
        if host.send(&msg).is_err() {
            let _ = self.queue.lock(|q| q.borrow_mut().push_front(msg));
            return Err(IpcError::HostBusy);
        }
        Ok(true)
    }

    /// Messages waiting.
    pub fn len(&self) -> usize {
        self.queue.lock(|q| q.borrow().len())
    }

    /// `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Headers in delivery order.
    pub fn headers(&self) -> heapless::Vec<u32, IPC_QUEUE_DEPTH> {
        self.queue
            .lock(|q| q.borrow().iter().map(|m| m.header).collect())
    }
}

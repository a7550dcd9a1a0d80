//! Mailboxes and the send / receive paths.
//!
//! There is one single-slot mailbox per ordered (source, target) core pair,
//! so two messages from A to B are always seen by B in send order. A slot
//! is claimed by the sender, filled, written back, and then the target's
//! doorbell is rung. The target copies the record out, runs its handler,
//! posts a status word plus any reply words and releases the slot.
//!
//! A blocking [`IdcBus::send`] only spins. Two cores that may wait on each
//! other use [`IdcBus::call`], which keeps handling the caller's own
//! mailboxes while it waits.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use platform::config::{IDC_MSG_WORDS, IDC_REPLY_WORDS, MAX_CORES};
use platform::{CacheOps, CoreId, CoreMask, InterCoreIrq};

use crate::error::IdcError;
use crate::message::{IdcMessage, IdcMsgType, IdcReply, SEQ_MASK};

/// How `send` treats an occupied mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendMode {
    /// Spin until the slot is free, then until the target acknowledged.
    Blocking,
    /// Fail with [`IdcError::Busy`] if the slot is occupied; do not wait
    /// for the acknowledgement.
    NonBlocking,
}

/// Per-mailbox counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxStats {
    /// Messages written into the slot.
    pub sent: u32,
    /// Messages the target handled.
    pub received: u32,
    /// Non-blocking sends refused because the slot was occupied.
    pub busy_rejections: u32,
}

#[derive(Default)]
struct Mailbox {
    /// Claimed by a sender until the target released it.
    busy: AtomicBool,
    /// A record is waiting to be read.
    ready: AtomicBool,
    words: [AtomicU32; IDC_MSG_WORDS],
    /// Sequence number of the last handled record.
    done: AtomicU32,
    status: AtomicI32,
    reply: [AtomicU32; IDC_REPLY_WORDS],
    reply_len: AtomicU32,
    sent: AtomicU32,
    received: AtomicU32,
    busy_rejections: AtomicU32,
}

impl Mailbox {
    fn region(&self) -> (usize, usize) {
        (
            self.words.as_ptr() as usize,
            core::mem::size_of_val(&self.words),
        )
    }

    fn reply_region(&self) -> (usize, usize) {
        (
            self.reply.as_ptr() as usize,
            core::mem::size_of_val(&self.reply),
        )
    }

    fn post_reply(&self, reply: &IdcReply) {
        for (word, value) in self.reply.iter().zip(reply.words()) {
            word.store(*value, Ordering::Relaxed);
        }
        let len = u32::try_from(reply.words().len()).unwrap_or(0);
        self.reply_len.store(len, Ordering::Relaxed);
    }

    fn take_reply(&self) -> IdcReply {
        let len = usize::try_from(self.reply_len.load(Ordering::Relaxed)).unwrap_or(0);
        self.reply
            .iter()
            .take(len)
            .map(|w| w.load(Ordering::Relaxed))
            .collect()
    }

    fn stats(&self) -> MailboxStats {
        MailboxStats {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Shared mailbox table for every core pair.
pub struct IdcBus {
    cores: usize,
    irq: Arc<dyn InterCoreIrq>,
    cache: Arc<dyn CacheOps>,
    powered: AtomicU32,
    next_seq: AtomicU32,
    slots: [[Mailbox; MAX_CORES]; MAX_CORES],
}

impl IdcBus {
    /// Bus for the first `cores` cores. Only the primary core starts
    /// powered.
    #[must_use]
    pub fn new(cores: usize, irq: Arc<dyn InterCoreIrq>, cache: Arc<dyn CacheOps>) -> Self {
        Self {
            cores: cores.min(MAX_CORES),
            irq,
            cache,
            powered: AtomicU32::new(CoreMask::single(CoreId::PRIMARY).bits()),
            next_seq: AtomicU32::new(0),
            slots: core::array::from_fn(|_| core::array::from_fn(|_| Mailbox::default())),
        }
    }

    fn slot(&self, source: CoreId, target: CoreId) -> Option<&Mailbox> {
        self.slots.get(source.index())?.get(target.index())
    }

    /// Record whether `core` accepts messages other than `PowerUp`.
    pub fn set_powered(&self, core: CoreId, powered: bool) {
        let bit = CoreMask::single(core).bits();
        if powered {
            self.powered.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.powered.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// `true` if `core` is marked powered.
    pub fn is_powered(&self, core: CoreId) -> bool {
        self.powered.load(Ordering::Acquire) & CoreMask::single(core).bits() != 0
    }

    /// Number of cores the bus serves.
    pub fn cores(&self) -> usize {
        self.cores
    }

    fn check_target(&self, source: CoreId, msg: &IdcMessage) -> Result<(), IdcError> {
        let target = msg.core;
        if target == source || target.index() >= self.cores {
            platform::warn!("idc {} from {} refused: invalid target", msg.kind, source);
            return Err(IdcError::InvalidCore(target));
        }
        if msg.kind != IdcMsgType::PowerUp && !self.is_powered(target) {
            platform::warn!("idc {} from {} refused: {} is down", msg.kind, source, target);
            return Err(IdcError::CoreDown(target));
        }
        Ok(())
    }

    /// Send `msg` from `source` to `msg.core`.
    ///
    /// A blocking send returns once the target handled the message and
    /// reports its status. A non-blocking send returns right after the
    /// doorbell, or with [`IdcError::Busy`] if the slot is occupied.
    ///
    /// # Errors
    ///
    /// Invalid or powered-down target, busy slot (non-blocking), or the
    /// target's error status (blocking).
    pub fn send(&self, source: CoreId, msg: IdcMessage, mode: SendMode) -> Result<(), IdcError> {
        let slot = self.post(source, msg, mode, core::hint::spin_loop)?;
        if let Some((slot, msg)) = slot {
            self.await_reply(slot, &msg, core::hint::spin_loop)?;
        }
        Ok(())
    }

    /// Blocking send that hands back the target's reply words.
    ///
    /// While it waits, records arriving for `source` go to `serve`, so two
    /// cores calling each other at once both make progress.
    ///
    /// # Errors
    ///
    /// Invalid or powered-down target, or the target's error status.
    pub fn call<R: Into<IdcReply>>(
        &self,
        source: CoreId,
        msg: IdcMessage,
        mut serve: impl FnMut(CoreId, &IdcMessage) -> Result<R, i32>,
    ) -> Result<IdcReply, IdcError> {
        let posted = self.post(source, msg, SendMode::Blocking, || {
            self.serve_or_spin(source, &mut serve);
        })?;
        let Some((slot, msg)) = posted else {
            return Ok(IdcReply::new());
        };
        self.await_reply(slot, &msg, || self.serve_or_spin(source, &mut serve))
    }

    fn serve_or_spin<R: Into<IdcReply>>(
        &self,
        core: CoreId,
        serve: &mut impl FnMut(CoreId, &IdcMessage) -> Result<R, i32>,
    ) {
        if self.has_pending(core) {
            self.handle_irq(core, serve);
        } else {
            core::hint::spin_loop();
        }
    }

    /// Claim the slot and ring the doorbell. Hands the slot back when the
    /// caller has to wait for the answer.
    fn post(
        &self,
        source: CoreId,
        msg: IdcMessage,
        mode: SendMode,
        mut wait: impl FnMut(),
    ) -> Result<Option<(&Mailbox, IdcMessage)>, IdcError> {
        self.check_target(source, &msg)?;
        let slot = self
            .slot(source, msg.core)
            .ok_or(IdcError::InvalidCore(msg.core))?;

        while slot
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if mode == SendMode::NonBlocking {
                slot.busy_rejections.fetch_add(1, Ordering::Relaxed);
                return Err(IdcError::Busy);
            }
            wait();
        }

        // Never 0: a fresh slot reports 0 as its last handled record.
        let seq = self
            .next_seq
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_rem(SEQ_MASK)
            .wrapping_add(1);
        let msg = msg.with_seq(seq);
        for (word, value) in slot.words.iter().zip(msg.to_words()) {
            word.store(value, Ordering::Relaxed);
        }
        let (addr, len) = slot.region();
        self.cache.writeback_region(addr, len);
        slot.ready.store(true, Ordering::Release);
        slot.sent.fetch_add(1, Ordering::Relaxed);
        self.irq.raise(msg.core, source);
        platform::debug!("idc {} -> {}", source, msg);

        Ok(match mode {
            SendMode::NonBlocking => None,
            SendMode::Blocking => Some((slot, msg)),
        })
    }

    fn await_reply(&self, slot: &Mailbox, msg: &IdcMessage, mut wait: impl FnMut()) -> Result<IdcReply, IdcError> {
        while slot.done.load(Ordering::Acquire) != msg.seq {
            wait();
        }
        let (addr, len) = slot.reply_region();
        self.cache.invalidate_region(addr, len);
        match slot.status.load(Ordering::Acquire) {
            0 => Ok(slot.take_reply()),
            errno => {
                platform::warn!("idc {} to {} failed: {}", msg.kind, msg.core, errno);
                Err(IdcError::Remote(errno))
            }
        }
    }

    /// Receive side of the doorbell on `core`: handle every waiting
    /// record, in source-core order.
    ///
    /// `handler` answers with reply words (or `()`) or a negative errno,
    /// which is posted back to the sender. Returns the number of records
    /// handled.
    pub fn handle_irq<R: Into<IdcReply>>(
        &self,
        core: CoreId,
        mut handler: impl FnMut(CoreId, &IdcMessage) -> Result<R, i32>,
    ) -> usize {
        // The doorbell only says "look"; the slots are the truth.
        let _ = self.irq.take_pending(core);
        let mut handled = 0usize;
        for source in CoreId::all().take(self.cores) {
            if source == core {
                continue;
            }
            let Some(slot) = self.slot(source, core) else {
                continue;
            };
            // Claimed here so a record is handled once.
            if !slot.ready.swap(false, Ordering::AcqRel) {
                continue;
            }
            let (addr, len) = slot.region();
            self.cache.invalidate_region(addr, len);
            let words: [u32; IDC_MSG_WORDS] =
                core::array::from_fn(|i| slot.words.get(i).map_or(0, |w| w.load(Ordering::Relaxed)));

            let (seq, answer) = match IdcMessage::from_words(words) {
                Ok(msg) => (msg.seq, handler(source, &msg).map(Into::into)),
                Err(err) => {
                    platform::error!("idc from {}: {}", source, err);
                    let seq = words.first().map_or(0, |w| w & SEQ_MASK);
                    (seq, Err(err.errno()))
                }
            };
            let status = match answer {
                Ok(reply) => {
                    slot.post_reply(&reply);
                    0
                }
                Err(errno) => {
                    slot.post_reply(&IdcReply::new());
                    errno
                }
            };
            let (addr, len) = slot.reply_region();
            self.cache.writeback_region(addr, len);
            slot.status.store(status, Ordering::Relaxed);
            slot.received.fetch_add(1, Ordering::Relaxed);
            slot.done.store(seq, Ordering::Release);
            slot.busy.store(false, Ordering::Release);
            handled = handled.saturating_add(1);
        }
        handled
    }

    /// `true` if a record is waiting for `core`.
    pub fn has_pending(&self, core: CoreId) -> bool {
        CoreId::all()
            .take(self.cores)
            .filter_map(|source| self.slot(source, core))
            .any(|slot| slot.ready.load(Ordering::Acquire))
    }

    /// Counters of the `source -> target` mailbox.
    pub fn stats(&self, source: CoreId, target: CoreId) -> MailboxStats {
        self.slot(source, target)
            .map(Mailbox::stats)
            .unwrap_or_default()
    }
}

//! Fixed-layout IDC record.
//!
//! ```text
//! word 0  type << 24 | seq (24 bits)
//! word 1  data0
//! word 2  data1
//! word 3  target core
//! ```
//!
//! The record is copied into the mailbox slot; the sender keeps its copy
//! and the receiver only reads a snapshot.

use platform::config::{IDC_MSG_WORDS, IDC_REPLY_WORDS};
use platform::CoreId;

use crate::error::IdcError;

const TYPE_SHIFT: u32 = 24;
pub(crate) const SEQ_MASK: u32 = 0x00FF_FFFF;

/// What the destination core is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IdcMsgType {
    /// Bring the core up.
    PowerUp = 1,
    /// Park the core.
    PowerDown = 2,
    /// Run a Trigger Walk on a local pipeline.
    Trigger = 3,
    /// Deliver a notification.
    Notify = 4,
    /// Run the prepare walk on a local pipeline.
    Prepare = 5,
    /// Run the reset walk on a local pipeline.
    Reset = 6,
}

impl IdcMsgType {
    /// Decode the type byte.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::PowerUp,
            2 => Self::PowerDown,
            3 => Self::Trigger,
            4 => Self::Notify,
            5 => Self::Prepare,
            6 => Self::Reset,
            _ => return None,
        })
    }
}

impl core::fmt::Display for IdcMsgType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::PowerUp => "power-up",
            Self::PowerDown => "power-down",
            Self::Trigger => "trigger",
            Self::Notify => "notify",
            Self::Prepare => "prepare",
            Self::Reset => "reset",
        })
    }
}

/// One inter-core message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdcMessage {
    /// Message type.
    pub kind: IdcMsgType,
    /// Sequence number, assigned by the bus on send.
    pub seq: u32,
    /// First payload word (pipeline id for walk requests).
    pub data0: u32,
    /// Second payload word (trigger command for `Trigger`).
    pub data1: u32,
    /// Destination core.
    pub core: CoreId,
}

impl IdcMessage {
    /// Message with the given payload; `seq` is filled in on send.
    #[must_use]
    pub const fn new(kind: IdcMsgType, core: CoreId, data0: u32, data1: u32) -> Self {
        Self {
            kind,
            seq: 0,
            data0,
            data1,
            core,
        }
    }

    /// Ask `core` to power up.
    #[must_use]
    pub const fn power_up(core: CoreId) -> Self {
        Self::new(IdcMsgType::PowerUp, core, 0, 0)
    }

    /// Ask `core` to power down.
    #[must_use]
    pub const fn power_down(core: CoreId) -> Self {
        Self::new(IdcMsgType::PowerDown, core, 0, 0)
    }

    /// Ask `core` to trigger `pipeline` with an encoded command.
    #[must_use]
    pub const fn trigger(core: CoreId, pipeline: u32, cmd: u32) -> Self {
        Self::new(IdcMsgType::Trigger, core, pipeline, cmd)
    }

    /// Notification with two payload words.
    #[must_use]
    pub const fn notify(core: CoreId, data0: u32, data1: u32) -> Self {
        Self::new(IdcMsgType::Notify, core, data0, data1)
    }

    /// Ask `core` to prepare `pipeline`.
    #[must_use]
    pub const fn prepare(core: CoreId, pipeline: u32) -> Self {
        Self::new(IdcMsgType::Prepare, core, pipeline, 0)
    }

    /// Ask `core` to reset `pipeline`.
    #[must_use]
    pub const fn reset(core: CoreId, pipeline: u32) -> Self {
        Self::new(IdcMsgType::Reset, core, pipeline, 0)
    }

    /// Same message with sequence number `seq` (truncated to 24 bits).
    #[must_use]
    pub const fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq & SEQ_MASK;
        self
    }

    /// Encode into the wire record.
    #[must_use]
    pub fn to_words(&self) -> [u32; IDC_MSG_WORDS] {
        let kind = u32::from(self.kind as u8).checked_shl(TYPE_SHIFT).unwrap_or(0);
        let type_word = kind | (self.seq & SEQ_MASK);
        [type_word, self.data0, self.data1, u32::from(self.core.get())]
    }

    /// Decode a wire record.
    ///
    /// # Errors
    ///
    /// [`IdcError::Malformed`] for an unknown type byte or core id.
    pub fn from_words(words: [u32; IDC_MSG_WORDS]) -> Result<Self, IdcError> {
        let [type_word, data0, data1, core] = words;
        let raw_type = type_word.checked_shr(TYPE_SHIFT).unwrap_or(0);
        let kind = u8::try_from(raw_type)
            .ok()
            .and_then(IdcMsgType::from_raw)
            .ok_or(IdcError::Malformed(type_word))?;
        let core = CoreId::try_from(core).map_err(|_| IdcError::Malformed(type_word))?;
        Ok(Self {
            kind,
            seq: type_word & SEQ_MASK,
            data0,
            data1,
            core,
        })
    }
}

impl core::fmt::Display for IdcMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} #{} to {} ({:#x}, {:#x})",
            self.kind, self.seq, self.core, self.data0, self.data1
        )
    }
}

/// Payload words a receiver posts back next to its status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdcReply {
    words: heapless::Vec<u32, IDC_REPLY_WORDS>,
}

impl IdcReply {
    /// Reply with no payload.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: heapless::Vec::new(),
        }
    }

    /// Append one word; hands it back when the reply is full.
    ///
    /// # Errors
    ///
    /// The word that did not fit.
    pub fn push(&mut self, word: u32) -> Result<(), u32> {
        self.words.push(word)
    }

    /// Posted words, in order.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// `true` if nothing was posted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl From<()> for IdcReply {
    fn from((): ()) -> Self {
        Self::new()
    }
}

impl FromIterator<u32> for IdcReply {
    /// Words past [`IDC_REPLY_WORDS`] are dropped.
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().take(IDC_REPLY_WORDS).collect(),
        }
    }
}

use platform::errno::{reply, EBUSY, EINVAL, ESHUTDOWN};
use platform::CoreId;

/// IDC send and receive errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdcError {
    /// Non-blocking send found the mailbox occupied. Nothing was written.
    Busy,
    /// The destination is the sender itself or beyond the configured
    /// core count.
    InvalidCore(CoreId),
    /// The destination is powered down.
    CoreDown(CoreId),
    /// The destination handled the message and answered with an errno.
    Remote(i32),
    /// A mailbox held a record that does not decode.
    Malformed(u32),
}

impl IdcError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::Busy => reply(EBUSY),
            Self::InvalidCore(_) | Self::Malformed(_) => reply(EINVAL),
            Self::CoreDown(_) => reply(ESHUTDOWN),
            Self::Remote(errno) => errno,
        }
    }

    /// Faults that indicate a broken caller or corrupted shared memory.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::InvalidCore(_) | Self::Malformed(_))
    }
}

impl core::fmt::Display for IdcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => f.write_str("mailbox busy"),
            Self::InvalidCore(core) => write!(f, "cannot send to {core}"),
            Self::CoreDown(core) => write!(f, "{core} is powered down"),
            Self::Remote(errno) => write!(f, "remote core answered {errno}"),
            Self::Malformed(word) => write!(f, "malformed record {word:#010x}"),
        }
    }
}

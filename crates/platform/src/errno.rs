//! POSIX error numbers carried in host replies and IDC status words.
//!
//! Replies carry the negated value (`-ENODATA`), matching what the host
//! driver expects.

/// Operation not permitted on this core / state.
pub const EACCES: i32 = 13;
/// Out of memory.
pub const ENOMEM: i32 = 12;
/// Resource busy (mailbox occupied).
pub const EBUSY: i32 = 16;
/// No such device (unknown component / pipeline id).
pub const ENODEV: i32 = 19;
/// Invalid argument.
pub const EINVAL: i32 = 22;
/// Boundary stop: the far side must be triggered separately.
pub const EPIPE: i32 = 32;
/// No data available from an inactive capture source.
pub const ENODATA: i32 = 61;
/// Cannot send after transport endpoint shutdown (core powered down).
pub const ESHUTDOWN: i32 = 108;
/// Operation timed out / fatal consistency fault surfaced as an errno.
pub const EIO: i32 = 5;

/// Negate an errno for a reply word.
#[must_use]
pub const fn reply(errno: i32) -> i32 {
    0i32.wrapping_sub(errno)
}

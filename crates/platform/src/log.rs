//! Logging front-end shared by every crate in the workspace.
//!
//! DSP builds enable `defmt`, host builds enable `tracing`. With neither
//! feature the macros expand to nothing but still type-check their format
//! arguments. Format strings must stick to `{}` so both backends accept them.
//!
//! Crates calling these macros under `defmt` must depend on `defmt`
//! themselves; its macros expand to absolute `defmt::` paths.

#[cfg(feature = "tracing")]
pub use tracing as __tracing;

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    (trace, $($arg:tt)*) => { ::defmt::trace!($($arg)*) };
    (debug, $($arg:tt)*) => { ::defmt::debug!($($arg)*) };
    (info, $($arg:tt)*) => { ::defmt::info!($($arg)*) };
    (warn, $($arg:tt)*) => { ::defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

#[cfg(all(feature = "tracing", not(feature = "defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    (trace, $($arg:tt)*) => { $crate::log::__tracing::trace!($($arg)*) };
    (debug, $($arg:tt)*) => { $crate::log::__tracing::debug!($($arg)*) };
    (info, $($arg:tt)*) => { $crate::log::__tracing::info!($($arg)*) };
    (warn, $($arg:tt)*) => { $crate::log::__tracing::warn!($($arg)*) };
    (error, $($arg:tt)*) => { $crate::log::__tracing::error!($($arg)*) };
}

#[cfg(not(any(feature = "tracing", feature = "defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}

/// Log at trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::__log!(trace, $($arg)*) };
}

/// Log at debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::__log!(debug, $($arg)*) };
}

/// Log at info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::__log!(info, $($arg)*) };
}

/// Log at warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::__log!(warn, $($arg)*) };
}

/// Log at error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::__log!(error, $($arg)*) };
}

//! Logging shims.
//!
//! Forward to `defmt` on hardware builds and to `tracing` on host builds.
//! With neither feature the arguments are still type-checked but nothing is
//! emitted. Format strings must stick to plain `{}` placeholders so both
//! backends accept them.
//!
//! Each crate keeps its own copy on purpose: the `cfg(feature)` checks inside
//! the macros resolve against the expanding crate's features and dependencies.
#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = ::core::format_args!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = ::core::format_args!($($arg)*);
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);
        #[cfg(feature = "tracing")]
        ::tracing::info!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = ::core::format_args!($($arg)*);
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = ::core::format_args!($($arg)*);
    }};
}

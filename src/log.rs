//! Conditional tracing macros.
//!
//! With the `tracing` feature enabled these forward to `tracing`'s macros;
//! without it they expand to nothing, so instrumented call sites cost zero
//! at runtime.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, trace};

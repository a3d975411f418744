//! The fallible-result convention.
//!
//! Conditions a caller can reasonably recover from (the host allocator ran
//! dry, a size computation overflowed) travel as [`ErrorOr`] values and are
//! forwarded with `?`. Broken invariants are programmer errors and go through
//! [`verify!`](crate::verify) instead, which never returns.

use thiserror::Error;

/// Recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error
{
    /// The host allocator could not satisfy a request.
    #[error("out of memory allocating {size} bytes")]
    OutOfMemory
    {
        size: usize,
    },

    /// A size or capacity computation does not fit in `usize`.
    #[error("arithmetic overflow computing {what}")]
    Overflow
    {
        what: &'static str,
    },

    /// An argument is outside the range the operation accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidConfiguration
    {
        key: &'static str,
        value: String,
    },
}

pub type ErrorOr<T> = Result<T, Error>;

/// Assert a runtime invariant.
///
/// On failure the violation is logged and the process aborts; a violated
/// invariant is a bug in the calling program, never a value to inspect.
#[macro_export]
macro_rules! verify {
    ($cond:expr) => {
        if !$cond {
            $crate::error::fatal(concat!("VERIFY(", stringify!($cond), ") failed"))
        }
    };
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            $crate::error::fatal(&format!($($msg)+))
        }
    };
}

/// Unwrap an [`ErrorOr`], turning a recoverable error into a fatal one.
#[macro_export]
macro_rules! must {
    ($res:expr) => {
        match $res {
            Ok(it) => it,
            Err(err) => $crate::error::fatal(&format!("MUST({}) failed: {}", stringify!($res), err)),
        }
    };
}

/// Turns the unwind out of [`fatal`] into an abort once the panic hook has
/// reported the message.
#[cfg(not(test))]
struct AbortOnUnwind;

#[cfg(not(test))]
impl Drop for AbortOnUnwind
{
    fn drop(&mut self) { std::process::abort() }
}

/// Report a violated invariant and terminate. Unit tests of this crate
/// unwind instead, so the violation can be observed with `should_panic`.
#[doc(hidden)]
#[cold]
#[track_caller]
pub fn fatal(msg: &str) -> !
{
    log::error!("{msg}");
    #[cfg(not(test))]
    let _abort = AbortOnUnwind;
    panic!("{msg}")
}

/// Map a failed hash-table reservation of `additional` entries of `T`.
pub(crate) fn reserve_failed<T>(additional: usize) -> Error
{
    match additional.checked_mul(std::mem::size_of::<T>()) {
        Some(size) => Error::OutOfMemory { size },
        None => Error::Overflow {
            what: "table capacity",
        },
    }
}

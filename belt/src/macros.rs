//! Utility macros for error handling.
//!
//! These macros build [`crate::error::BeltError`] values with consistent
//! formatting and little boilerplate.

/// Creates a [`crate::error::BeltError`] from an error kind and description.
///
/// The optional third argument is stringified and attached as detail.
///
/// # Examples
/// ```rust,no_run
/// use belt::belt_error;
/// use belt::error::ErrorKind;
///
/// let error = belt_error!(ErrorKind::InvalidConfiguration, "Invalid input");
///
/// let error = belt_error!(
///     ErrorKind::DecodeFailed,
///     "Failed to decode input line",
///     format!("line {}", 42)
/// );
/// ```
#[macro_export]
macro_rules! belt_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::BeltError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::BeltError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::BeltError`] from the current function.
///
/// # Examples
/// ```rust,no_run
/// use belt::bail;
/// use belt::error::{BeltResult, ErrorKind};
///
/// fn validate_parallelism(value: usize) -> BeltResult<usize> {
///     if value == 0 {
///         bail!(ErrorKind::InvalidConfiguration, "Parallelism must be at least 1");
///     }
///     Ok(value)
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::belt_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::belt_error!($kind, $desc, $detail))
    };
}

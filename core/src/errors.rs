//! Error kinds raised while binding, configuring and running the operator.
//!
//! Everything fallible returns a [`RoiResult`], an `anyhow::Result`. The typed
//! [`RoiAlignError`] travels inside the `anyhow::Error` so callers can tell the
//! kinds apart with `downcast_ref`.
use crate::datum::DatumType;
use std::fmt;

pub type RoiResult<T> = anyhow::Result<T>;

#[derive(Debug, Clone, PartialEq)]
pub enum RoiAlignError {
    /// A configuration field is missing, mistyped or out of range.
    Configuration(String),
    /// Pooling mode other than average.
    UnsupportedMode(i32),
    /// Input or output tensor shape is malformed or inconsistent.
    Shape(String),
    /// Element type or memory layout the operator can not work with.
    Format(String),
    Serialization { expected: usize, got: usize },
    /// Lifecycle transition attempted from the wrong state.
    State(String),
}

impl RoiAlignError {
    pub fn configuration(msg: impl Into<String>) -> RoiAlignError {
        RoiAlignError::Configuration(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> RoiAlignError {
        RoiAlignError::Shape(msg.into())
    }

    pub fn format(dt: DatumType) -> RoiAlignError {
        RoiAlignError::Format(format!("{dt:?} tensors are not supported, expected F32"))
    }

    pub fn state(msg: impl Into<String>) -> RoiAlignError {
        RoiAlignError::State(msg.into())
    }
}

impl fmt::Display for RoiAlignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoiAlignError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            RoiAlignError::UnsupportedMode(mode) => {
                write!(f, "Unsupported pooling mode {mode}: only 0 (average) is implemented")
            }
            RoiAlignError::Shape(msg) => write!(f, "Shape error: {msg}"),
            RoiAlignError::Format(msg) => write!(f, "Format error: {msg}"),
            RoiAlignError::Serialization { expected, got } => write!(
                f,
                "Serialization error: expected a buffer of {expected} bytes, got {got}"
            ),
            RoiAlignError::State(msg) => write!(f, "Invalid lifecycle transition: {msg}"),
        }
    }
}

impl std::error::Error for RoiAlignError {}

/// Find the typed error kind of a failure, if any, looking through contexts.
pub fn error_kind(err: &anyhow::Error) -> Option<&RoiAlignError> {
    err.chain().find_map(|e| e.downcast_ref::<RoiAlignError>())
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kind_survives_context() {
        let err: anyhow::Error = Err::<(), _>(RoiAlignError::UnsupportedMode(1))
            .context("binding ROIAlignPlugin fields")
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(&RoiAlignError::UnsupportedMode(1)));
        assert!(format!("{err:#}").contains("Unsupported pooling mode 1"));
    }

    #[test]
    fn plain_errors_have_no_kind() {
        let err = anyhow::anyhow!("something else");
        assert!(error_kind(&err).is_none());
    }
}

//! Fatal contract violations raised by kernels and their setup.
//!
//! None of these errors are recoverable at the kernel layer: a violation means the nonlinear
//! solve would be corrupted, so every error is propagated to the caller's assembly pass, which
//! is expected to abort. Errors travel as [`eyre::Report`]s; the underlying [`KernelError`] can be
//! recovered with [`eyre::Report::downcast_ref`].
use crate::kernel::CalcMode;
use crate::materials::MaterialKind;
use log::error;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A raw calculation mode value does not name any known mode.
    UnknownMode(String),
    /// The model does not implement the requested calculation mode.
    UnsupportedMode { model: String, mode: CalcMode },
    /// No kernel is registered under the requested model name.
    UnknownModel(String),
    /// A material property required by the model is absent from the bundle.
    MissingMaterial { kind: MaterialKind, name: String },
    /// A material property evaluated to NaN or infinity.
    NonFiniteMaterial { name: String },
    /// A caller-supplied buffer or vector is too small or otherwise has the wrong size.
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The spatial dimension is not 1, 2 or 3.
    InvalidDimension(usize),
    /// History was read, mutated or committed before `InitHistoryVariable` ran for the point.
    HistoryNotInitialized { point: usize },
}

impl KernelError {
    /// Logs the error and converts it into a report ready to be propagated.
    pub fn fatal(self) -> eyre::Report {
        error!("{}", self);
        eyre::Report::new(self)
    }
}

impl Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            KernelError::UnknownMode(mode) => write!(f, "unknown calculation mode '{}'", mode),
            KernelError::UnsupportedMode { model, mode } => {
                write!(f, "unsupported calculation mode {:?} in {} element", mode, model)
            }
            KernelError::UnknownModel(model) => write!(f, "no element kernel registered for model '{}'", model),
            KernelError::MissingMaterial { kind, name } => {
                write!(f, "missing {} material property '{}'", kind, name)
            }
            KernelError::NonFiniteMaterial { name } => {
                write!(f, "material property '{}' is not finite", name)
            }
            KernelError::SizeMismatch { what, expected, actual } => {
                write!(f, "size mismatch for {}: expected at least {}, got {}", what, expected, actual)
            }
            KernelError::InvalidDimension(dim) => write!(f, "invalid spatial dimension {}", dim),
            KernelError::HistoryNotInitialized { point } => {
                write!(f, "history of integration point {} used before initialization", point)
            }
        }
    }
}

impl Error for KernelError {}

/// Fails with [`KernelError::SizeMismatch`] if `actual < expected`.
pub(crate) fn ensure_len(what: &'static str, expected: usize, actual: usize) -> eyre::Result<()> {
    if actual < expected {
        Err(KernelError::SizeMismatch { what, expected, actual }.fatal())
    } else {
        Ok(())
    }
}

/// Fails with [`KernelError::SizeMismatch`] if `actual != expected`.
pub(crate) fn ensure_exact_len(what: &'static str, expected: usize, actual: usize) -> eyre::Result<()> {
    if actual != expected {
        Err(KernelError::SizeMismatch { what, expected, actual }.fatal())
    } else {
        Ok(())
    }
}

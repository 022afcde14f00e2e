//! Error types for the measurement engine.
//!
//! Every error here is terminal: the engine's value is measurement accuracy,
//! and retrying or continuing past any of these failures could silently
//! produce a plausible-looking but wrong number. No variant is ever
//! swallowed or retried.

use std::fmt;
use std::io;

use crate::arch::CpuArch;

/// Fatal failures of the measurement engine.
#[derive(Debug)]
pub enum Error {
    /// No retirement rate is known for this CPU and hardware-counter mode
    /// does not apply to it. No measurement is possible.
    UnsupportedArch(CpuArch),

    /// The detected CPU requires hardware-counter mode, but the APERF MSR
    /// could not be read during the startup probe (missing msr driver or
    /// insufficient privileges).
    AperfUnavailable,

    /// A worker thread could not pin itself to its assigned core. An
    /// unpinned worker invalidates every subsequent cycle measurement.
    AffinityBind {
        /// Logical core the worker was assigned to.
        core: usize,
    },

    /// An MSR read failed mid-measurement, after hardware-counter mode had
    /// already been committed to.
    MsrRead {
        /// Logical core whose MSR device failed.
        core: usize,
        /// MSR register number.
        register: u32,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The OS refused to spawn a worker thread.
    Spawn(io::Error),

    /// A worker thread panicked before returning a sample.
    WorkerPanic {
        /// Logical core the worker was assigned to.
        core: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedArch(arch) => write!(
                f,
                "unsupported architecture: family {}, model {}, stepping {}",
                arch.family, arch.model, arch.stepping
            ),
            Error::AperfUnavailable => write!(
                f,
                "failed to read the APERF MSR (is the msr driver loaded and are you root?)"
            ),
            Error::AffinityBind { core } => {
                write!(f, "unable to bind worker thread to core {core}")
            }
            Error::MsrRead {
                core,
                register,
                source,
            } => write!(f, "failed to read MSR {register:#x} on core {core}: {source}"),
            Error::Spawn(e) => write!(f, "failed to spawn worker thread: {e}"),
            Error::WorkerPanic { core } => {
                write!(f, "worker thread for core {core} panicked")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MsrRead { source, .. } | Error::Spawn(source) => Some(source),
            _ => None,
        }
    }
}

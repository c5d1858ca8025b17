//! Exit code logic for the process.

use std::process::ExitCode;

use hb_downloader_core::SyncReport;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The run reached its end. Per-file failures do not change this.
    Success,
    /// A fatal error stopped the run.
    Failure,
    /// The user interrupted the run.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Maps a finished run to the process exit outcome.
pub(crate) fn determine_exit_outcome(report: &SyncReport) -> ProcessExit {
    if report.cancelled {
        ProcessExit::Interrupted
    } else {
        ProcessExit::Success
    }
}

//! Run mode and the terminal outcome of one agent invocation.

/// How long the agent lives for one `run` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Unbounded: keep fetching and dispatching jobs until shutdown
    Service,
    /// Dispatch exactly one job (or one update), then exit
    RunOnce,
}

impl RunMode {
    /// True for the single-job lifetime
    pub fn is_run_once(self) -> bool {
        matches!(self, RunMode::RunOnce)
    }
}

/// Terminal outcome of one invocation, computed exactly once at exit.
///
/// Cancellation is deliberately absent: a canceled run surfaces as
/// `DroverError::Canceled`, never as a return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// The invocation finished its work
    Success,
    /// The invocation failed and must not be retried as-is
    TerminatedError,
    /// The invocation failed in a way worth retrying
    RetryableError,
    /// The agent is being replaced by a newer version
    Updating,
    /// A run-once invocation exited to self-update instead of running a job
    RunOnceUpdating,
}

impl ReturnCode {
    /// Process exit status for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            ReturnCode::Success => 0,
            ReturnCode::TerminatedError => 1,
            ReturnCode::RetryableError => 2,
            ReturnCode::Updating => 3,
            ReturnCode::RunOnceUpdating => 4,
        }
    }

    /// True when the outcome should be treated as a successful exit
    pub fn is_success(self) -> bool {
        matches!(self, ReturnCode::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_is_run_once() {
        assert!(RunMode::RunOnce.is_run_once());
        assert!(!RunMode::Service.is_run_once());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ReturnCode::Success.exit_code(), 0);
        assert_eq!(ReturnCode::TerminatedError.exit_code(), 1);
        assert_eq!(ReturnCode::RetryableError.exit_code(), 2);
        assert_eq!(ReturnCode::Updating.exit_code(), 3);
        assert_eq!(ReturnCode::RunOnceUpdating.exit_code(), 4);
    }

    #[test]
    fn test_is_success() {
        assert!(ReturnCode::Success.is_success());
        assert!(!ReturnCode::TerminatedError.is_success());
        assert!(!ReturnCode::RunOnceUpdating.is_success());
    }
}

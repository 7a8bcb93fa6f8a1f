//! Scheduler error types

/// Errors reported by scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `initialize` called on an engine that is already initialized
    #[error("Scheduler already initialized")]
    AlreadyInitialized,

    /// Operation invoked before `initialize`
    #[error("Scheduler not initialized")]
    NotInitialized,

    /// Time quantum below the minimum of 1
    #[error("Invalid time quantum: {0}")]
    InvalidQuantum(u32),

    /// More I/O event classes than the engine supports
    #[error("Too many I/O event classes: {0}")]
    TooManyIoEvents(u32),

    /// Priority outside `[0, MAX_PRIORITY]`
    #[error("Invalid priority: {0}")]
    InvalidPriority(u32),

    /// I/O event class outside `[0, io_events)`
    #[error("Invalid I/O event class: {0}")]
    InvalidIoEvent(u32),

    /// The OS refused to spawn an execution carrier thread
    #[error("Failed to spawn execution carrier: {0}")]
    CarrierSpawn(#[from] std::io::Error),

    /// A token-holder operation was invoked while no thread holds the token
    #[error("No thread is currently running")]
    NoRunningThread,

    /// A handshake channel was closed while a thread was parked on it
    #[error("Handshake channel disconnected")]
    Disconnected,
}

/// Result alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SchedulerError::InvalidQuantum(0).to_string(),
            "Invalid time quantum: 0"
        );
        assert_eq!(
            SchedulerError::InvalidIoEvent(7).to_string(),
            "Invalid I/O event class: 7"
        );
        assert_eq!(
            SchedulerError::NotInitialized.to_string(),
            "Scheduler not initialized"
        );
    }

    #[test]
    fn test_carrier_spawn_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
        let err: SchedulerError = io.into();
        assert!(matches!(err, SchedulerError::CarrierSpawn(_)));
    }
}

//! Engine configuration

use crate::error::{SchedulerError, SchedulerResult};

/// Highest priority a logical thread may be created with
pub const MAX_PRIORITY: u32 = 31;

/// Highest number of I/O event classes an engine may be configured with
pub const MAX_IO_EVENTS: u32 = 256;

/// Scheduler configuration, fixed at initialization
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of ticks a thread may run before becoming eligible for preemption
    pub time_quantum: u32,

    /// Number of I/O event classes threads may wait on
    pub io_events: u32,
}

impl SchedulerConfig {
    /// Create a validated configuration
    pub fn new(time_quantum: u32, io_events: u32) -> SchedulerResult<Self> {
        let config = Self {
            time_quantum,
            io_events,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration bounds
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.time_quantum < 1 {
            return Err(SchedulerError::InvalidQuantum(self.time_quantum));
        }
        if self.io_events > MAX_IO_EVENTS {
            return Err(SchedulerError::TooManyIoEvents(self.io_events));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = SchedulerConfig::new(1, 0).unwrap();
        assert_eq!(config.time_quantum, 1);
        assert_eq!(config.io_events, 0);

        let config = SchedulerConfig::new(100, MAX_IO_EVENTS).unwrap();
        assert_eq!(config.io_events, MAX_IO_EVENTS);
    }

    #[test]
    fn test_zero_quantum_rejected() {
        let err = SchedulerConfig::new(0, 4).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidQuantum(0)));
    }

    #[test]
    fn test_too_many_io_events_rejected() {
        let err = SchedulerConfig::new(5, MAX_IO_EVENTS + 1).unwrap_err();
        assert!(matches!(err, SchedulerError::TooManyIoEvents(_)));
    }
}

use std::sync::Arc;
use std::time::Duration;

use skyward_flow::{BackoffPolicy, BookingFlow, FlowSettings};
use skyward_store::app_config::{PollScheduleConfig, PollingConfig};

use crate::middleware::Resiliency;

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<BookingFlow>,
    pub resiliency: Arc<Resiliency>,
}

fn backoff(schedule: &PollScheduleConfig) -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: schedule.max_attempts,
        fast_attempts: schedule.fast_attempts,
        fast_interval: Duration::from_millis(schedule.fast_interval_ms),
        slow_interval: Duration::from_millis(schedule.slow_interval_ms),
    }
}

pub fn flow_settings(polling: &PollingConfig) -> FlowSettings {
    FlowSettings {
        verification: backoff(&polling.verification),
        ticketing: backoff(&polling.ticket),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedules_match_built_in_policies() {
        let settings = flow_settings(&PollingConfig::default());
        assert_eq!(settings, FlowSettings::default());
    }
}

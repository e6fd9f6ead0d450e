//! Helpers shared by unit tests

use std::sync::Mutex;
use std::time::Duration;

use crate::retry::Sleeper;

/// Records backoff delays instead of sleeping
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

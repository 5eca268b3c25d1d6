use chrono::{Local, NaiveDateTime};

/// Wall-clock source for the session cutoff and the save interval.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local exchange-session time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

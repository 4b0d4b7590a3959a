//! Mock capabilities.

use std::time::Duration;

use evset_core::timing::{TimingOracle, Victim};
use mockall::mock;

// Timing oracle with programmable readings.
mock! {
    pub Clock {}
    impl TimingOracle for Clock {
        fn now(&mut self) -> Duration;
    }
}

// Victim whose touches can be counted.
mock! {
    pub VictimAccess {}
    impl Victim for VictimAccess {
        fn touch(&mut self);
    }
}

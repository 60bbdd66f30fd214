use std::time::{Duration, Instant};

/// A terminator indicates when the solver should stop.
pub trait Terminator {
    /// Indicates whether the solver should stop or may continue.
    fn should_stop(&self) -> bool;
}

impl<T: Terminator + ?Sized> Terminator for &T {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

/// A time budget can be used to stop the solver after some duration.
pub struct TimeBudget {
    end_time: Option<Instant>,
}

impl TimeBudget {
    /// Create a time budget that starts now and gives the solver `duration` time to reach a
    /// conclusion.
    pub fn starting_now(duration: Duration) -> TimeBudget {
        TimeBudget {
            end_time: Instant::now().checked_add(duration),
        }
    }

    /// Create an infinite time budget. The solver will not terminate before it finds a solution or
    /// concludes unsat.
    pub fn infinite() -> TimeBudget {
        TimeBudget { end_time: None }
    }
}

impl Terminator for TimeBudget {
    fn should_stop(&self) -> bool {
        self.end_time
            .map(|end_time| Instant::now() >= end_time)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_budget_never_stops() {
        assert!(!TimeBudget::infinite().should_stop());
    }

    #[test]
    fn empty_budget_stops_immediately() {
        assert!(TimeBudget::starting_now(Duration::ZERO).should_stop());
    }

    #[test]
    fn references_to_terminators_are_terminators() {
        let budget = TimeBudget::infinite();
        let by_ref: &dyn Terminator = &budget;

        assert!(!(&by_ref).should_stop());
    }
}

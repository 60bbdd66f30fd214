use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use smtcheck_core::termination::Terminator;

/// Stops the check once SIGINT is received.
pub struct SignalTerminator {
    exit_signal_received: Arc<AtomicBool>,
    is_registered: bool,
}

impl SignalTerminator {
    /// Register the signal listeners. In case registering fails, this terminator will never cause
    /// the solver to stop running.
    pub fn register() -> SignalTerminator {
        let exit_signal_received = Arc::new(AtomicBool::new(false));

        let result = signal_hook::flag::register(
            signal_hook::consts::SIGINT,
            Arc::clone(&exit_signal_received),
        );

        SignalTerminator {
            exit_signal_received,
            is_registered: result.is_ok(),
        }
    }
}

impl Terminator for SignalTerminator {
    fn should_stop(&self) -> bool {
        self.is_registered && self.exit_signal_received.load(Ordering::Relaxed)
    }
}

/// Stops as soon as either of two terminators does.
pub struct OrTerminator<A, B> {
    a: A,
    b: B,
}

impl<A, B> OrTerminator<A, B> {
    pub fn new(a: A, b: B) -> Self {
        OrTerminator { a, b }
    }
}

impl<A: Terminator, B: Terminator> Terminator for OrTerminator<A, B> {
    fn should_stop(&self) -> bool {
        self.a.should_stop() || self.b.should_stop()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use smtcheck_core::termination::TimeBudget;

    use super::*;

    #[test]
    fn either_side_stops_the_combination() {
        let expired = || TimeBudget::starting_now(Duration::ZERO);

        assert!(OrTerminator::new(expired(), TimeBudget::infinite()).should_stop());
        assert!(OrTerminator::new(TimeBudget::infinite(), expired()).should_stop());
        assert!(!OrTerminator::new(TimeBudget::infinite(), TimeBudget::infinite()).should_stop());
    }

    #[test]
    fn no_signal_means_no_stop() {
        assert!(!SignalTerminator::register().should_stop());
    }
}

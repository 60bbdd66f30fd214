/// Schedules restarts according to the Luby sequence, scaled by a constant number of conflicts.
pub struct LubyRestarts {
    unit: u64,
    restarts: u64,
    conflicts_until_restart: u64,
}

impl LubyRestarts {
    pub fn new(unit: u64) -> Self {
        LubyRestarts {
            unit,
            restarts: 0,
            conflicts_until_restart: unit * luby(0),
        }
    }

    /// Register a conflict. Returns true if the solver should restart now.
    pub fn on_conflict(&mut self) -> bool {
        self.conflicts_until_restart = self.conflicts_until_restart.saturating_sub(1);

        if self.conflicts_until_restart > 0 {
            return false;
        }

        self.restarts += 1;
        self.conflicts_until_restart = self.unit * luby(self.restarts);
        true
    }
}

impl Default for LubyRestarts {
    fn default() -> Self {
        LubyRestarts::new(100)
    }
}

/// The `x`-th element (starting at 0) of the Luby sequence 1, 1, 2, 1, 1, 2, 4, ...
fn luby(mut x: u64) -> u64 {
    let mut size = 1;
    let mut seq = 0;

    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }

    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }

    1 << seq
}

//! Per-unit step and wall-clock budget
//!
//! Every long-running loop (trace enumeration, simulation, sequence search)
//! ticks the budget of its unit. Exhaustion cancels only that unit.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Clock is sampled once every this many ticks
const CLOCK_STRIDE: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unit budget exhausted after {steps} steps ({elapsed_ms}ms)")]
pub struct BudgetExhausted {
    pub steps: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct UnitBudget {
    max_steps: u64,
    deadline: Option<Instant>,
    started: Instant,
    steps: u64,
}

impl UnitBudget {
    pub fn new(max_steps: u64, time_budget: Option<Duration>) -> Self {
        let started = Instant::now();
        Self {
            max_steps,
            deadline: time_budget.map(|d| started + d),
            started,
            steps: 0,
        }
    }

    /// Budget that never runs out (tests, single evaluations)
    pub fn unlimited() -> Self {
        Self::new(u64::MAX, None)
    }

    /// Consume one step
    pub fn tick(&mut self) -> Result<(), BudgetExhausted> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(self.exhausted());
        }
        if self.steps % CLOCK_STRIDE == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(self.exhausted());
                }
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn exhausted(&self) -> BudgetExhausted {
        BudgetExhausted {
            steps: self.steps,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget_exhausts() {
        let mut budget = UnitBudget::new(3, None);
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        let err = budget.tick().unwrap_err();
        assert_eq!(err.steps, 4);
    }

    #[test]
    fn test_expired_deadline_detected_on_stride() {
        let mut budget = UnitBudget::new(u64::MAX, Some(Duration::ZERO));
        let mut result = Ok(());
        for _ in 0..CLOCK_STRIDE {
            result = budget.tick();
            if result.is_err() {
                break;
            }
        }
        assert!(result.is_err());
    }
}

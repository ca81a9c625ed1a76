use super::failure::Failure;

/// Attempt counter owned by exactly one in-flight execution.
///
/// Every attempt consumes one unit; once `attempts_used == max_attempts`
/// the budget is exhausted and the execution must stop.
#[derive(Debug, Clone)]
pub struct AttemptBudget {
    max_attempts: u32,
    attempts_used: u32,
    last_failure: Option<Failure>,
}

impl AttemptBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts_used: 0,
            last_failure: None,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_used >= self.max_attempts
    }

    /// Consume one attempt. Returns its 1-based number, or `None` when the
    /// budget is already exhausted.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts_used += 1;
        Some(self.attempts_used)
    }

    pub fn record_failure(&mut self, failure: Failure) {
        self.last_failure = Some(failure);
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    pub fn take_last_failure(&mut self) -> Option<Failure> {
        self.last_failure.take()
    }
}

/// Generation counters for cancel-by-ignoring.
///
/// There is no hard cancellation of in-flight work: a rebuild that was
/// superseded simply finds the counter has moved on when its result
/// arrives, and the result is dropped on the floor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self { current: 0 }
    }

    /// Starts a new generation, invalidating all earlier ones.
    pub fn advance(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::GenerationCounter;

    #[test]
    fn advancing_invalidates_prior_generations() {
        let mut counter = GenerationCounter::new();
        let first = counter.advance();
        assert!(counter.is_current(first));
        let second = counter.advance();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
    }
}

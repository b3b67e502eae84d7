//! Strategies for picking the next fact to say.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::facts::{Fact, Facts};

/// Produces the next fact from the collection it is bound to.
pub trait Selector: Send {
    fn next(&mut self) -> &Fact;
}

/// Uniform random choice.
pub struct RandomSelector {
    facts: Facts,
    rng: StdRng,
}

impl RandomSelector {
    /// Seed the generator from the OS entropy source, so restarts do not
    /// replay the same sequence.
    pub fn new(facts: Facts) -> Self {
        Self::with_rng(facts, StdRng::from_entropy())
    }

    pub fn with_rng(facts: Facts, rng: StdRng) -> Self {
        Self { facts, rng }
    }
}

impl Selector for RandomSelector {
    fn next(&mut self) -> &Fact {
        let i = self.rng.gen_range(0..self.facts.len());
        &self.facts[i]
    }
}

/// Cycles through the collection in load order, wrapping at the end.
pub struct RoundRobinSelector {
    facts: Facts,
    cursor: usize,
}

impl RoundRobinSelector {
    pub fn new(facts: Facts) -> Self {
        Self { facts, cursor: 0 }
    }
}

impl Selector for RoundRobinSelector {
    fn next(&mut self) -> &Fact {
        let i = self.cursor;
        self.cursor = (self.cursor + 1) % self.facts.len();
        &self.facts[i]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn facts(n: usize) -> Facts {
        Facts::from_lines((0..n).map(|i| format!("fact {i}"))).unwrap()
    }

    #[test]
    fn round_robin_visits_each_once_then_wraps() {
        let mut sel = RoundRobinSelector::new(facts(4));
        let ids: Vec<i64> = (0..5).map(|_| sel.next().id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn round_robin_single_fact_repeats() {
        let mut sel = RoundRobinSelector::new(facts(1));
        assert_eq!(sel.next().id, 0);
        assert_eq!(sel.next().id, 0);
    }

    #[test]
    fn random_stays_in_range_and_varies() {
        let mut sel = RandomSelector::with_rng(facts(5), StdRng::seed_from_u64(7));
        let seen: HashSet<i64> = (0..200).map(|_| sel.next().id).collect();
        assert!(seen.iter().all(|id| (0..5).contains(id)));
        assert!(seen.len() > 1, "random selection stuck on one index");
    }

    #[test]
    fn entropy_seeded_selectors_are_not_constant() {
        let mut sel = RandomSelector::new(facts(10));
        let first = sel.next().id;
        assert!((0..100).any(|_| sel.next().id != first));
    }
}

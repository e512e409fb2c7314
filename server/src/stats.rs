//! Resource pools. Every pool keeps `0 <= current <= max`.

use shared::{StatKind, StatValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool {
    current: u32,
    max: u32,
}

impl Pool {
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_full(&self) -> bool {
        self.current == self.max
    }

    /// Applies `delta` clamped to `[0, max]`. Returns the new value when it changed.
    pub fn adjust(&mut self, delta: i64) -> Option<u32> {
        let next = (self.current as i64 + delta).clamp(0, self.max as i64) as u32;
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }

    pub fn refill(&mut self) -> Option<u32> {
        self.adjust(self.max as i64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pools: BTreeMap<StatKind, Pool>,
}

impl Stats {
    pub fn with(mut self, stat: StatKind, max: u32) -> Self {
        self.pools.insert(stat, Pool::full(max));
        self
    }

    pub fn get(&self, stat: StatKind) -> Option<&Pool> {
        self.pools.get(&stat)
    }

    pub fn get_mut(&mut self, stat: StatKind) -> Option<&mut Pool> {
        self.pools.get_mut(&stat)
    }

    /// Current value, zero for pools this actor does not have.
    pub fn current(&self, stat: StatKind) -> u32 {
        self.pools.get(&stat).map_or(0, Pool::current)
    }

    pub fn has(&self, stat: StatKind) -> bool {
        self.pools.contains_key(&stat)
    }

    pub fn kinds(&self) -> Vec<StatKind> {
        self.pools.keys().copied().collect()
    }

    pub fn values(&self) -> Vec<StatValue> {
        self.pools
            .iter()
            .map(|(stat, pool)| StatValue {
                stat: *stat,
                current: pool.current,
                max: pool.max,
            })
            .collect()
    }
}

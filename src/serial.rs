//! Monotonic serial and CRL number allocation.
//!
//! [`SerialAllocator`] hands out certificate serials and CRL numbers that
//! strictly increase for the lifetime of a CA. Persistence is delegated to a
//! [`CounterStore`]; the allocator double-checks whatever the store returns
//! so a misbehaving store can never make it reissue a number.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CaError, Result};

/// The independent counters a CA maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterId {
    Serial,
    CrlNumber,
}

impl std::fmt::Display for CounterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterId::Serial => f.write_str("serial"),
            CounterId::CrlNumber => f.write_str("crl-number"),
        }
    }
}

/// Durable counter collaborator.
///
/// `reserve_next` must atomically persist and return the next value for
/// `counter`. Values already returned must never be returned again, even
/// across restarts.
pub trait CounterStore: Send + Sync {
    fn reserve_next(&self, counter: CounterId) -> Result<u64>;

    /// Raises `counter` so the next reserved value is greater than `floor`.
    /// A counter already past `floor` is left alone.
    fn advance_past(&self, counter: CounterId, floor: u64) -> Result<()>;
}

/// Process-local [`CounterStore`], for tests and ephemeral CAs.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    next: Mutex<HashMap<CounterId, u64>>,
}

impl MemoryCounterStore {
    /// Starts both counters at 1.
    pub fn new() -> Self {
        Self::starting_at(1, 1)
    }

    /// Seeds the next serial and next CRL number to hand out.
    pub fn starting_at(serial: u64, crl_number: u64) -> Self {
        Self {
            next: Mutex::new(HashMap::from([
                (CounterId::Serial, serial),
                (CounterId::CrlNumber, crl_number),
            ])),
        }
    }
}

impl CounterStore for MemoryCounterStore {
    fn reserve_next(&self, counter: CounterId) -> Result<u64> {
        let mut next = self
            .next
            .lock()
            .map_err(|_| CaError::CounterExhaustion(format!("{counter} store is poisoned")))?;
        let slot = next.entry(counter).or_insert(1);
        let value = *slot;
        *slot = value
            .checked_add(1)
            .ok_or_else(|| CaError::CounterExhaustion(format!("{counter} counter overflowed")))?;
        Ok(value)
    }

    fn advance_past(&self, counter: CounterId, floor: u64) -> Result<()> {
        let mut next = self
            .next
            .lock()
            .map_err(|_| CaError::CounterExhaustion(format!("{counter} store is poisoned")))?;
        let wanted = floor
            .checked_add(1)
            .ok_or_else(|| CaError::CounterExhaustion(format!("{counter} counter overflowed")))?;
        let slot = next.entry(counter).or_insert(1);
        *slot = (*slot).max(wanted);
        Ok(())
    }
}

/// Hands out strictly increasing serials and CRL numbers.
pub struct SerialAllocator {
    store: Box<dyn CounterStore>,
    last_issued: Mutex<HashMap<CounterId, u64>>,
}

impl std::fmt::Debug for SerialAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialAllocator")
            .field("last_issued", &self.last_issued)
            .finish_non_exhaustive()
    }
}

impl SerialAllocator {
    pub fn new(store: impl CounterStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            last_issued: Mutex::new(HashMap::new()),
        }
    }

    /// An allocator over a fresh [`MemoryCounterStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryCounterStore::new())
    }

    /// Next certificate serial number. Never 0.
    pub fn next_serial(&self) -> Result<u64> {
        self.next(CounterId::Serial)
    }

    /// Next CRL number.
    pub fn next_crl_number(&self) -> Result<u64> {
        self.next(CounterId::CrlNumber)
    }

    /// Makes sure later values of `counter` exceed `floor`, for numbers
    /// that were issued outside this allocator.
    pub fn advance_past(&self, counter: CounterId, floor: u64) -> Result<()> {
        let _guard = self
            .last_issued
            .lock()
            .map_err(|_| CaError::CounterExhaustion(format!("{counter} allocator is poisoned")))?;
        self.store.advance_past(counter, floor)?;
        tracing::debug!(%counter, floor, "advanced counter");
        Ok(())
    }

    fn next(&self, counter: CounterId) -> Result<u64> {
        // Held across the store call so two callers cannot observe the
        // same `last` value.
        let mut last_issued = self
            .last_issued
            .lock()
            .map_err(|_| CaError::CounterExhaustion(format!("{counter} allocator is poisoned")))?;
        let value = self.store.reserve_next(counter)?;

        if counter == CounterId::Serial && value == 0 {
            return Err(CaError::CounterExhaustion(
                "counter store returned serial 0".to_string(),
            ));
        }
        if let Some(last) = last_issued.get(&counter) {
            if value <= *last {
                return Err(CaError::CounterExhaustion(format!(
                    "{counter} store returned {value}, not greater than last issued {last}"
                )));
            }
        }

        last_issued.insert(counter, value);
        tracing::debug!(%counter, value, "allocated counter value");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct FixedStore(u64);

    impl CounterStore for FixedStore {
        fn reserve_next(&self, _counter: CounterId) -> Result<u64> {
            Ok(self.0)
        }

        fn advance_past(&self, _counter: CounterId, _floor: u64) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn counters_are_independent_and_increasing() {
        let allocator = SerialAllocator::new(MemoryCounterStore::starting_at(100, 7));
        assert_eq!(allocator.next_serial().unwrap(), 100);
        assert_eq!(allocator.next_serial().unwrap(), 101);
        assert_eq!(allocator.next_crl_number().unwrap(), 7);
        assert_eq!(allocator.next_serial().unwrap(), 102);
        assert_eq!(allocator.next_crl_number().unwrap(), 8);
    }

    #[test]
    fn store_returning_a_stale_value_is_exhaustion() {
        let allocator = SerialAllocator::new(FixedStore(5));
        assert_eq!(allocator.next_serial().unwrap(), 5);
        let err = allocator.next_serial().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CounterExhaustion);
    }

    #[test]
    fn serial_zero_is_never_issued() {
        let allocator = SerialAllocator::new(FixedStore(0));
        assert_eq!(
            allocator.next_serial().unwrap_err().kind(),
            ErrorKind::CounterExhaustion
        );
    }

    #[test]
    fn advancing_past_a_floor_only_moves_forward() {
        let allocator = SerialAllocator::new(MemoryCounterStore::starting_at(10, 1));
        allocator.advance_past(CounterId::CrlNumber, 41).unwrap();
        allocator.advance_past(CounterId::Serial, 3).unwrap();
        assert_eq!(allocator.next_crl_number().unwrap(), 42);
        assert_eq!(allocator.next_serial().unwrap(), 10);

        allocator.advance_past(CounterId::Serial, 20).unwrap();
        assert_eq!(allocator.next_serial().unwrap(), 21);
        assert_eq!(
            allocator
                .advance_past(CounterId::Serial, u64::MAX)
                .unwrap_err()
                .kind(),
            ErrorKind::CounterExhaustion
        );
    }

    #[test]
    fn overflow_is_exhaustion() {
        let allocator = SerialAllocator::new(MemoryCounterStore::starting_at(u64::MAX, 1));
        assert_eq!(allocator.next_serial().unwrap_err().kind(), ErrorKind::CounterExhaustion);
    }

    #[test]
    fn concurrent_serials_are_distinct() {
        let allocator = Arc::new(SerialAllocator::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| allocator.next_serial().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for serial in handle.join().unwrap() {
                assert!(seen.insert(serial), "serial {serial} issued twice");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}

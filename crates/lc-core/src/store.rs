//! Observable state container driving redraws.
//!
//! Every mutable access marks the store dirty. The event loop applies all
//! events of one turn and then asks [`Store::take_dirty`] whether a render is
//! due, so any number of mutations within a turn produce exactly one render.

use std::ops::Deref;

#[derive(Debug, Default)]
pub struct Store<T> {
    value: T,
    dirty: bool,
}

impl<T> Store<T> {
    /// A new store starts dirty so the first loop turn renders it.
    pub fn new(value: T) -> Self {
        Self {
            value,
            dirty: true,
        }
    }

    /// Mutable access. Counts as a mutation whether or not anything changes.
    pub fn write(&mut self) -> &mut T {
        self.mark_dirty();
        &mut self.value
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns true once per batch of mutations, then resets.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

impl<T> Deref for Store<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        n: u32,
        label: String,
    }

    #[test]
    fn test_new_store_renders_once() {
        let mut store = Store::new(Counter::default());
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }

    #[test]
    fn test_mutations_batch_into_one_render() {
        let mut store = Store::new(Counter::default());
        store.take_dirty();

        store.write().n += 1;
        store.write().label.push_str("x");
        store.mark_dirty();
        store.write().n += 1;

        assert!(store.take_dirty());
        assert!(!store.take_dirty());
        assert_eq!(store.n, 2);
        assert_eq!(store.label, "x");
    }

    #[test]
    fn test_reads_do_not_dirty() {
        let mut store = Store::new(Counter::default());
        store.take_dirty();
        let _ = store.n;
        let _ = &store.label;
        assert!(!store.take_dirty());
    }
}

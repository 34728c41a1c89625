use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Events keyed by remote id, kept in first-insertion order.
///
/// Re-inserting an id replaces the value in place, so an event fetched again
/// by an overlapping window keeps its original position.
#[derive(Debug)]
pub(crate) struct EventStore<T> {
    values: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> EventStore<T> {
    pub fn new() -> Self {
        EventStore {
            values: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn upsert(&mut self, id: String, value: T) {
        match self.index.entry(id) {
            Entry::Occupied(entry) => self.values[*entry.get()] = value,
            Entry::Vacant(entry) => {
                entry.insert(self.values.len());
                self.values.push(value);
            }
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

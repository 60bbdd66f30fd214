use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

pub trait Indexer {
    fn index(&self) -> usize;
}

/// A vector that is indexed by a strongly typed key rather than `usize`.
pub struct KeyedVec<Key, Value> {
    key: PhantomData<Key>,
    values: Vec<Value>,
}

impl<Key, Value> KeyedVec<Key, Value> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> + '_ {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> + '_ {
        self.values.iter_mut()
    }

    /// Append a value, returning the index at which it was stored.
    pub fn push(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }
}

impl<Key: Indexer, Value> KeyedVec<Key, Value> {
    pub fn get(&self, key: Key) -> Option<&Value> {
        self.values.get(key.index())
    }
}

impl<Key: Indexer, Value: Default> KeyedVec<Key, Value> {
    pub fn grow_to(&mut self, key: Key) {
        let minimum_len = key.index() + 1;
        if self.values.len() < minimum_len {
            self.values.resize_with(minimum_len, Value::default);
        }
    }
}

impl<Key: Indexer, Value: Clone> KeyedVec<Key, Value> {
    pub fn grow_to_with(&mut self, key: Key, value: Value) {
        let minimum_len = key.index() + 1;
        if self.values.len() < minimum_len {
            self.values.resize_with(minimum_len, || value.clone());
        }
    }
}

impl<Key, Value> Default for KeyedVec<Key, Value> {
    fn default() -> Self {
        KeyedVec {
            key: PhantomData,
            values: vec![],
        }
    }
}

impl<Key: Indexer, Value> Index<Key> for KeyedVec<Key, Value> {
    type Output = Value;

    fn index(&self, key: Key) -> &Self::Output {
        &self.values[key.index()]
    }
}

impl<Key: Indexer, Value> IndexMut<Key> for KeyedVec<Key, Value> {
    fn index_mut(&mut self, key: Key) -> &mut Self::Output {
        &mut self.values[key.index()]
    }
}

#[cfg(test)]
mod tests {
    use crate::lit::Var;

    use super::*;

    #[test]
    fn growing_fills_with_defaults() {
        let mut values: KeyedVec<Var, u32> = KeyedVec::default();
        values.grow_to(Var::try_from(2).unwrap());

        assert_eq!(3, values.len());
        assert!(values.iter().all(|&value| value == 0));
    }

    #[test]
    fn growing_never_shrinks() {
        let mut values: KeyedVec<Var, bool> = KeyedVec::default();
        values.grow_to_with(Var::try_from(4).unwrap(), true);
        values.grow_to_with(Var::try_from(1).unwrap(), false);

        assert_eq!(5, values.len());
        assert!(values[Var::try_from(4).unwrap()]);
    }
}

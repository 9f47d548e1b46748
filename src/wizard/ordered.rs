use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::error::ListError;

/// Entity kept in an [`OrderedList`]: a stable id plus a display position.
pub trait Ordered {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn order(&self) -> usize;
    fn set_order(&mut self, order: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Reorderable collection whose `order` fields always equal list position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OrderedList<T> {
    items: Vec<T>,
}

// Incoming lists are normalized so `order` is dense even when the sender
// was sloppy about it.
impl<'de, T> Deserialize<'de> for OrderedList<T>
where
    T: Ordered + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_items(items))
    }
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Ordered> OrderedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes untrusted input: stable sort by declared order, fill
    /// missing ids, then reindex.
    pub fn from_items(mut items: Vec<T>) -> Self {
        items.sort_by_key(|it| it.order());
        for it in items.iter_mut() {
            if it.id().trim().is_empty() {
                it.set_id(Uuid::new_v4().to_string());
            }
        }
        let mut list = Self { items };
        list.reindex();
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Appends with a fresh id at the end of the list.
    pub fn append(&mut self, mut item: T) -> &T {
        item.set_id(Uuid::new_v4().to_string());
        item.set_order(self.items.len());
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    pub fn remove(&mut self, id: &str) -> Result<T, ListError> {
        let Some(idx) = self.items.iter().position(|it| it.id() == id) else {
            return Err(ListError::NotFound(id.to_string()));
        };
        let removed = self.items.remove(idx);
        self.reindex();
        Ok(removed)
    }

    /// Drag-style move. `to == None` is a cancelled drag. Both indexes are
    /// clamped to the last slot. Returns whether anything moved.
    pub fn move_item(&mut self, from: usize, to: Option<usize>) -> bool {
        let Some(to) = to else {
            return false;
        };
        let Some(last) = self.items.len().checked_sub(1) else {
            return false;
        };
        let (from, to) = (from.min(last), to.min(last));
        if from == to {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.reindex();
        true
    }

    pub fn move_adjacent(&mut self, index: usize, direction: Direction) -> bool {
        if index >= self.items.len() {
            return false;
        }
        let neighbour = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.items.len() => index + 1,
            _ => return false,
        };
        self.items.swap(index, neighbour);
        self.reindex();
        true
    }

    #[cfg(test)]
    pub fn is_dense(&self) -> bool {
        self.items.iter().enumerate().all(|(i, it)| it.order() == i)
    }

    fn reindex(&mut self) {
        for (i, it) in self.items.iter_mut().enumerate() {
            it.set_order(i);
        }
    }
}

impl<'a, T> IntoIterator for &'a OrderedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

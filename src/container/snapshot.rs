use crate::container::event::{ChangeEvent, ContainerName};
use crate::entities::item::{ItemId, ItemStack};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("unknown container '{0}'")]
    UnknownContainer(ContainerName),
    #[error("container name must not be empty")]
    EmptyName,
    #[error("container '{0}' already exists")]
    AlreadyOpen(ContainerName),
    #[error("container '{0}' is full")]
    Full(ContainerName),
    #[error("cannot move zero-count item {0}")]
    ZeroCount(ItemId),
    #[error("item {0} not in container")]
    ItemNotFound(ItemId),
    #[error("item {item} has {available} units, {requested} requested")]
    InsufficientCount {
        item: ItemId,
        available: u16,
        requested: u16,
    },
    #[error("stack overflow for item {0}")]
    StackOverflow(ItemId),
}

/// Authoritative, ordered contents of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    name: ContainerName,
    capacity: Option<usize>,
    items: Vec<ItemStack>,
}

impl ContainerSnapshot {
    pub fn new(name: ContainerName, capacity: Option<usize>) -> Self {
        Self {
            name,
            capacity,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[ItemStack] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemStack> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Add units, merging into an existing entry with the same identifier.
    pub fn insert(&mut self, stack: ItemStack) -> Result<ChangeEvent, ContainerError> {
        if stack.count == 0 {
            return Err(ContainerError::ZeroCount(stack.id));
        }
        if let Some(existing) = self.items.iter_mut().find(|item| item.id == stack.id) {
            let total = existing.count as u32 + stack.count as u32;
            if total > u16::MAX as u32 {
                return Err(ContainerError::StackOverflow(stack.id));
            }
            existing.count = total as u16;
            return Ok(ChangeEvent::added(
                self.name.clone(),
                existing.id,
                existing.count,
            ));
        }
        if let Some(capacity) = self.capacity {
            if self.items.len() >= capacity {
                return Err(ContainerError::Full(self.name.clone()));
            }
        }
        let event = ChangeEvent::added(self.name.clone(), stack.id, stack.count);
        self.items.push(stack);
        Ok(event)
    }

    /// Remove units; the entry disappears once its count reaches zero.
    pub fn take(&mut self, id: ItemId, count: u16) -> Result<ChangeEvent, ContainerError> {
        if count == 0 {
            return Err(ContainerError::ZeroCount(id));
        }
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(ContainerError::ItemNotFound(id))?;
        let available = self.items[index].count;
        if count > available {
            return Err(ContainerError::InsufficientCount {
                item: id,
                available,
                requested: count,
            });
        }
        let remaining = available - count;
        if remaining == 0 {
            self.items.remove(index);
        } else {
            self.items[index].count = remaining;
        }
        Ok(ChangeEvent::removed(self.name.clone(), id, remaining))
    }

    /// Every entry as an Added event, in container order.
    pub fn as_added_events(&self) -> Vec<ChangeEvent> {
        self.items
            .iter()
            .map(|item| ChangeEvent::added(self.name.clone(), item.id, item.count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::ItemTypeId;

    fn stack(id: u32, count: u16) -> ItemStack {
        ItemStack::new(ItemId(id), ItemTypeId(1), count)
    }

    #[test]
    fn insert_merges_same_identifier() {
        let mut bag = ContainerSnapshot::new("bag".into(), None);
        bag.insert(stack(1, 3)).unwrap();
        let event = bag.insert(stack(1, 2)).unwrap();
        assert_eq!(event, ChangeEvent::added("bag", ItemId(1), 5));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn take_reports_remaining_count() {
        let mut bag = ContainerSnapshot::new("bag".into(), None);
        bag.insert(stack(1, 3)).unwrap();
        assert_eq!(
            bag.take(ItemId(1), 1).unwrap(),
            ChangeEvent::removed("bag", ItemId(1), 2)
        );
        assert_eq!(
            bag.take(ItemId(1), 2).unwrap(),
            ChangeEvent::removed("bag", ItemId(1), 0)
        );
        assert!(bag.is_empty());
    }

    #[test]
    fn take_rejects_bad_requests() {
        let mut bag = ContainerSnapshot::new("bag".into(), None);
        bag.insert(stack(1, 3)).unwrap();
        assert_eq!(bag.take(ItemId(1), 0), Err(ContainerError::ZeroCount(ItemId(1))));
        assert_eq!(
            bag.take(ItemId(2), 1),
            Err(ContainerError::ItemNotFound(ItemId(2)))
        );
        assert_eq!(
            bag.take(ItemId(1), 4),
            Err(ContainerError::InsufficientCount {
                item: ItemId(1),
                available: 3,
                requested: 4,
            })
        );
        assert_eq!(bag.get(ItemId(1)).map(|item| item.count), Some(3));
    }

    #[test]
    fn capacity_limits_new_entries_only() {
        let mut bag = ContainerSnapshot::new("bag".into(), Some(1));
        bag.insert(stack(1, 1)).unwrap();
        assert_eq!(
            bag.insert(stack(2, 1)),
            Err(ContainerError::Full("bag".into()))
        );
        assert!(bag.insert(stack(1, 1)).is_ok());
    }

    #[test]
    fn stack_overflow_is_rejected() {
        let mut bag = ContainerSnapshot::new("bag".into(), None);
        bag.insert(stack(1, u16::MAX)).unwrap();
        assert_eq!(
            bag.insert(stack(1, 1)),
            Err(ContainerError::StackOverflow(ItemId(1)))
        );
    }
}

use crate::entities::item::ItemId;
use serde::Deserialize;
use std::fmt;

/// Name of a container as used on the wire, e.g. `"bag"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContainerName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An item appeared or its stack count changed.
    Added {
        container: ContainerName,
        item: ItemId,
        count: u16,
    },
    /// Some units of an item left; `remaining == 0` means the item is gone.
    Removed {
        container: ContainerName,
        item: ItemId,
        remaining: u16,
    },
}

impl ChangeEvent {
    pub fn added(container: impl Into<ContainerName>, item: ItemId, count: u16) -> Self {
        ChangeEvent::Added {
            container: container.into(),
            item,
            count,
        }
    }

    pub fn removed(container: impl Into<ContainerName>, item: ItemId, remaining: u16) -> Self {
        ChangeEvent::Removed {
            container: container.into(),
            item,
            remaining,
        }
    }

    pub fn container(&self) -> &ContainerName {
        match self {
            ChangeEvent::Added { container, .. } | ChangeEvent::Removed { container, .. } => {
                container
            }
        }
    }

    pub fn item(&self) -> ItemId {
        match self {
            ChangeEvent::Added { item, .. } | ChangeEvent::Removed { item, .. } => *item,
        }
    }
}

/// Events produced by one authority mutation, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    pub fn new(events: Vec<ChangeEvent>) -> Self {
        Self { events }
    }

    pub fn single(event: ChangeEvent) -> Self {
        Self {
            events: vec![event],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// A batch as handed to one registered listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub listener: ListenerId,
    pub batch: ChangeBatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_accessors() {
        let added = ChangeEvent::added("bag", ItemId(3), 5);
        let removed = ChangeEvent::removed("bag", ItemId(4), 0);
        assert_eq!(added.container().as_str(), "bag");
        assert_eq!(added.item(), ItemId(3));
        assert_eq!(removed.item(), ItemId(4));
    }

    #[test]
    fn empty_name_is_detected() {
        assert!(ContainerName::new("").is_empty());
        assert!(!ContainerName::from("bag").is_empty());
    }
}

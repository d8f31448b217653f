use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Wire-level identifier of an item, stable for the item's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub u16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    pub count: u16,
}

impl ItemStack {
    pub fn new(id: ItemId, type_id: ItemTypeId, count: u16) -> Self {
        Self { id, type_id, count }
    }
}

/// A renderable object known to the client.
#[derive(Debug, PartialEq, Eq)]
pub struct Entity {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    pub name: String,
}

/// Shared handle to a resolved [`Entity`].
///
/// Two handles are equal when they refer to the same item identifier, which
/// is what the view cares about when deciding whether an item is already
/// shown.
#[derive(Debug, Clone)]
pub struct EntityHandle(Arc<Entity>);

impl EntityHandle {
    pub fn new(id: ItemId, type_id: ItemTypeId, name: impl Into<String>) -> Self {
        Self(Arc::new(Entity {
            id,
            type_id,
            name: name.into(),
        }))
    }

    pub fn id(&self) -> ItemId {
        self.0.id
    }

    pub fn type_id(&self) -> ItemTypeId {
        self.0.type_id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for EntityHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_item_id() {
        let first = EntityHandle::new(ItemId(7), ItemTypeId(3031), "gold coin");
        let renamed = EntityHandle::new(ItemId(7), ItemTypeId(3031), "gold coins");
        let other = EntityHandle::new(ItemId(8), ItemTypeId(3031), "gold coin");
        assert_eq!(first, renamed);
        assert_ne!(first, other);
    }

    #[test]
    fn item_id_display() {
        assert_eq!(ItemId(42).to_string(), "#42");
    }
}

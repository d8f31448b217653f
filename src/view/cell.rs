use crate::container::event::ContainerName;
use crate::entities::item::{EntityHandle, ItemId};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque capability forwarded to per-item renderers.
///
/// The grid only stores and propagates it.
#[derive(Clone)]
pub struct Inspector(Arc<dyn Any + Send + Sync>);

impl Inspector {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Inspector) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Inspector(..)")
    }
}

/// One slot of a view grid.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    entity: Option<EntityHandle>,
    container: Option<ContainerName>,
    inspector: Option<Inspector>,
}

impl Cell {
    pub fn entity(&self) -> Option<&EntityHandle> {
        self.entity.as_ref()
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.entity.as_ref().map(EntityHandle::id)
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_none()
    }

    pub fn holds(&self, id: ItemId) -> bool {
        self.item_id() == Some(id)
    }

    pub fn container(&self) -> Option<&ContainerName> {
        self.container.as_ref()
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        self.inspector.as_ref()
    }

    pub(crate) fn set_entity(&mut self, entity: Option<EntityHandle>) {
        self.entity = entity;
    }

    pub(crate) fn set_container(&mut self, container: Option<ContainerName>) {
        self.container = container;
    }

    pub(crate) fn set_inspector(&mut self, inspector: Option<Inspector>) {
        self.inspector = inspector;
    }

    /// Move this cell's content into `target`, leaving this cell empty.
    pub(crate) fn move_to(&mut self, target: &mut Cell) {
        target.entity = self.entity.take();
    }
}

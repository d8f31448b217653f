use crate::container::event::{ChangeBatch, ChangeEvent, ContainerName, Delivery, ListenerId};
use crate::container::snapshot::{ContainerError, ContainerSnapshot};
use crate::entities::item::{ItemId, ItemStack};
use crossbeam_channel::Sender;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

/// The remote side a view binds to.
pub trait ContainerSource: Send + Sync {
    /// Current contents of `name` in container order, `None` if unknown.
    fn snapshot(&self, name: &ContainerName) -> Option<Vec<ItemStack>>;

    fn register_listener(&self, name: &ContainerName, sender: Sender<Delivery>) -> ListenerId;

    /// Returns `false` if the listener was not registered for `name`.
    fn deregister_listener(&self, name: &ContainerName, listener: ListenerId) -> bool;
}

struct Registration {
    id: ListenerId,
    sender: Sender<Delivery>,
}

#[derive(Default)]
struct AuthorityState {
    containers: BTreeMap<ContainerName, ContainerSnapshot>,
    listeners: BTreeMap<ContainerName, Vec<Registration>>,
    next_listener: u64,
}

impl AuthorityState {
    fn dispatch(&mut self, name: &ContainerName, batch: ChangeBatch) {
        if batch.is_empty() {
            return;
        }
        let Some(registrations) = self.listeners.get_mut(name) else {
            return;
        };
        registrations.retain(|registration| {
            let delivery = Delivery {
                listener: registration.id,
                batch: batch.clone(),
            };
            match registration.sender.send(delivery) {
                Ok(()) => true,
                Err(_) => {
                    debug!(container = %name, listener = registration.id.0, "pruning disconnected listener");
                    false
                }
            }
        });
        if registrations.is_empty() {
            self.listeners.remove(name);
        }
    }

    fn container_mut(
        &mut self,
        name: &ContainerName,
    ) -> Result<&mut ContainerSnapshot, ContainerError> {
        self.containers
            .get_mut(name)
            .ok_or_else(|| ContainerError::UnknownContainer(name.clone()))
    }
}

/// In-process container authority.
///
/// Every mutation updates the snapshot and hands the resulting batch to the
/// container's listeners while the state lock is held, so listeners observe
/// batches in generation order.
#[derive(Default)]
pub struct Authority {
    state: Mutex<AuthorityState>,
}

impl Authority {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AuthorityState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn open(
        &self,
        name: impl Into<ContainerName>,
        capacity: Option<usize>,
    ) -> Result<(), ContainerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ContainerError::EmptyName);
        }
        let mut state = self.lock();
        if state.containers.contains_key(&name) {
            return Err(ContainerError::AlreadyOpen(name));
        }
        state
            .containers
            .insert(name.clone(), ContainerSnapshot::new(name, capacity));
        Ok(())
    }

    /// Remove a container, reporting every item as gone to its listeners.
    pub fn close(&self, name: &ContainerName) -> Result<(), ContainerError> {
        let mut state = self.lock();
        let snapshot = state
            .containers
            .remove(name)
            .ok_or_else(|| ContainerError::UnknownContainer(name.clone()))?;
        let events = snapshot
            .items()
            .iter()
            .map(|item| ChangeEvent::removed(name.clone(), item.id, 0))
            .collect();
        state.dispatch(name, ChangeBatch::new(events));
        Ok(())
    }

    pub fn add_item(&self, name: &ContainerName, stack: ItemStack) -> Result<(), ContainerError> {
        self.add_items(name, vec![stack])
    }

    /// Add several stacks as one batch. Nothing is applied if any stack fails.
    pub fn add_items(
        &self,
        name: &ContainerName,
        stacks: Vec<ItemStack>,
    ) -> Result<(), ContainerError> {
        let mut state = self.lock();
        let container = state.container_mut(name)?;
        let mut staged = container.clone();
        let mut events = Vec::with_capacity(stacks.len());
        for stack in stacks {
            events.push(staged.insert(stack)?);
        }
        *container = staged;
        state.dispatch(name, ChangeBatch::new(events));
        Ok(())
    }

    pub fn remove_item(
        &self,
        name: &ContainerName,
        id: ItemId,
        count: u16,
    ) -> Result<(), ContainerError> {
        self.remove_items(name, &[(id, count)])
    }

    /// Remove several items as one batch. Nothing is applied if any removal fails.
    pub fn remove_items(
        &self,
        name: &ContainerName,
        removals: &[(ItemId, u16)],
    ) -> Result<(), ContainerError> {
        let mut state = self.lock();
        let container = state.container_mut(name)?;
        let mut staged = container.clone();
        let mut events = Vec::with_capacity(removals.len());
        for (id, count) in removals {
            events.push(staged.take(*id, *count)?);
        }
        *container = staged;
        state.dispatch(name, ChangeBatch::new(events));
        Ok(())
    }

    /// Re-send the full contents of `name` as an Added batch.
    pub fn resend(&self, name: &ContainerName) -> Result<(), ContainerError> {
        let mut state = self.lock();
        let events = state.container_mut(name)?.as_added_events();
        trace!(container = %name, items = events.len(), "resending container state");
        state.dispatch(name, ChangeBatch::new(events));
        Ok(())
    }

    pub fn listener_count(&self, name: &ContainerName) -> usize {
        self.lock()
            .listeners
            .get(name)
            .map(|registrations| registrations.len())
            .unwrap_or(0)
    }
}

impl ContainerSource for Authority {
    fn snapshot(&self, name: &ContainerName) -> Option<Vec<ItemStack>> {
        self.lock()
            .containers
            .get(name)
            .map(|container| container.items().to_vec())
    }

    fn register_listener(&self, name: &ContainerName, sender: Sender<Delivery>) -> ListenerId {
        let mut state = self.lock();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state
            .listeners
            .entry(name.clone())
            .or_default()
            .push(Registration { id, sender });
        id
    }

    fn deregister_listener(&self, name: &ContainerName, listener: ListenerId) -> bool {
        let mut state = self.lock();
        let Some(registrations) = state.listeners.get_mut(name) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.id != listener);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            state.listeners.remove(name);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::ItemTypeId;
    use crossbeam_channel::unbounded;

    fn stack(id: u32, count: u16) -> ItemStack {
        ItemStack::new(ItemId(id), ItemTypeId(1), count)
    }

    #[test]
    fn listeners_receive_batches_in_order() {
        let authority = Authority::new();
        let bag = ContainerName::from("bag");
        authority.open(bag.clone(), None).unwrap();
        let (tx, rx) = unbounded();
        let listener = authority.register_listener(&bag, tx);

        authority.add_item(&bag, stack(1, 2)).unwrap();
        authority.remove_item(&bag, ItemId(1), 1).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.listener, listener);
        assert_eq!(first.batch.events, vec![ChangeEvent::added("bag", ItemId(1), 2)]);
        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.batch.events,
            vec![ChangeEvent::removed("bag", ItemId(1), 1)]
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listeners_only_see_their_container() {
        let authority = Authority::new();
        let bag = ContainerName::from("bag");
        let chest = ContainerName::from("chest");
        authority.open(bag.clone(), None).unwrap();
        authority.open(chest.clone(), None).unwrap();
        let (tx, rx) = unbounded();
        authority.register_listener(&bag, tx);

        authority.add_item(&chest, stack(1, 1)).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn deregistered_listener_stops_receiving() {
        let authority = Authority::new();
        let bag = ContainerName::from("bag");
        authority.open(bag.clone(), None).unwrap();
        let (tx, rx) = unbounded();
        let listener = authority.register_listener(&bag, tx);
        assert!(authority.deregister_listener(&bag, listener));
        assert!(!authority.deregister_listener(&bag, listener));

        authority.add_item(&bag, stack(1, 1)).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(authority.listener_count(&bag), 0);
    }

    #[test]
    fn disconnected_listeners_are_pruned() {
        let authority = Authority::new();
        let bag = ContainerName::from("bag");
        authority.open(bag.clone(), None).unwrap();
        let (tx, rx) = unbounded();
        authority.register_listener(&bag, tx);
        drop(rx);

        authority.add_item(&bag, stack(1, 1)).unwrap();
        assert_eq!(authority.listener_count(&bag), 0);
    }

    #[test]
    fn failed_batch_leaves_container_untouched() {
        let authority = Authority::new();
        let bag = ContainerName::from("bag");
        authority.open(bag.clone(), Some(1)).unwrap();
        let (tx, rx) = unbounded();
        authority.register_listener(&bag, tx);

        let result = authority.add_items(&bag, vec![stack(1, 1), stack(2, 1)]);
        assert_eq!(result, Err(ContainerError::Full(bag.clone())));
        assert_eq!(authority.snapshot(&bag), Some(Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn resend_and_close_emit_full_state() {
        let authority = Authority::new();
        let bag = ContainerName::from("bag");
        authority.open(bag.clone(), None).unwrap();
        authority.add_items(&bag, vec![stack(1, 1), stack(2, 4)]).unwrap();
        let (tx, rx) = unbounded();
        authority.register_listener(&bag, tx);

        authority.resend(&bag).unwrap();
        assert_eq!(
            rx.try_recv().unwrap().batch.events,
            vec![
                ChangeEvent::added("bag", ItemId(1), 1),
                ChangeEvent::added("bag", ItemId(2), 4),
            ]
        );

        authority.close(&bag).unwrap();
        assert_eq!(
            rx.try_recv().unwrap().batch.events,
            vec![
                ChangeEvent::removed("bag", ItemId(1), 0),
                ChangeEvent::removed("bag", ItemId(2), 0),
            ]
        );
        assert_eq!(authority.snapshot(&bag), None);
    }

    #[test]
    fn open_rejects_empty_and_duplicate_names() {
        let authority = Authority::new();
        assert_eq!(authority.open("", None), Err(ContainerError::EmptyName));
        authority.open("bag", None).unwrap();
        assert_eq!(
            authority.open("bag", None),
            Err(ContainerError::AlreadyOpen("bag".into()))
        );
    }
}

use crate::entities::item::EntityHandle;
use crate::view::grid::ViewGrid;
use crossbeam_channel::{bounded, select, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, warn};

pub type SharedGrid = Arc<Mutex<ViewGrid>>;

pub fn shared(grid: ViewGrid) -> SharedGrid {
    Arc::new(Mutex::new(grid))
}

pub fn lock_grid(grid: &SharedGrid) -> MutexGuard<'_, ViewGrid> {
    match grid.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Copy of the cell contents for a rendering thread.
pub fn render_snapshot(grid: &SharedGrid) -> Vec<Option<EntityHandle>> {
    lock_grid(grid).cells().map(|cell| cell.cloned()).collect()
}

/// Dedicated apply thread for one grid.
///
/// Waits for deliveries with no lock held and takes the grid lock for one
/// delivery at a time, so `bind`/`unbind` calls made through the same lock
/// never interleave with an event application.
pub struct ApplyWorker {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<u64>>,
}

impl ApplyWorker {
    pub fn spawn(grid: SharedGrid) -> std::io::Result<Self> {
        let inbox = lock_grid(&grid).receiver();
        let (shutdown, stop) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("slotgrid-apply".to_string())
            .spawn(move || {
                let mut applied = 0u64;
                loop {
                    select! {
                        recv(inbox) -> delivery => match delivery {
                            Ok(delivery) => {
                                let report = lock_grid(&grid).deliver(delivery);
                                applied += 1;
                                debug!(?report, "applied delivery");
                            }
                            Err(_) => break,
                        },
                        recv(stop) -> _ => break,
                    }
                }
                applied
            })?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Stop the thread and return how many deliveries it applied.
    pub fn stop(mut self) -> u64 {
        self.join()
    }

    fn join(&mut self) -> u64 {
        let _ = self.shutdown.try_send(());
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(applied) => applied,
                Err(_) => {
                    warn!("apply thread panicked");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for ApplyWorker {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::authority::{Authority, ContainerSource};
    use crate::container::event::ContainerName;
    use crate::entities::item::{ItemId, ItemStack, ItemTypeId};
    use crate::entities::resolver::{EntityRegistry, EntityResolver};
    use std::time::{Duration, Instant};

    fn wait_for(grid: &SharedGrid, expected: &[Option<ItemId>]) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if lock_grid(grid).ids() == expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn worker_applies_events_from_another_thread() {
        let mut registry = EntityRegistry::new();
        for id in 1..=3 {
            registry.insert(EntityHandle::new(ItemId(id), ItemTypeId(1), "item"));
        }
        let authority = Arc::new(Authority::new());
        let bag = ContainerName::from("bag");
        authority.open(bag.clone(), None).unwrap();

        let grid = shared(ViewGrid::new(
            3,
            1,
            Arc::new(registry) as Arc<dyn EntityResolver>,
        ));
        lock_grid(&grid)
            .bind(bag.clone(), Arc::clone(&authority) as Arc<dyn ContainerSource>)
            .unwrap();
        let worker = ApplyWorker::spawn(Arc::clone(&grid)).unwrap();

        let producer = {
            let authority = Arc::clone(&authority);
            let bag = bag.clone();
            std::thread::spawn(move || {
                for id in 1..=3 {
                    authority
                        .add_item(&bag, ItemStack::new(ItemId(id), ItemTypeId(1), 1))
                        .unwrap();
                }
                authority.remove_item(&bag, ItemId(1), 1).unwrap();
            })
        };
        producer.join().unwrap();

        assert!(wait_for(&grid, &[Some(ItemId(2)), Some(ItemId(3)), None]));
        let rendered = render_snapshot(&grid);
        assert_eq!(rendered[0].as_ref().map(EntityHandle::id), Some(ItemId(2)));
        assert_eq!(worker.stop(), 4);
    }
}

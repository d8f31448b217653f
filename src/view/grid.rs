use crate::container::authority::ContainerSource;
use crate::container::event::{ChangeBatch, ChangeEvent, ContainerName, Delivery, ListenerId};
use crate::entities::item::{EntityHandle, ItemId};
use crate::entities::resolver::EntityResolver;
use crate::view::cell::{Cell, Inspector};
use crate::view::compaction::compact;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("container name must not be empty")]
    EmptyContainerName,
    #[error("container '{0}' is not known to the authority")]
    UnknownContainer(ContainerName),
}

/// Outcome of one Added notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Placed(usize),
    /// Already shown; only the stack count changed.
    Updated(usize),
    Overflow,
    Unresolved,
}

/// What one applied batch (or rescan) did to the cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub placed: usize,
    pub updated: usize,
    pub cleared: usize,
    pub dropped_overflow: usize,
    pub unresolved: usize,
    pub moves: usize,
    pub ignored: usize,
}

impl ApplyReport {
    fn record(&mut self, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Placed(_) => self.placed += 1,
            AddOutcome::Updated(_) => self.updated += 1,
            AddOutcome::Overflow => self.dropped_overflow += 1,
            AddOutcome::Unresolved => self.unresolved += 1,
        }
    }

    pub fn merge(&mut self, other: &ApplyReport) {
        self.placed += other.placed;
        self.updated += other.updated;
        self.cleared += other.cleared;
        self.dropped_overflow += other.dropped_overflow;
        self.unresolved += other.unresolved;
        self.moves += other.moves;
        self.ignored += other.ignored;
    }
}

/// Running totals over the grid's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub batches: u64,
    pub stale_deliveries: u64,
    pub rescans: u64,
    pub overflows: u64,
    pub resolution_failures: u64,
    pub compaction_moves: u64,
}

struct Binding {
    name: ContainerName,
    source: Arc<dyn ContainerSource>,
    listener: ListenerId,
}

/// Fixed-size array of cells mirroring one container.
///
/// Items are placed in the first free cell when they appear and the cells
/// are compacted after removals, so the shown items stay densely packed in
/// container arrival order.
pub struct ViewGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    binding: Option<Binding>,
    resolver: Arc<dyn EntityResolver>,
    inspector: Option<Inspector>,
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
    stats: GridStats,
}

impl ViewGrid {
    pub fn new(width: usize, height: usize, resolver: Arc<dyn EntityResolver>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
            binding: None,
            resolver,
            inspector: None,
            sender,
            receiver,
            stats: GridStats::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Column and row of a cell index, filled left to right, top to bottom.
    pub fn position_of(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.cells.len() || self.width == 0 {
            return None;
        }
        Some((index % self.width, index / self.width))
    }

    pub fn bound_container(&self) -> Option<&ContainerName> {
        self.binding.as_ref().map(|binding| &binding.name)
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.binding.as_ref().map(|binding| binding.listener)
    }

    pub fn stats(&self) -> GridStats {
        self.stats
    }

    /// Inbound channel, for a worker that blocks on deliveries.
    pub fn receiver(&self) -> Receiver<Delivery> {
        self.receiver.clone()
    }

    pub fn cells(&self) -> impl Iterator<Item = Option<&EntityHandle>> + '_ {
        self.cells.iter().map(Cell::entity)
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn ids(&self) -> Vec<Option<ItemId>> {
        self.cells.iter().map(Cell::item_id).collect()
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    pub fn set_inspector(&mut self, inspector: Option<Inspector>) {
        for cell in &mut self.cells {
            cell.set_inspector(inspector.clone());
        }
        self.inspector = inspector;
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        self.inspector.as_ref()
    }

    /// Bind to `name` on `source` and rebuild the cells from its snapshot.
    ///
    /// Binding again to the same container is a full rescan.
    pub fn bind(
        &mut self,
        name: impl Into<ContainerName>,
        source: Arc<dyn ContainerSource>,
    ) -> Result<ApplyReport, GridError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GridError::EmptyContainerName);
        }
        if source.snapshot(&name).is_none() {
            return Err(GridError::UnknownContainer(name));
        }
        self.unbind();

        let listener = source.register_listener(&name, self.sender.clone());
        for cell in &mut self.cells {
            cell.set_container(Some(name.clone()));
        }
        info!(container = %name, listener = listener.0, capacity = self.cells.len(), "bound view grid");
        self.binding = Some(Binding {
            name,
            source,
            listener,
        });
        Ok(self.rescan())
    }

    /// Stop listening. Cells keep their contents until the next bind;
    /// deliveries still queued for the old registration are discarded.
    pub fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            if !binding
                .source
                .deregister_listener(&binding.name, binding.listener)
            {
                debug!(container = %binding.name, listener = binding.listener.0, "listener already gone");
            }
            info!(container = %binding.name, "unbound view grid");
        }
    }

    /// Clear the cells and replay the bound container as one Added batch.
    pub fn rescan(&mut self) -> ApplyReport {
        let mut report = ApplyReport::default();
        let Some(binding) = self.binding.as_ref() else {
            return report;
        };
        for cell in &mut self.cells {
            cell.set_entity(None);
        }
        let items = binding.source.snapshot(&binding.name).unwrap_or_default();
        for item in &items {
            let outcome = self.place(item.id, false);
            report.record(outcome);
        }
        if report.dropped_overflow > 0 {
            error!(
                container = %self.describe_binding(),
                dropped = report.dropped_overflow,
                capacity = self.cells.len(),
                "more objects than slots"
            );
        }
        self.stats.rescans += 1;
        self.check_invariants();
        report
    }

    /// Apply every queued delivery without blocking.
    pub fn pump(&mut self) -> ApplyReport {
        let mut total = ApplyReport::default();
        while let Ok(delivery) = self.receiver.try_recv() {
            let report = self.deliver(delivery);
            total.merge(&report);
        }
        total
    }

    /// Apply one delivery if it belongs to the current registration.
    pub fn deliver(&mut self, delivery: Delivery) -> ApplyReport {
        if self.listener() != Some(delivery.listener) {
            self.stats.stale_deliveries += 1;
            trace!(listener = delivery.listener.0, "discarding stale delivery");
            return ApplyReport {
                ignored: delivery.batch.len(),
                ..ApplyReport::default()
            };
        }
        self.apply(&delivery.batch)
    }

    /// Apply a batch in order. Removals for the bound container trigger one
    /// compaction after the whole batch.
    pub fn apply(&mut self, batch: &ChangeBatch) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut removals = false;
        for event in &batch.events {
            if self.bound_container() != Some(event.container()) {
                trace!(container = %event.container(), "ignoring event for unbound container");
                report.ignored += 1;
                continue;
            }
            match event {
                ChangeEvent::Added { item, .. } => {
                    let outcome = self.place(*item, true);
                    report.record(outcome);
                }
                ChangeEvent::Removed {
                    item, remaining, ..
                } => {
                    removals = true;
                    if self.handle_removed(*item, *remaining) {
                        report.cleared += 1;
                    }
                }
            }
        }
        if removals {
            report.moves = self.compact_cells();
        }
        self.stats.batches += 1;
        self.check_invariants();
        report
    }

    /// Added handling: update if shown, otherwise resolve and place in the
    /// first empty cell.
    fn place(&mut self, id: ItemId, report_overflow: bool) -> AddOutcome {
        if let Some(index) = self.cells.iter().position(|cell| cell.holds(id)) {
            trace!(item = %id, index, "stack count changed");
            return AddOutcome::Updated(index);
        }
        let entity = match self.resolver.resolve(id) {
            Ok(entity) => entity,
            Err(err) => {
                self.stats.resolution_failures += 1;
                error!(container = %self.describe_binding(), "unable to find entity: {}", err);
                return AddOutcome::Unresolved;
            }
        };
        let free = self.cells.iter().position(Cell::is_empty);
        match free {
            Some(index) => {
                self.cells[index].set_entity(Some(entity));
                debug!(item = %id, index, "placed item");
                AddOutcome::Placed(index)
            }
            None => {
                self.stats.overflows += 1;
                if report_overflow {
                    error!(
                        container = %self.describe_binding(),
                        item = %id,
                        capacity = self.cells.len(),
                        "more objects than slots"
                    );
                }
                AddOutcome::Overflow
            }
        }
    }

    /// Clears the cell holding `id` once no units remain.
    fn handle_removed(&mut self, id: ItemId, remaining: u16) -> bool {
        if remaining > 0 {
            return false;
        }
        match self.cells.iter_mut().find(|cell| cell.holds(id)) {
            Some(cell) => {
                cell.set_entity(None);
                true
            }
            None => false,
        }
    }

    fn compact_cells(&mut self) -> usize {
        let moves = compact(&mut self.cells);
        if moves > 0 {
            debug!(moves, "compacted view grid");
        }
        self.stats.compaction_moves += moves as u64;
        moves
    }

    /// At most one cell per item. A duplicate is a logic error: debug
    /// builds stop here, release builds keep the first occurrence.
    fn check_invariants(&mut self) {
        let mut seen = HashSet::new();
        let mut duplicates = false;
        for cell in &mut self.cells {
            let Some(id) = cell.item_id() else {
                continue;
            };
            if !seen.insert(id) {
                debug_assert!(false, "item {id} bound to more than one cell");
                error!(item = %id, "item bound to more than one cell, dropping duplicate");
                cell.set_entity(None);
                duplicates = true;
            }
        }
        if duplicates {
            self.compact_cells();
        }
    }

    fn describe_binding(&self) -> String {
        self.bound_container()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "<unbound>".to_string())
    }
}

impl Drop for ViewGrid {
    fn drop(&mut self) {
        self.unbind();
    }
}

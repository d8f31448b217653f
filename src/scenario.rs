//! Scripted replays of container traffic against one view grid.
//!
//! A scenario file describes the known entities, the containers held by the
//! authority and a list of steps. Every step is followed by draining the
//! grid's inbound queue, the same way an apply thread would.

use crate::config::{GridConfig, GridOverrides};
use crate::container::authority::{Authority, ContainerSource};
use crate::container::event::ContainerName;
use crate::container::snapshot::ContainerError;
use crate::entities::item::{EntityHandle, ItemId, ItemStack, ItemTypeId};
use crate::entities::resolver::{CachedResolver, EntityRegistry, EntityResolver};
use crate::view::grid::{ApplyReport, GridError, ViewGrid};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("read scenario {} failed: {1}", .0.display())]
    Read(PathBuf, std::io::Error),
    #[error("parse scenario failed: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("step {step}: {source}")]
    Container {
        step: usize,
        #[source]
        source: ContainerError,
    },
    #[error("step {step}: {source}")]
    Bind {
        step: usize,
        #[source]
        source: GridError,
    },
    #[error("step {step}: expected {expected}, grid shows {actual}")]
    Mismatch {
        step: usize,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitySpec {
    pub id: ItemId,
    #[serde(default)]
    pub type_id: ItemTypeId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemSpec {
    pub id: ItemId,
    #[serde(default)]
    pub type_id: ItemTypeId,
    #[serde(default = "one")]
    pub count: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSpec {
    pub name: ContainerName,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Bind {
        container: ContainerName,
    },
    Unbind,
    Add {
        container: ContainerName,
        id: ItemId,
        #[serde(default)]
        type_id: ItemTypeId,
        #[serde(default = "one")]
        count: u16,
    },
    Remove {
        container: ContainerName,
        id: ItemId,
        #[serde(default = "one")]
        count: u16,
    },
    Resend {
        container: ContainerName,
    },
    /// Drop an entity from the registry so later lookups fail.
    Forget {
        id: ItemId,
    },
    /// Cell contents by item id, `~` for an empty cell.
    Expect {
        cells: Vec<Option<u32>>,
    },
}

fn one() -> u16 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub grid: GridOverrides,
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Final state of a replay.
#[derive(Debug)]
pub struct Outcome {
    pub grid: GridConfig,
    pub cells: Vec<Option<EntityHandle>>,
    pub totals: ApplyReport,
}

impl Outcome {
    /// One line per grid row, `.` for empty cells.
    pub fn render(&self) -> Vec<String> {
        let width = self.grid.width.max(1);
        self.cells
            .chunks(width)
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Some(entity) => format!("{}({})", entity.name(), entity.id().0),
                        None => ".".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ScenarioError::Read(path.to_path_buf(), err))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn run(&self, base: &GridConfig) -> Result<Outcome, ScenarioError> {
        let config = base.with_overrides(&self.grid);

        let mut registry = EntityRegistry::new();
        for entity in &self.entities {
            registry.insert(EntityHandle::new(entity.id, entity.type_id, entity.name.clone()));
        }
        let registry = Arc::new(RwLock::new(registry));
        let cache = (config.resolver_cache > 0).then(|| {
            Arc::new(CachedResolver::new(
                Arc::clone(&registry),
                config.resolver_cache,
            ))
        });
        let resolver: Arc<dyn EntityResolver> = match &cache {
            Some(cache) => Arc::clone(cache) as Arc<dyn EntityResolver>,
            None => Arc::clone(&registry) as Arc<dyn EntityResolver>,
        };

        let authority = Arc::new(Authority::new());
        for container in &self.containers {
            authority
                .open(container.name.clone(), container.capacity)
                .map_err(|source| ScenarioError::Container { step: 0, source })?;
            let stacks = container
                .items
                .iter()
                .map(|item| ItemStack::new(item.id, item.type_id, item.count))
                .collect();
            authority
                .add_items(&container.name, stacks)
                .map_err(|source| ScenarioError::Container { step: 0, source })?;
        }

        let mut grid = ViewGrid::new(config.width, config.height, resolver);
        let mut totals = ApplyReport::default();
        for (index, step) in self.steps.iter().enumerate() {
            let step_no = index + 1;
            let container_err = |source: ContainerError| ScenarioError::Container {
                step: step_no,
                source,
            };
            match step {
                Step::Bind { container } => {
                    let report = grid
                        .bind(
                            container.clone(),
                            Arc::clone(&authority) as Arc<dyn ContainerSource>,
                        )
                        .map_err(|source| ScenarioError::Bind {
                            step: step_no,
                            source,
                        })?;
                    totals.merge(&report);
                }
                Step::Unbind => grid.unbind(),
                Step::Add {
                    container,
                    id,
                    type_id,
                    count,
                } => authority
                    .add_item(container, ItemStack::new(*id, *type_id, *count))
                    .map_err(container_err)?,
                Step::Remove {
                    container,
                    id,
                    count,
                } => authority
                    .remove_item(container, *id, *count)
                    .map_err(container_err)?,
                Step::Resend { container } => {
                    authority.resend(container).map_err(container_err)?
                }
                Step::Forget { id } => {
                    let mut registry = match registry.write() {
                        Ok(registry) => registry,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    registry.remove(*id);
                    if let Some(cache) = &cache {
                        cache.invalidate(*id);
                    }
                }
                Step::Expect { cells } => {
                    let actual: Vec<Option<u32>> =
                        grid.ids().iter().map(|id| id.map(|id| id.0)).collect();
                    if &actual != cells {
                        return Err(ScenarioError::Mismatch {
                            step: step_no,
                            expected: format!("{:?}", cells),
                            actual: format!("{:?}", actual),
                        });
                    }
                }
            }
            let report = grid.pump();
            totals.merge(&report);
        }
        info!(
            steps = self.steps.len(),
            placed = totals.placed,
            overflow = totals.dropped_overflow,
            unresolved = totals.unresolved,
            "scenario finished"
        );

        Ok(Outcome {
            grid: config,
            cells: grid.cells().map(|cell| cell.cloned()).collect(),
            totals,
        })
    }
}

mod config;
pub mod container;
pub mod entities;
pub mod scenario;
pub mod telemetry;
pub mod view;

pub use config::{AppConfig, ConfigError, GridConfig, GridOverrides};
pub use container::authority::{Authority, ContainerSource};
pub use container::event::{ChangeBatch, ChangeEvent, ContainerName, Delivery, ListenerId};
pub use container::snapshot::{ContainerError, ContainerSnapshot};
pub use entities::item::{Entity, EntityHandle, ItemId, ItemStack, ItemTypeId};
pub use entities::resolver::{CachedResolver, EntityRegistry, EntityResolver, ResolveError};
pub use view::cell::{Cell, Inspector};
pub use view::compaction::{compact, is_compacted};
pub use view::grid::{AddOutcome, ApplyReport, GridError, GridStats, ViewGrid};
pub use view::worker::{render_snapshot, ApplyWorker, SharedGrid};

pub fn run(args: &[String]) -> Result<(), String> {
    let config = AppConfig::from_args(args).map_err(|err| err.to_string())?;
    telemetry::logging::init(&config.log)?;
    let scenario = scenario::Scenario::load(&config.scenario).map_err(|err| err.to_string())?;
    let outcome = scenario.run(&config.grid).map_err(|err| err.to_string())?;

    println!("slotgrid: {}", config.scenario.display());
    println!(
        "- grid: {}x{} ({} cells)",
        outcome.grid.width,
        outcome.grid.height,
        outcome.grid.capacity()
    );
    println!(
        "- placed={}, updated={}, cleared={}, moves={}, overflow={}, unresolved={}, ignored={}",
        outcome.totals.placed,
        outcome.totals.updated,
        outcome.totals.cleared,
        outcome.totals.moves,
        outcome.totals.dropped_overflow,
        outcome.totals.unresolved,
        outcome.totals.ignored
    );
    for row in outcome.render() {
        println!("  {}", row);
    }
    Ok(())
}

pub mod config;
pub mod cost;
pub mod error;
pub mod fare;
pub mod hyperlink;
pub mod in_memory;
pub mod path;
pub mod pathfinder;
pub mod queue;
pub mod stop_state;
pub mod supply;
pub mod time;
pub mod trace;

pub use config::PathfinderParams;
pub use error::{PathfindingError, PathfindingResult};
pub use in_memory::InMemorySupply;
pub use path::{Path, PathSpecification};
pub use pathfinder::{PathInfo, PathResult, Pathfinder, PerformanceInfo};
pub use supply::Supply;

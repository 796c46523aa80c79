//! Route rule aggregation for the mesh client
//!
//! This library provides:
//! - Route sources for the local router file and dark launch governance policies
//! - Translation of dark launch policies into route rules
//! - A registry merging sources by priority and dispatching change events

pub mod darklaunch_source;
pub mod dispatcher;
pub mod error;
pub mod file_source;
pub mod governance;
pub mod loader;
pub mod registry;
pub mod settings;
pub mod source;
pub mod translate;

pub use darklaunch_source::{DarkLaunchSource, DARKLAUNCH_PREFIX};
pub use dispatcher::{ChangeListener, EventDispatcher, RouteTableRefresher};
pub use error::{Result, RouterError};
pub use file_source::FileSource;
pub use governance::{GovernanceClient, MemoryGovernanceStore, WatchId};
pub use loader::{RouterConfigLoader, YamlFileLoader};
pub use registry::RouteRuleRegistry;
pub use settings::{OutputFormat, RouterSettings};
pub use source::{ChangeEvent, ChangeHandler, EventCallback, EventKind, RouteSource};
pub use translate::translate;

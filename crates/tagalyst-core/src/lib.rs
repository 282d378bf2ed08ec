pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod devtools;
pub mod dom;
pub mod fixtures;
pub mod focus;
pub mod identity;
pub mod keyboard;
pub mod models;
pub mod page;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod search;
pub mod sidebar;
pub mod storage;
pub mod transcript;
pub mod ui;
pub mod watcher;

// Re-export the types most embedders need at crate root
pub use adapters::{AdapterRegistry, MessageAdapter, PairAdapter, ThreadAdapter};
pub use bootstrap::{Activation, Bootstrap};
pub use config::{Config, ConfigService, CoreConfig};
pub use dom::{Document, DomError, HostPage, NodeId};
pub use focus::{FocusMode, FocusService};
pub use registry::MessageMetaRegistry;
pub use render::ThreadRenderService;
pub use scheduler::RenderScheduler;
pub use storage::{JsonFileStorage, MemoryStorage, StorageError, StorageGateway};

pub mod admin;
pub mod error;
pub mod logging;
pub mod parse;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod tree;
pub mod watch;

pub use admin::{AdminField, AdminSession};
pub use error::{Error, Result, ValidationError};
pub use parse::parse;
pub use reader::ConfigReader;
pub use resolver::{ResolvedConfig, Resolver, ResolverOptions, ValueSource};
pub use schema::{ConfigEntry, ConfigValue, DefaultValue, EntryKind, Schema};
pub use store::{JsonFileStore, MemoryStore, OverrideStore};
pub use tree::{EmptyTree, GlobalTree};
pub use watch::{ChangeEvent, Subscription};

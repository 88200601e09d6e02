//! Browser automation module
//!
//! The [`BrowserDriver`] trait, its agent-browser implementation and the
//! page snapshot builder.

mod driver;
mod executor;
pub mod snapshot;

pub use driver::BrowserDriver;
pub use executor::{resolve_selector, AgentBrowserDriver, ID_ATTRIBUTE};
pub use snapshot::{
    ElementTag, InteractionKind, PageTree, Snapshot, SnapshotBuilder, SnapshotElement,
};

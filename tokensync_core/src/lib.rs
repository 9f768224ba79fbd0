//! `tokensync_core` keeps a design tool's text variables in step with an
//! external database and applies them to the text of a document. Rows from the
//! database become string variables with one mode per value column, and text
//! whose content matches a variable value is bound to that variable, through
//! the owning component instance when the text lives inside one.
//!
//! ## Pipeline
//!
//! ```text
//! database pages
//!   → source (pages become ExternalRows)
//!   → CollectionReconciler (collection, modes, and variables mirror the rows)
//!
//! document text
//!   → scope (collect and filter text nodes)
//!   → BulkMatcher (normalized content equality against candidate variables)
//!   → BindingResolver (write to the text node or to its instance property)
//! ```
//!
//! ## Modules
//!
//! - [`host`]: The interfaces the design tool provides: variables, libraries, the scene graph, and key/value storage.
//! - [`ancestry`]: Recovering owning component instances from path-encoded node ids.
//! - [`cache`]: Library variable snapshots kept in client storage so repeated imports are avoided.
//! - [`memory`]: An in-memory host over a serializable document snapshot.
//! - [`config`]: Configuration loading from `tokensync.toml`.
//!
//! ## Key Types
//!
//! - [`CollectionReconciler`]: Mirrors external rows into a variable collection.
//! - [`BindingResolver`]: Decides where a text binding is written and writes it.
//! - [`BulkMatcher`]: Binds matching variables to every text node in a scope.
//! - [`LibraryVariableCache`]: Cache of imported library collections.
//! - [`TokenSyncError`]: Every failure the core reports.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tokensync_core::BulkApplyOptions;
//! use tokensync_core::BulkMatcher;
//! use tokensync_core::LibraryVariableCache;
//! use tokensync_core::MemoryBlobStore;
//! use tokensync_core::MemoryHost;
//!
//! # async fn run(json: &str) -> tokensync_core::TokenSyncResult<()> {
//! let host = MemoryHost::from_json(json)?;
//! let cache = LibraryVariableCache::new(MemoryBlobStore::new());
//!
//! let report = BulkMatcher::new(&host, &cache)
//! 	.apply(&BulkApplyOptions::default())
//! 	.await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub use ancestry::*;
pub use audit::*;
pub use binding::*;
pub use cache::*;
pub use config::*;
pub use error::*;
pub use host::*;
pub use matcher::*;
pub use memory::*;
pub use model::*;
pub use reconcile::*;
pub use scope::*;
pub use settings::*;
pub use source::*;
pub use variables::*;

pub mod ancestry;
mod audit;
mod binding;
pub mod cache;
pub mod config;
#[allow(unused_assignments)]
mod error;
pub mod host;
mod matcher;
pub mod memory;
mod model;
mod reconcile;
mod scope;
mod settings;
mod source;
mod variables;

#[cfg(test)]
mod __fixtures;

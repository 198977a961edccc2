//! Context-sensitive key binding tables.
//!
//! - `ContextManager` - the context tree and the active set
//! - `BindingTable` - one table per context, keyed by trigger sequence
//! - `BindingTableManager` - all tables, schemes, and resolution of a
//!   sequence against the active contexts (most specific first)

mod binding;
mod context;
mod manager;
mod table;


pub use binding::{Binding, BindingKind};
pub use context::{BindingContext, ContextManager};
pub use manager::{BindingConflict, BindingError, BindingTableManager, ConflictType};
pub use table::{BindingTable, TableMatch};

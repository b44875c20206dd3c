//! Entry types: the unit of memory and its attribute newtypes.

mod entry;
mod importance;
mod source;

pub use entry::{Entry, EntryPatch};
pub use importance::Importance;
pub use source::Source;

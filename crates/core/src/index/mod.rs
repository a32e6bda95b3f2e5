//! Derived lookup structures, kept current by node events.

mod fqn;
mod hash;

pub use fqn::FqnIndexer;
pub use hash::HashIndexer;

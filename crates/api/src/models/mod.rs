pub mod descriptor;
pub mod event;
pub mod instrumentation;
pub mod modifiers;
pub mod util;

pub use descriptor::*;
pub use event::*;
pub use instrumentation::*;
pub use modifiers::*;

/// Identifier of a type node: its fully-qualified name.
pub type TypeId = std::sync::Arc<str>;

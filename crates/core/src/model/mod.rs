//! Type graph: stored nodes and the arena that links them.

mod graph;
mod node;

pub use graph::{REFERENCE_TYPES, TypeGraph, accepts};
pub(crate) use graph::LinkOutcome;
pub use node::{
    AnnotationBody, ClassBody, InterfaceBody, Method, MethodKey, MethodRef, TypeBody, TypeKind,
    TypeNode, TypeSet,
};
pub(crate) use node::type_id;

//! Stored nodes of the type graph.
//!
//! Nodes never point at each other directly: every relation is a set of
//! [`TypeId`]s resolved through the owning [`TypeGraph`](super::TypeGraph).

use classcache_api::models::util::{serde_arc_str, serde_arc_str_seq};
use classcache_api::{MethodInstrumentationConfig, Modifiers, TypeId};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub type TypeSet = IndexSet<TypeId>;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Annotation,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Annotation => "annotation",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method identity: name plus ordered parameter types.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub name: SmolStr,
    pub parameters: Vec<SmolStr>,
}

impl MethodKey {
    pub fn new<I, S>(name: impl Into<SmolStr>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p)?;
        }
        f.write_str(")")
    }
}

/// A method addressed from outside its owner (exception back-references).
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    #[serde(serialize_with = "serde_arc_str::serialize")]
    pub owner: TypeId,
    pub key: MethodKey,
}

impl MethodRef {
    pub fn new(owner: TypeId, key: MethodKey) -> Self {
        Self { owner, key }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Method {
    #[serde(flatten)]
    pub(crate) key: MethodKey,
    pub(crate) return_type: Option<SmolStr>,
    pub(crate) modifiers: Modifiers,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) exceptions: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) annotations: TypeSet,
    pub(crate) instrumentation: Option<MethodInstrumentationConfig>,
}

impl Method {
    pub(crate) fn new(key: MethodKey, return_type: Option<SmolStr>, modifiers: Modifiers) -> Self {
        Self {
            key,
            return_type,
            modifiers,
            exceptions: TypeSet::new(),
            annotations: TypeSet::new(),
            instrumentation: None,
        }
    }

    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn parameters(&self) -> &[SmolStr] {
        &self.key.parameters
    }

    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn exceptions(&self) -> &TypeSet {
        &self.exceptions
    }

    pub fn annotations(&self) -> &TypeSet {
        &self.annotations
    }

    pub fn instrumentation(&self) -> Option<&MethodInstrumentationConfig> {
        self.instrumentation.as_ref()
    }

    pub fn has_instrumentation(&self) -> bool {
        self.instrumentation.is_some()
    }

    /// Instrumentation config of this method, created from the method
    /// signature on first use.
    pub fn instrumentation_or_insert(&mut self, class_fqn: &str) -> &mut MethodInstrumentationConfig {
        let key = &self.key;
        let return_type = &self.return_type;
        self.instrumentation.get_or_insert_with(|| {
            MethodInstrumentationConfig::new(
                class_fqn,
                key.name.as_str(),
                return_type.as_ref().map(|r| r.to_string()),
                key.parameters.iter().map(|p| p.to_string()).collect(),
            )
        })
    }

    /// Drops the instrumentation; returns whether there was any.
    pub fn clear_instrumentation(&mut self) -> bool {
        self.instrumentation.take().is_some()
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct ClassBody {
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) superclasses: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) subclasses: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) realized_interfaces: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) annotations: TypeSet,
    #[serde(serialize_with = "serialize_methods")]
    pub(crate) methods: IndexMap<MethodKey, Method>,
    pub(crate) throwing_methods: IndexSet<MethodRef>,
}

impl ClassBody {
    pub fn superclasses(&self) -> &TypeSet {
        &self.superclasses
    }

    pub fn subclasses(&self) -> &TypeSet {
        &self.subclasses
    }

    pub fn realized_interfaces(&self) -> &TypeSet {
        &self.realized_interfaces
    }

    /// Methods (of any type) declaring this class in their `throws` clause.
    pub fn throwing_methods(&self) -> &IndexSet<MethodRef> {
        &self.throwing_methods
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct InterfaceBody {
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) super_interfaces: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) sub_interfaces: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) realizing_classes: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) annotations: TypeSet,
    #[serde(serialize_with = "serialize_methods")]
    pub(crate) methods: IndexMap<MethodKey, Method>,
}

impl InterfaceBody {
    pub fn super_interfaces(&self) -> &TypeSet {
        &self.super_interfaces
    }

    pub fn sub_interfaces(&self) -> &TypeSet {
        &self.sub_interfaces
    }

    pub fn realizing_classes(&self) -> &TypeSet {
        &self.realizing_classes
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct AnnotationBody {
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) annotations: TypeSet,
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) annotated_types: TypeSet,
    /// Classes using this annotation as an interface.
    #[serde(serialize_with = "serde_arc_str_seq::serialize")]
    pub(crate) realizing_classes: TypeSet,
}

impl AnnotationBody {
    pub fn annotated_types(&self) -> &TypeSet {
        &self.annotated_types
    }

    pub fn realizing_classes(&self) -> &TypeSet {
        &self.realizing_classes
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeBody {
    Class(ClassBody),
    Interface(InterfaceBody),
    Annotation(AnnotationBody),
}

impl TypeBody {
    pub fn empty(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Class => TypeBody::Class(ClassBody::default()),
            TypeKind::Interface => TypeBody::Interface(InterfaceBody::default()),
            TypeKind::Annotation => TypeBody::Annotation(AnnotationBody::default()),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct TypeNode {
    #[serde(serialize_with = "serde_arc_str::serialize")]
    pub(crate) fqn: TypeId,
    pub(crate) hashes: BTreeSet<String>,
    pub(crate) modifiers: Modifiers,
    #[serde(flatten)]
    pub(crate) body: TypeBody,
}

impl TypeNode {
    pub(crate) fn new(fqn: TypeId, kind: TypeKind) -> Self {
        Self {
            fqn,
            hashes: BTreeSet::new(),
            modifiers: Modifiers::NONE,
            body: TypeBody::empty(kind),
        }
    }

    pub fn id(&self) -> &TypeId {
        &self.fqn
    }

    pub fn fqn(&self) -> &str {
        &self.fqn
    }

    pub fn hashes(&self) -> &BTreeSet<String> {
        &self.hashes
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_initialized(&self) -> bool {
        !self.hashes.is_empty()
    }

    pub fn body(&self) -> &TypeBody {
        &self.body
    }

    pub fn kind(&self) -> TypeKind {
        match self.body {
            TypeBody::Class(_) => TypeKind::Class,
            TypeBody::Interface(_) => TypeKind::Interface,
            TypeBody::Annotation(_) => TypeKind::Annotation,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.body, TypeBody::Class(_))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.body, TypeBody::Interface(_))
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self.body, TypeBody::Annotation(_))
    }

    pub fn as_class(&self) -> Option<&ClassBody> {
        match &self.body {
            TypeBody::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_interface(&self) -> Option<&InterfaceBody> {
        match &self.body {
            TypeBody::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&AnnotationBody> {
        match &self.body {
            TypeBody::Annotation(a) => Some(a),
            _ => None,
        }
    }

    pub fn annotations(&self) -> &TypeSet {
        match &self.body {
            TypeBody::Class(c) => &c.annotations,
            TypeBody::Interface(i) => &i.annotations,
            TypeBody::Annotation(a) => &a.annotations,
        }
    }

    /// Methods of a class or interface; annotations carry none.
    pub fn methods(&self) -> Option<&IndexMap<MethodKey, Method>> {
        match &self.body {
            TypeBody::Class(c) => Some(&c.methods),
            TypeBody::Interface(i) => Some(&i.methods),
            TypeBody::Annotation(_) => None,
        }
    }

    pub(crate) fn methods_mut(&mut self) -> Option<&mut IndexMap<MethodKey, Method>> {
        match &mut self.body {
            TypeBody::Class(c) => Some(&mut c.methods),
            TypeBody::Interface(i) => Some(&mut i.methods),
            TypeBody::Annotation(_) => None,
        }
    }

    pub fn method(&self, key: &MethodKey) -> Option<&Method> {
        self.methods().and_then(|m| m.get(key))
    }

    pub fn has_instrumentation_points(&self) -> bool {
        self.as_class()
            .is_some_and(|c| c.methods.values().any(Method::has_instrumentation))
    }

    pub fn instrumentation_points(&self) -> Vec<MethodInstrumentationConfig> {
        self.as_class()
            .map(|c| {
                c.methods
                    .values()
                    .filter_map(|m| m.instrumentation.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PartialEq for TypeNode {
    fn eq(&self, other: &Self) -> bool {
        self.fqn == other.fqn
    }
}

impl Eq for TypeNode {}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [fqn={}, hashes={:?}]", self.kind(), self.fqn, self.hashes)
    }
}

pub(crate) fn type_id(fqn: &str) -> TypeId {
    Arc::from(fqn)
}

fn serialize_methods<S>(methods: &IndexMap<MethodKey, Method>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(methods.values())
}

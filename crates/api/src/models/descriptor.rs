//! Ingestion shapes pushed into the cache by the class parser.
//!
//! A descriptor is a partial view of one type plus the types it points at.
//! Only the first level of references is meaningful to the cache; whatever
//! hangs below a referenced descriptor is ignored on merge.

use crate::error::{ApiError, ApiResult};
use crate::models::modifiers::Modifiers;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeSet;

/// Scalar part shared by all descriptor variants.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct TypeHeader {
    pub fqn: String,
    #[serde(default)]
    pub hashes: BTreeSet<String>,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl TypeHeader {
    pub fn placeholder(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            hashes: BTreeSet::new(),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn observed(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        let mut hashes = BTreeSet::new();
        hashes.insert(hash.into());
        Self {
            fqn: fqn.into(),
            hashes,
            modifiers,
        }
    }

    /// A header is initialized once at least one bytecode hash was observed.
    pub fn is_initialized(&self) -> bool {
        !self.hashes.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDescriptor {
    Class(ClassDescriptor),
    Interface(InterfaceDescriptor),
    Annotation(AnnotationDescriptor),
    /// Anything the parser produced that the cache does not model
    /// (modules, package-info, ...). Rejected on merge.
    Other(OtherDescriptor),
}

impl TypeDescriptor {
    pub fn fqn(&self) -> &str {
        match self {
            TypeDescriptor::Class(c) => &c.header.fqn,
            TypeDescriptor::Interface(i) => &i.header.fqn,
            TypeDescriptor::Annotation(a) => &a.header.fqn,
            TypeDescriptor::Other(o) => &o.fqn,
        }
    }

    pub fn header(&self) -> Option<&TypeHeader> {
        match self {
            TypeDescriptor::Class(c) => Some(&c.header),
            TypeDescriptor::Interface(i) => Some(&i.header),
            TypeDescriptor::Annotation(a) => Some(&a.header),
            TypeDescriptor::Other(_) => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.header().is_some_and(TypeHeader::is_initialized)
    }

    pub fn kind_name(&self) -> &str {
        match self {
            TypeDescriptor::Class(_) => "class",
            TypeDescriptor::Interface(_) => "interface",
            TypeDescriptor::Annotation(_) => "annotation",
            TypeDescriptor::Other(o) => &o.declared_kind,
        }
    }

    /// Structural checks that must hold before a descriptor may touch the cache.
    pub fn validate(&self) -> ApiResult<()> {
        if self.fqn().trim().is_empty() {
            return Err(ApiError::MissingFqn);
        }
        if let TypeDescriptor::Other(o) = self {
            return Err(ApiError::UnsupportedKind {
                fqn: o.fqn.clone(),
                kind: o.declared_kind.clone(),
            });
        }
        Ok(())
    }
}

impl From<ClassDescriptor> for TypeDescriptor {
    fn from(value: ClassDescriptor) -> Self {
        TypeDescriptor::Class(value)
    }
}

impl From<InterfaceDescriptor> for TypeDescriptor {
    fn from(value: InterfaceDescriptor) -> Self {
        TypeDescriptor::Interface(value)
    }
}

impl From<AnnotationDescriptor> for TypeDescriptor {
    fn from(value: AnnotationDescriptor) -> Self {
        TypeDescriptor::Annotation(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
pub struct ClassDescriptor {
    #[serde(flatten)]
    pub header: TypeHeader,
    #[serde(default)]
    pub annotations: Vec<TypeDescriptor>,
    #[serde(default)]
    pub superclasses: Vec<TypeDescriptor>,
    #[serde(default)]
    pub realized_interfaces: Vec<TypeDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    /// Reverse direction; the parser cannot know it and the cache drops it.
    #[serde(default)]
    pub subclasses: Vec<TypeDescriptor>,
    /// Reverse direction; the parser cannot know it and the cache drops it.
    #[serde(default)]
    pub throwing_methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn placeholder(fqn: impl Into<String>) -> Self {
        Self {
            header: TypeHeader::placeholder(fqn),
            ..Default::default()
        }
    }

    pub fn observed(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            header: TypeHeader::observed(fqn, hash, modifiers),
            ..Default::default()
        }
    }

    pub fn with_superclass(mut self, superclass: impl Into<TypeDescriptor>) -> Self {
        self.superclasses.push(superclass.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<TypeDescriptor>) -> Self {
        self.realized_interfaces.push(interface.into());
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<TypeDescriptor>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_subclass(mut self, subclass: impl Into<TypeDescriptor>) -> Self {
        self.subclasses.push(subclass.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
pub struct InterfaceDescriptor {
    #[serde(flatten)]
    pub header: TypeHeader,
    #[serde(default)]
    pub annotations: Vec<TypeDescriptor>,
    #[serde(default)]
    pub super_interfaces: Vec<TypeDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub sub_interfaces: Vec<TypeDescriptor>,
    #[serde(default)]
    pub realizing_classes: Vec<TypeDescriptor>,
}

impl InterfaceDescriptor {
    pub fn placeholder(fqn: impl Into<String>) -> Self {
        Self {
            header: TypeHeader::placeholder(fqn),
            ..Default::default()
        }
    }

    pub fn observed(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            header: TypeHeader::observed(fqn, hash, modifiers),
            ..Default::default()
        }
    }

    pub fn with_super_interface(mut self, interface: impl Into<TypeDescriptor>) -> Self {
        self.super_interfaces.push(interface.into());
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<TypeDescriptor>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_realizing_class(mut self, class: impl Into<TypeDescriptor>) -> Self {
        self.realizing_classes.push(class.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
pub struct AnnotationDescriptor {
    #[serde(flatten)]
    pub header: TypeHeader,
    #[serde(default)]
    pub annotations: Vec<TypeDescriptor>,
    #[serde(default)]
    pub annotated_types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub realizing_classes: Vec<TypeDescriptor>,
}

impl AnnotationDescriptor {
    pub fn placeholder(fqn: impl Into<String>) -> Self {
        Self {
            header: TypeHeader::placeholder(fqn),
            ..Default::default()
        }
    }

    pub fn observed(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            header: TypeHeader::observed(fqn, hash, modifiers),
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<TypeDescriptor>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn with_annotated_type(mut self, annotated: impl Into<TypeDescriptor>) -> Self {
        self.annotated_types.push(annotated.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct OtherDescriptor {
    pub fqn: String,
    pub declared_kind: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
pub struct MethodDescriptor {
    #[schemars(with = "String")]
    pub name: SmolStr,
    #[serde(default)]
    #[schemars(with = "Vec<String>")]
    pub parameters: Vec<SmolStr>,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub return_type: Option<SmolStr>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub exceptions: Vec<TypeDescriptor>,
    #[serde(default)]
    pub annotations: Vec<TypeDescriptor>,
}

impl MethodDescriptor {
    pub fn new<I, S>(name: impl Into<SmolStr>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn returning(mut self, return_type: impl Into<SmolStr>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn throwing(mut self, exception: impl Into<TypeDescriptor>) -> Self {
        self.exceptions.push(exception.into());
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<TypeDescriptor>) -> Self {
        self.annotations.push(annotation.into());
        self
    }
}

use crate::error::Result;
use crate::lookup::LookupService;
use crate::model::{TypeBody, TypeGraph, TypeNode};
use classcache_api::{SensorAssignment, TypeId};
use indexmap::IndexSet;

/// Reduces the classes an applier has to look at to those a sensor
/// assignment can possibly select.
pub trait SearchNarrower: Send + Sync {
    fn narrow_by_assignment(
        &self,
        lookup: &LookupService<'_>,
        assignment: &SensorAssignment,
    ) -> Result<Vec<TypeNode>>;
}

/// Narrows using the relations stored in the class cache.
///
/// An annotation on the assignment takes precedence, then the interface
/// flag, then the superclass flag; otherwise the class name pattern is used
/// directly. Only initialized classes are returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassCacheSearchNarrower;

impl SearchNarrower for ClassCacheSearchNarrower {
    fn narrow_by_assignment(
        &self,
        lookup: &LookupService<'_>,
        assignment: &SensorAssignment,
    ) -> Result<Vec<TypeNode>> {
        if let Some(annotation) = &assignment.annotation {
            let roots = lookup.find_annotation_types_by_pattern(annotation, false)?;
            return lookup.with_graph(|graph| collect(graph, annotated_classes(graph, &roots)));
        }
        if assignment.interface {
            // annotations may be realized like interfaces
            let mut roots = lookup.find_interface_types_by_pattern(&assignment.class_name, false)?;
            roots.extend(lookup.find_annotation_types_by_pattern(&assignment.class_name, false)?);
            return lookup.with_graph(|graph| collect(graph, realizing_classes(graph, &roots)));
        }
        if assignment.superclass {
            let roots = lookup.find_class_types_by_pattern(&assignment.class_name, false)?;
            return lookup.with_graph(|graph| {
                let mut ids = IndexSet::new();
                for root in &roots {
                    ids.extend(graph.subclass_closure(root.fqn()));
                }
                collect(graph, ids)
            });
        }
        lookup.find_class_types_by_pattern(&assignment.class_name, true)
    }
}

/// Classes realizing any of `interfaces` (interfaces or annotations),
/// directly, through a sub-interface or through a superclass.
fn realizing_classes(graph: &TypeGraph, interfaces: &[TypeNode]) -> IndexSet<TypeId> {
    let mut all_interfaces: IndexSet<TypeId> = IndexSet::new();
    for interface in interfaces {
        all_interfaces.insert(interface.id().clone());
        all_interfaces.extend(graph.sub_interface_closure(interface.fqn()));
    }

    let mut classes = IndexSet::new();
    for interface in &all_interfaces {
        let realizing = match graph.get(interface).map(TypeNode::body) {
            Some(TypeBody::Interface(i)) => i.realizing_classes(),
            Some(TypeBody::Annotation(a)) => a.realizing_classes(),
            _ => continue,
        };
        for class in realizing {
            classes.insert(class.clone());
            classes.extend(graph.subclass_closure(class));
        }
    }
    classes
}

/// Classes carrying any of `annotations` themselves, inheriting it from a
/// superclass or realized interface, or declaring a method carrying it.
fn annotated_classes(graph: &TypeGraph, annotations: &[TypeNode]) -> IndexSet<TypeId> {
    let mut classes = IndexSet::new();
    let mut interfaces = Vec::new();

    for annotation in annotations {
        let Some(body) = annotation.as_annotation() else {
            continue;
        };
        for annotated in body.annotated_types() {
            match graph.get(annotated) {
                Some(node) if node.is_class() => {
                    classes.insert(annotated.clone());
                    classes.extend(graph.subclass_closure(annotated));
                }
                Some(node) if node.is_interface() => interfaces.push(node.clone()),
                _ => {}
            }
        }
    }
    classes.extend(realizing_classes(graph, &interfaces));

    let wanted: IndexSet<&str> = annotations.iter().map(TypeNode::fqn).collect();
    for node in graph.nodes().filter(|n| n.is_class()) {
        let has_annotated_method = node
            .methods()
            .into_iter()
            .flat_map(|m| m.values())
            .any(|m| m.annotations().iter().any(|a| wanted.contains(&**a)));
        if has_annotated_method {
            classes.insert(node.id().clone());
        }
    }
    classes
}

fn collect(graph: &TypeGraph, ids: IndexSet<TypeId>) -> Vec<TypeNode> {
    ids.iter()
        .filter_map(|id| graph.get(id))
        .filter(|n| n.is_class() && n.is_initialized())
        .cloned()
        .collect()
}

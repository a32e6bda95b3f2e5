use crate::error::Result;
use crate::lookup::FqnPattern;
use crate::model::{Method, MethodKey, TypeNode, TypeSet};
use classcache_api::{AgentConfig, Modifiers, SensorAssignment};
use std::collections::BTreeSet;

/// Mutable view of one initialized class, handed to appliers under the
/// write lock. Only method instrumentation can be changed through it.
pub struct InstrumentableClass<'a> {
    node: &'a mut TypeNode,
}

impl<'a> InstrumentableClass<'a> {
    /// `None` for anything but a class.
    pub(crate) fn new(node: &'a mut TypeNode) -> Option<Self> {
        node.is_class().then_some(Self { node })
    }

    pub fn fqn(&self) -> &str {
        self.node.fqn()
    }

    pub fn hashes(&self) -> &BTreeSet<String> {
        self.node.hashes()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.node.modifiers()
    }

    pub fn annotations(&self) -> &TypeSet {
        self.node.annotations()
    }

    pub fn node(&self) -> &TypeNode {
        &*self.node
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.node.methods().into_iter().flat_map(|m| m.values())
    }

    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut Method> {
        self.node.methods_mut().into_iter().flat_map(|m| m.values_mut())
    }

    pub fn method_mut(&mut self, key: &MethodKey) -> Option<&mut Method> {
        self.node.methods_mut().and_then(|m| m.get_mut(key))
    }

    pub fn has_instrumentation_points(&self) -> bool {
        self.node.has_instrumentation_points()
    }

    /// Removes every method's instrumentation; returns whether any existed.
    pub fn clear_instrumentation(&mut self) -> bool {
        let mut removed = false;
        for method in self.methods_mut() {
            removed |= method.clear_instrumentation();
        }
        removed
    }
}

/// Decides which methods of a class get instrumented for one sensor.
pub trait InstrumentationApplier: Send + Sync {
    /// Returns `true` if the class was changed.
    fn add_instrumentation_points(&self, agent: &AgentConfig, class: &mut InstrumentableClass<'_>) -> bool;

    /// Returns `true` if the class was changed. Drops everything by default.
    fn remove_instrumentation_points(&self, class: &mut InstrumentableClass<'_>) -> bool {
        class.clear_instrumentation()
    }

    /// Scope used to narrow the candidate classes; `None` means all classes.
    fn sensor_assignment(&self) -> Option<&SensorAssignment> {
        None
    }
}

/// Applier used for removal when the caller supplies none.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveAllInstrumentationApplier;

impl InstrumentationApplier for RemoveAllInstrumentationApplier {
    fn add_instrumentation_points(&self, _agent: &AgentConfig, _class: &mut InstrumentableClass<'_>) -> bool {
        false
    }
}

/// Attaches the assignment's sensor to every method matching the
/// assignment's method name pattern and parameter list.
#[derive(Debug, Clone)]
pub struct SensorAssignmentApplier {
    assignment: SensorAssignment,
    method_pattern: Option<FqnPattern>,
}

impl SensorAssignmentApplier {
    pub fn new(assignment: SensorAssignment) -> Result<Self> {
        let method_pattern = assignment
            .method_name
            .as_deref()
            .map(FqnPattern::parse)
            .transpose()?;
        Ok(Self {
            assignment,
            method_pattern,
        })
    }

    fn selects(&self, method: &Method) -> bool {
        if let Some(pattern) = &self.method_pattern {
            if !pattern.matches(method.name()) {
                return false;
            }
        }
        match &self.assignment.parameters {
            Some(expected) => {
                expected.len() == method.parameters().len()
                    && expected.iter().zip(method.parameters()).all(|(e, p)| e == p.as_str())
            }
            None => true,
        }
    }
}

impl InstrumentationApplier for SensorAssignmentApplier {
    fn add_instrumentation_points(&self, _agent: &AgentConfig, class: &mut InstrumentableClass<'_>) -> bool {
        let fqn = class.fqn().to_string();
        let sensor_id = self.assignment.sensor_id;
        let mut added = false;
        for method in class.methods_mut() {
            if self.selects(method) {
                added |= method.instrumentation_or_insert(&fqn).add_sensor(sensor_id);
            }
        }
        added
    }

    /// Detaches this sensor only; a method left without sensors loses its
    /// instrumentation entirely.
    fn remove_instrumentation_points(&self, class: &mut InstrumentableClass<'_>) -> bool {
        let sensor_id = self.assignment.sensor_id;
        let mut removed = false;
        for method in class.methods_mut() {
            let Some(config) = method.instrumentation.as_mut() else {
                continue;
            };
            if config.remove_sensor(sensor_id) {
                removed = true;
                if config.is_empty() {
                    method.clear_instrumentation();
                }
            }
        }
        removed
    }

    fn sensor_assignment(&self) -> Option<&SensorAssignment> {
        Some(&self.assignment)
    }
}

//! Instrumentation decision models exchanged with the sensor-assignment layer
//! and the agent transport.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration of the agent the instrumentation is computed for.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct AgentConfig {
    pub platform_id: u64,
    pub agent_name: String,
}

impl AgentConfig {
    pub fn new(platform_id: u64, agent_name: impl Into<String>) -> Self {
        Self {
            platform_id,
            agent_name: agent_name.into(),
        }
    }
}

/// Class-level selector of a sensor assignment.
///
/// `class_name` is a wildcard pattern. Depending on the flags it names the
/// class itself, an interface the class realizes, or a superclass of it.
/// `annotation`, when set, further requires the class (or one of its methods)
/// to carry a matching annotation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct SensorAssignment {
    pub sensor_id: u64,
    pub class_name: String,
    #[serde(default)]
    pub interface: bool,
    #[serde(default)]
    pub superclass: bool,
    #[serde(default)]
    pub annotation: Option<String>,
    /// Wildcard pattern on method names; `None` selects every method.
    #[serde(default)]
    pub method_name: Option<String>,
    /// Exact parameter list; `None` accepts any signature.
    #[serde(default)]
    pub parameters: Option<Vec<String>>,
}

impl SensorAssignment {
    pub fn for_class(sensor_id: u64, class_name: impl Into<String>) -> Self {
        Self {
            sensor_id,
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn for_interface(sensor_id: u64, interface_name: impl Into<String>) -> Self {
        Self {
            interface: true,
            ..Self::for_class(sensor_id, interface_name)
        }
    }

    pub fn for_superclass(sensor_id: u64, superclass_name: impl Into<String>) -> Self {
        Self {
            superclass: true,
            ..Self::for_class(sensor_id, superclass_name)
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn with_method_name(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = Some(method_name.into());
        self
    }
}

/// Instrumentation attached to a single method.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct MethodInstrumentationConfig {
    pub target_class_fqn: String,
    pub target_method_name: String,
    pub return_type: Option<String>,
    pub parameter_types: Vec<String>,
    pub sensor_ids: BTreeSet<u64>,
}

impl MethodInstrumentationConfig {
    pub fn new(
        target_class_fqn: impl Into<String>,
        target_method_name: impl Into<String>,
        return_type: Option<String>,
        parameter_types: Vec<String>,
    ) -> Self {
        Self {
            target_class_fqn: target_class_fqn.into(),
            target_method_name: target_method_name.into(),
            return_type,
            parameter_types,
            sensor_ids: BTreeSet::new(),
        }
    }

    /// Returns `true` if the sensor was not yet attached.
    pub fn add_sensor(&mut self, sensor_id: u64) -> bool {
        self.sensor_ids.insert(sensor_id)
    }

    pub fn remove_sensor(&mut self, sensor_id: u64) -> bool {
        self.sensor_ids.remove(&sensor_id)
    }

    pub fn is_empty(&self) -> bool {
        self.sensor_ids.is_empty()
    }
}

/// Everything the agent needs to instrument one class.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct InstrumentationResult {
    pub class_fqn: String,
    pub method_instrumentation_configs: Vec<MethodInstrumentationConfig>,
}

impl InstrumentationResult {
    pub fn new(class_fqn: impl Into<String>) -> Self {
        Self {
            class_fqn: class_fqn.into(),
            method_instrumentation_configs: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.method_instrumentation_configs.is_empty()
    }
}

//! Instrumentation engine: narrowing, adding and removing points

use classcache_api::{
    AgentConfig, AnnotationDescriptor, ClassDescriptor, InterfaceDescriptor, MethodDescriptor, Modifiers,
    SensorAssignment, TypeDescriptor,
};
use classcache_core::instrumentation::SensorAssignmentApplier;
use classcache_core::model::TypeNode;
use classcache_core::{
    ClassCache, InstrumentableClass, InstrumentationApplier, LookupService, Result, SearchNarrower,
    SharedApplier,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn agent() -> AgentConfig {
    AgentConfig::new(7, "checkout-agent")
}

fn class(fqn: &str) -> ClassDescriptor {
    ClassDescriptor::observed(fqn, format!("hash-{fqn}"), Modifiers::PUBLIC)
}

fn method(name: &str, params: &[&str]) -> MethodDescriptor {
    MethodDescriptor::new(name, params.iter().copied()).returning("void")
}

fn assignment_applier(assignment: SensorAssignment) -> SharedApplier {
    Arc::new(SensorAssignmentApplier::new(assignment).unwrap())
}

fn sorted_fqns(nodes: &[TypeNode]) -> Vec<String> {
    let mut fqns: Vec<String> = nodes.iter().map(|n| n.fqn().to_string()).collect();
    fqns.sort();
    fqns
}

fn order_cache() -> ClassCache {
    let cache = ClassCache::new();
    let batch: Vec<TypeDescriptor> = vec![
        class("com.acme.OrderService")
            .with_method(method("placeOrder", &["com.acme.Order"]))
            .with_method(method("cancel", &["long"]))
            .with_method(method("getId", &[]))
            .into(),
        class("com.acme.Other").with_method(method("run", &[])).into(),
        ClassDescriptor::placeholder("com.acme.OrderPlaceholder").into(),
    ];
    cache.merge_all(batch).unwrap();
    cache
}

/// Repository hierarchy:
/// `x.Repository <- x.UserRepository` (interfaces),
/// `x.JdbcRepository` realizes `x.Repository`, `x.CachedRepository` extends it,
/// `x.UserRepositoryImpl` realizes `x.UserRepository`.
fn repository_cache() -> ClassCache {
    let cache = ClassCache::new();
    let batch: Vec<TypeDescriptor> = vec![
        InterfaceDescriptor::observed("x.Repository", "h-repo", Modifiers::PUBLIC).into(),
        InterfaceDescriptor::observed("x.UserRepository", "h-user-repo", Modifiers::PUBLIC)
            .with_super_interface(InterfaceDescriptor::placeholder("x.Repository"))
            .into(),
        class("x.JdbcRepository")
            .with_interface(InterfaceDescriptor::placeholder("x.Repository"))
            .with_method(method("find", &["long"]))
            .into(),
        class("x.CachedRepository")
            .with_superclass(ClassDescriptor::placeholder("x.JdbcRepository"))
            .with_method(method("find", &["long"]))
            .into(),
        class("x.UserRepositoryImpl")
            .with_interface(InterfaceDescriptor::placeholder("x.UserRepository"))
            .with_method(method("find", &["long"]))
            .into(),
        class("x.Unrelated").with_method(method("find", &["long"])).into(),
    ];
    cache.merge_all(batch).unwrap();
    cache
}

/// Sensor on every method of every class it is offered.
struct EveryMethodApplier(u64);

impl InstrumentationApplier for EveryMethodApplier {
    fn add_instrumentation_points(&self, _agent: &AgentConfig, class: &mut InstrumentableClass<'_>) -> bool {
        let fqn = class.fqn().to_string();
        let mut added = false;
        for method in class.methods_mut() {
            added |= method.instrumentation_or_insert(&fqn).add_sensor(self.0);
        }
        added
    }
}

fn every_method(sensor_id: u64) -> SharedApplier {
    Arc::new(EveryMethodApplier(sensor_id))
}

/// Narrower returning a fixed list of classes.
struct FixedNarrower(Vec<&'static str>);

impl SearchNarrower for FixedNarrower {
    fn narrow_by_assignment(
        &self,
        lookup: &LookupService<'_>,
        _assignment: &SensorAssignment,
    ) -> Result<Vec<TypeNode>> {
        let mut found = Vec::new();
        for fqn in &self.0 {
            found.extend(lookup.find_by_fqn(fqn)?);
        }
        Ok(found)
    }
}

#[test]
fn test_add_by_class_name_and_method() {
    let cache = order_cache();
    let applier = assignment_applier(SensorAssignment::for_class(11, "com.acme.Order*").with_method_name("*Order"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert_eq!(sorted_fqns(&changed), vec!["com.acme.OrderService"]);
    let results = cache.instrumentation().instrumentation_results().unwrap();
    assert_eq!(results.len(), 1);
    let configs = &results[0].method_instrumentation_configs;
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].target_class_fqn, "com.acme.OrderService");
    assert_eq!(configs[0].target_method_name, "placeOrder");
    assert_eq!(configs[0].parameter_types, vec!["com.acme.Order".to_string()]);
    assert_eq!(configs[0].return_type.as_deref(), Some("void"));
    assert_eq!(configs[0].sensor_ids, BTreeSet::from([11]));
}

#[test]
fn test_parameters_must_match_exactly() {
    let cache = order_cache();
    let mut assignment = SensorAssignment::for_class(3, "com.acme.OrderService");
    assignment.parameters = Some(vec!["long".to_string()]);

    cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[assignment_applier(assignment)])
        .unwrap();

    let results = cache.instrumentation().instrumentation_results().unwrap();
    let names: Vec<&str> = results[0]
        .method_instrumentation_configs
        .iter()
        .map(|c| c.target_method_name.as_str())
        .collect();
    assert_eq!(names, vec!["cancel"]);
}

#[test]
fn test_empty_narrowing_skips_write_lock() {
    let cache = order_cache();
    let writes = cache.write_acquisitions();
    let applier = assignment_applier(SensorAssignment::for_class(1, "org.nowhere.*"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert!(changed.is_empty());
    assert_eq!(cache.write_acquisitions(), writes);
}

#[test]
fn test_remove_on_empty_cache_takes_no_write_lock() {
    let cache = ClassCache::new();

    let removed = cache
        .instrumentation()
        .remove_instrumentation_points(None, None)
        .unwrap();

    assert!(removed.is_empty());
    assert_eq!(cache.write_acquisitions(), 0);
}

#[test]
fn test_add_on_empty_cache_takes_no_write_lock() {
    let cache = ClassCache::new();

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[every_method(1)])
        .unwrap();

    assert!(changed.is_empty());
    assert_eq!(cache.write_acquisitions(), 0);
}

#[test]
fn test_add_without_initialized_classes_takes_no_write_lock() {
    let cache = ClassCache::new();
    let batch: Vec<TypeDescriptor> = vec![
        InterfaceDescriptor::observed("x.Api", "h-api", Modifiers::PUBLIC).into(),
        ClassDescriptor::placeholder("x.NotLoaded").into(),
    ];
    cache.merge_all(batch).unwrap();
    let writes = cache.write_acquisitions();

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[every_method(1), every_method(2)])
        .unwrap();

    assert!(changed.is_empty());
    assert_eq!(cache.write_acquisitions(), writes);
}

#[test]
fn test_remove_for_no_types_takes_no_lock() {
    let cache = order_cache();
    let reads = cache.read_acquisitions();
    let writes = cache.write_acquisitions();

    let no_types: &[TypeNode] = &[];

    let removed = cache
        .instrumentation()
        .remove_instrumentation_points(Some(no_types), None)
        .unwrap();

    assert!(removed.is_empty());
    assert_eq!(cache.read_acquisitions(), reads);
    assert_eq!(cache.write_acquisitions(), writes);
}

#[test]
fn test_narrow_by_interface() {
    let cache = repository_cache();
    let applier = assignment_applier(SensorAssignment::for_interface(5, "x.Repository"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert_eq!(
        sorted_fqns(&changed),
        vec!["x.CachedRepository", "x.JdbcRepository", "x.UserRepositoryImpl"]
    );
}

#[test]
fn test_narrow_by_interface_includes_realized_annotations() {
    let cache = ClassCache::new();
    let batch: Vec<TypeDescriptor> = vec![
        class("x.Impl")
            .with_interface(AnnotationDescriptor::placeholder("x.Marker"))
            .with_method(method("run", &[]))
            .into(),
        class("x.SubImpl")
            .with_superclass(ClassDescriptor::placeholder("x.Impl"))
            .with_method(method("run", &[]))
            .into(),
        class("x.Other").with_method(method("run", &[])).into(),
    ];
    cache.merge_all(batch).unwrap();
    let applier = assignment_applier(SensorAssignment::for_interface(5, "x.Marker"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert_eq!(sorted_fqns(&changed), vec!["x.Impl", "x.SubImpl"]);
}

#[test]
fn test_narrow_by_superclass() {
    let cache = repository_cache();
    let applier = assignment_applier(SensorAssignment::for_superclass(6, "x.JdbcRepository"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert_eq!(sorted_fqns(&changed), vec!["x.CachedRepository"]);
}

#[test]
fn test_narrow_by_annotation() {
    let cache = ClassCache::new();
    let batch: Vec<TypeDescriptor> = vec![
        class("y.Controller")
            .with_annotation(AnnotationDescriptor::placeholder("y.Timed"))
            .with_method(method("handle", &[]))
            .into(),
        class("y.SubController")
            .with_superclass(ClassDescriptor::placeholder("y.Controller"))
            .with_method(method("handle", &[]))
            .into(),
        class("y.Service")
            .with_method(method("work", &[]).with_annotation(AnnotationDescriptor::placeholder("y.Timed")))
            .into(),
        class("y.Plain").with_method(method("work", &[])).into(),
    ];
    cache.merge_all(batch).unwrap();
    let applier = assignment_applier(SensorAssignment::for_class(8, "*").with_annotation("y.Timed"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert_eq!(sorted_fqns(&changed), vec!["y.Controller", "y.Service", "y.SubController"]);
}

#[test]
fn test_applier_without_assignment_sees_initialized_classes() {
    let cache = repository_cache();
    cache
        .merge(
            class("x.Lazy")
                .with_superclass(ClassDescriptor::placeholder("x.NotLoaded"))
                .with_method(method("load", &[]))
                .into(),
        )
        .unwrap();

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[every_method(1)])
        .unwrap();

    assert_eq!(
        sorted_fqns(&changed),
        vec![
            "x.CachedRepository",
            "x.JdbcRepository",
            "x.Lazy",
            "x.Unrelated",
            "x.UserRepositoryImpl"
        ]
    );
    assert_eq!(cache.stats().unwrap().instrumented_count, 5);
}

#[test]
fn test_changed_classes_are_reported_once() {
    let cache = order_cache();
    let appliers: Vec<SharedApplier> = vec![
        assignment_applier(SensorAssignment::for_class(1, "com.acme.OrderService")),
        assignment_applier(SensorAssignment::for_class(2, "com.acme.*")),
    ];

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &appliers)
        .unwrap();

    assert_eq!(sorted_fqns(&changed), vec!["com.acme.OrderService", "com.acme.Other"]);
    let service = changed.iter().find(|n| n.fqn() == "com.acme.OrderService").unwrap();
    let sensors: Vec<BTreeSet<u64>> = service
        .instrumentation_points()
        .into_iter()
        .map(|c| c.sensor_ids)
        .collect();
    assert!(sensors.iter().all(|s| *s == BTreeSet::from([1, 2])));
}

#[test]
fn test_repeated_add_changes_nothing() {
    let cache = order_cache();
    let applier = assignment_applier(SensorAssignment::for_class(1, "com.acme.Other"));
    let instrumentation = cache.instrumentation();

    assert_eq!(
        instrumentation
            .add_instrumentation_points(&agent(), std::slice::from_ref(&applier))
            .unwrap()
            .len(),
        1
    );
    assert!(instrumentation
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap()
        .is_empty());
}

#[test]
fn test_remove_everything() {
    let cache = repository_cache();
    cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[every_method(1)])
        .unwrap();

    let removed = cache
        .instrumentation()
        .remove_instrumentation_points(None, None)
        .unwrap();

    assert_eq!(removed.len(), 4);
    assert!(removed.iter().all(|n| !n.has_instrumentation_points()));
    assert!(cache.instrumentation().instrumentation_results().unwrap().is_empty());
    assert!(cache.lookup().find_instrumented_types().unwrap().is_empty());
}

#[test]
fn test_remove_single_sensor() {
    let cache = order_cache();
    let first = assignment_applier(SensorAssignment::for_class(1, "com.acme.Other"));
    let second = assignment_applier(SensorAssignment::for_class(2, "com.acme.Other"));
    cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[first.clone(), second])
        .unwrap();
    let other = cache.lookup().find_by_fqn("com.acme.Other").unwrap().unwrap();

    let removed = cache
        .instrumentation()
        .remove_instrumentation_points(Some(std::slice::from_ref(&other)), Some(std::slice::from_ref(&first)))
        .unwrap();

    assert_eq!(removed.len(), 1);
    let points = removed[0].instrumentation_points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].sensor_ids, BTreeSet::from([2]));
}

#[test]
fn test_instrument_single_class() {
    let cache = order_cache();
    let service = cache.lookup().find_by_fqn("com.acme.OrderService").unwrap().unwrap();
    let applier = assignment_applier(SensorAssignment::for_class(4, "com.acme.OrderService").with_method_name("get*"));

    let result = cache
        .instrumentation()
        .instrument(&service, &agent(), &[applier])
        .unwrap()
        .unwrap();

    assert_eq!(result.class_fqn, "com.acme.OrderService");
    assert_eq!(result.method_instrumentation_configs.len(), 1);
    assert_eq!(result.method_instrumentation_configs[0].target_method_name, "getId");
}

#[test]
fn test_instrument_without_effect() {
    let cache = order_cache();
    let service = cache.lookup().find_by_fqn("com.acme.OrderService").unwrap().unwrap();
    let placeholder = cache
        .lookup()
        .find_by_fqn("com.acme.OrderPlaceholder")
        .unwrap()
        .unwrap();
    let applier = assignment_applier(SensorAssignment::for_class(4, "*").with_method_name("nothing*"));
    let writes = cache.write_acquisitions();

    let on_placeholder = cache
        .instrumentation()
        .instrument(&placeholder, &agent(), std::slice::from_ref(&applier))
        .unwrap();
    assert!(on_placeholder.is_none());
    assert_eq!(cache.write_acquisitions(), writes);

    let unmatched = cache
        .instrumentation()
        .instrument(&service, &agent(), &[applier])
        .unwrap();
    assert!(unmatched.is_none());
}

#[test]
fn test_results_keyed_by_hashes() {
    let cache = order_cache();
    cache
        .merge(ClassDescriptor::observed("com.acme.Other", "second-hash", Modifiers::PUBLIC).into())
        .unwrap();
    cache
        .instrumentation()
        .add_instrumentation_points(
            &agent(),
            &[assignment_applier(SensorAssignment::for_class(1, "com.acme.Other"))],
        )
        .unwrap();

    let results = cache
        .instrumentation()
        .instrumentation_results_with_hashes()
        .unwrap();

    let key = BTreeSet::from(["hash-com.acme.Other".to_string(), "second-hash".to_string()]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[&key].class_fqn, "com.acme.Other");
}

#[test]
fn test_custom_narrower() {
    let cache = repository_cache().with_search_narrower(FixedNarrower(vec!["x.Unrelated", "x.Repository"]));
    let applier = assignment_applier(SensorAssignment::for_class(9, "ignored"));

    let changed = cache
        .instrumentation()
        .add_instrumentation_points(&agent(), &[applier])
        .unwrap();

    assert_eq!(sorted_fqns(&changed), vec!["x.Unrelated"]);
}

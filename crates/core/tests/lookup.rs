//! Lookup service queries

use classcache_api::{AnnotationDescriptor, ClassDescriptor, InterfaceDescriptor, Modifiers, TypeDescriptor};
use classcache_core::{ClassCache, ClassCacheConfig};

fn class(fqn: &str) -> ClassDescriptor {
    ClassDescriptor::observed(fqn, format!("hash-{fqn}"), Modifiers::PUBLIC)
}

fn fqns(nodes: &[classcache_core::model::TypeNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.fqn()).collect()
}

fn exception_cache(config: ClassCacheConfig) -> ClassCache {
    let throwable = config.throwable_fqn.clone();
    let cache = ClassCache::with_config(config);
    let batch: Vec<TypeDescriptor> = vec![
        class("java.lang.Exception")
            .with_superclass(ClassDescriptor::placeholder(throwable))
            .into(),
        class("a.MyException")
            .with_superclass(ClassDescriptor::placeholder("java.lang.Exception"))
            .into(),
        class("a.DeepException")
            .with_superclass(ClassDescriptor::placeholder("a.MyException"))
            .into(),
        class("a.Plain").into(),
        class("a.Faulty")
            .with_superclass(ClassDescriptor::placeholder("a.UnknownBase"))
            .into(),
    ];
    cache.merge_all(batch).unwrap();
    cache
}

#[test]
fn test_wildcard_inside_pattern() {
    let cache = ClassCache::new();
    cache.merge(class("pattttern").into()).unwrap();
    cache.merge(class("patsomething").into()).unwrap();

    let found = cache.lookup().find_by_pattern("pat*tern", true).unwrap();

    assert_eq!(fqns(&found), vec!["pattttern"]);
}

#[test]
fn test_prefix_and_suffix_must_not_overlap() {
    let cache = ClassCache::new();
    cache.merge(class("abcd").into()).unwrap();

    assert!(cache.lookup().find_by_pattern("abc*bcd", false).unwrap().is_empty());
    assert_eq!(cache.lookup().find_by_pattern("ab*cd", false).unwrap().len(), 1);
}

#[test]
fn test_exact_and_prefix_patterns() {
    let cache = ClassCache::new();
    for fqn in ["com.acme.Order", "com.acme.OrderService", "com.acme.Invoice", "org.other.Order"] {
        cache.merge(class(fqn).into()).unwrap();
    }

    let exact = cache.lookup().find_by_pattern("com.acme.Order", true).unwrap();
    assert_eq!(fqns(&exact), vec!["com.acme.Order"]);

    let mut prefixed = cache.lookup().find_by_pattern("com.acme.*", true).unwrap();
    prefixed.sort_by(|a, b| a.fqn().cmp(b.fqn()));
    assert_eq!(
        fqns(&prefixed),
        vec!["com.acme.Invoice", "com.acme.Order", "com.acme.OrderService"]
    );

    let suffixed = cache.lookup().find_by_pattern("*Order", true).unwrap();
    assert_eq!(suffixed.len(), 2);

    assert_eq!(cache.lookup().find_by_pattern("*", true).unwrap().len(), 4);
}

#[test]
fn test_several_wildcards() {
    let cache = ClassCache::new();
    for fqn in ["com.acme.web.OrderController", "com.acme.dao.OrderDao", "com.acme.web.Index"] {
        cache.merge(class(fqn).into()).unwrap();
    }

    let found = cache.lookup().find_by_pattern("com.*.Order*", true).unwrap();

    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|n| n.fqn().contains(".Order")));
}

#[test]
fn test_only_initialized_filter() {
    let cache = ClassCache::new();
    cache
        .merge(
            class("p.Child")
                .with_superclass(ClassDescriptor::placeholder("p.Parent"))
                .into(),
        )
        .unwrap();

    assert_eq!(cache.lookup().find_by_pattern("p.*", true).unwrap().len(), 1);
    assert_eq!(cache.lookup().find_by_pattern("p.*", false).unwrap().len(), 2);
    assert!(cache.lookup().find_by_pattern("p.Parent", true).unwrap().is_empty());
}

#[test]
fn test_every_hash_resolves_to_its_node() {
    let cache = ClassCache::new();
    cache
        .merge(ClassDescriptor::observed("A", "h1", Modifiers::PUBLIC).into())
        .unwrap();
    cache
        .merge(ClassDescriptor::observed("A", "h2", Modifiers::PUBLIC).into())
        .unwrap();

    let lookup = cache.lookup();
    assert_eq!(lookup.find_by_hash("h1").unwrap().unwrap().fqn(), "A");
    assert_eq!(lookup.find_by_hash("h2").unwrap().unwrap().fqn(), "A");
    assert!(lookup.find_by_hash("h3").unwrap().is_none());
    assert_eq!(cache.stats().unwrap().hash_count, 2);
}

#[test]
fn test_variant_filters() {
    let cache = ClassCache::new();
    let batch: Vec<TypeDescriptor> = vec![
        class("x.Service")
            .with_interface(InterfaceDescriptor::placeholder("x.Api"))
            .with_annotation(AnnotationDescriptor::placeholder("x.Marker"))
            .into(),
        InterfaceDescriptor::observed("x.Api", "h-api", Modifiers::PUBLIC).into(),
        AnnotationDescriptor::observed("x.Marker", "h-marker", Modifiers::PUBLIC).into(),
    ];
    cache.merge_all(batch).unwrap();

    let lookup = cache.lookup();
    assert_eq!(fqns(&lookup.find_class_types_by_pattern("x.*", true).unwrap()), vec!["x.Service"]);
    assert_eq!(fqns(&lookup.find_interface_types_by_pattern("x.*", true).unwrap()), vec!["x.Api"]);
    assert_eq!(
        fqns(&lookup.find_annotation_types_by_pattern("x.*", true).unwrap()),
        vec!["x.Marker"]
    );
}

#[test]
fn test_exception_types_follow_superclass_chain() {
    let cache = exception_cache(ClassCacheConfig::default());

    let mut found = cache
        .lookup()
        .find_exception_types_by_pattern("a.*", true)
        .unwrap();
    found.sort_by(|a, b| a.fqn().cmp(b.fqn()));

    assert_eq!(fqns(&found), vec!["a.DeepException", "a.MyException"]);
}

#[test]
fn test_exception_root_is_configurable() {
    let config = ClassCacheConfig {
        throwable_fqn: "custom.Failure".to_string(),
        ..Default::default()
    };
    let cache = exception_cache(config);

    let found = cache
        .lookup()
        .find_exception_types_by_pattern("java.lang.*", false)
        .unwrap();

    assert_eq!(fqns(&found), vec!["java.lang.Exception"]);
    assert!(cache
        .lookup()
        .find_exception_types_by_pattern("java.lang.Throwable", false)
        .unwrap()
        .is_empty());
}

#[test]
fn test_find_all_is_sorted() {
    let cache = ClassCache::new();
    for fqn in ["c.C", "a.A", "b.B"] {
        cache.merge(class(fqn).into()).unwrap();
    }

    let all = cache.lookup().find_all().unwrap();

    assert_eq!(fqns(&all), vec!["a.A", "b.B", "c.C"]);
}

#[test]
fn test_results_are_snapshots() {
    let cache = ClassCache::new();
    cache.merge(class("A").into()).unwrap();
    let before = cache.lookup().find_by_fqn("A").unwrap().unwrap();

    cache
        .merge(ClassDescriptor::observed("A", "second", Modifiers::FINAL).into())
        .unwrap();

    assert_eq!(before.hashes().len(), 1);
    assert_eq!(cache.lookup().find_by_fqn("A").unwrap().unwrap().hashes().len(), 2);
}

#[test]
fn test_reset_empties_every_index() {
    let cache = ClassCache::new();
    cache.merge(class("A").into()).unwrap();

    cache.reset().unwrap();

    assert!(cache.lookup().find_by_fqn("A").unwrap().is_none());
    assert!(cache.lookup().find_by_hash("hash-A").unwrap().is_none());
    assert!(cache.lookup().find_by_pattern("*", false).unwrap().is_empty());
    assert_eq!(cache.stats().unwrap(), Default::default());
}

#[test]
fn test_graph_queries_under_one_lock() {
    let cache = ClassCache::new();
    cache
        .merge(
            class("C")
                .with_superclass(ClassDescriptor::placeholder("B"))
                .into(),
        )
        .unwrap();
    cache
        .merge(
            class("B")
                .with_superclass(ClassDescriptor::placeholder("A"))
                .into(),
        )
        .unwrap();
    let reads = cache.read_acquisitions();

    let closure = cache
        .lookup()
        .with_graph(|graph| graph.superclass_closure("C"))
        .unwrap();

    assert_eq!(closure.len(), 2);
    assert_eq!(cache.read_acquisitions(), reads + 1);
}

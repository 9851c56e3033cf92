use pretty_assertions::assert_eq;
use warren_fetch::MemoryRegistry;

mod support;
use support::{installer, project};

#[async_std::test]
async fn single_dependency_resolves_and_hoists_to_root() {
    // Root depends on `a@^1.0.0`; the registry has a@1.2.3 with no deps.
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.2.3" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } }"#,
    );

    let (ideal, warnings) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert!(warnings.is_empty());
    assert_eq!(ideal.render_paths(), "a 1.2.3\n");
}

#[async_std::test]
async fn conflicting_transitive_nests_below_its_dependent() {
    // Root depends on a@^1 (which wants b@^1) and on b@^2. The root slot
    // for `b` goes to b@2; a's b@^1 nests under a.
    let registry = MemoryRegistry::new();
    registry.publish_json(
        r#"{ "name": "a", "version": "1.0.0", "dependencies": { "b": "^1.0.0" } }"#,
    );
    registry.publish_json(r#"{ "name": "b", "version": "1.5.0" }"#);
    registry.publish_json(r#"{ "name": "b", "version": "2.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0", "b": "^2.0.0" }
        }"#,
    );

    let (ideal, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(
        ideal.render_paths(),
        "a 1.0.0\na/node_modules/b 1.5.0\nb 2.0.0\n",
    );
}

#[async_std::test]
async fn satisfied_transitive_reuses_the_hoisted_copy() {
    // b@1 wants a@^1, which the root already hoisted; no second copy of `a`
    // may appear.
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.2.3" }"#);
    registry.publish_json(
        r#"{ "name": "b", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } }"#,
    );

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0", "b": "^1.0.0" }
        }"#,
    );

    let (ideal, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "a 1.2.3\nb 1.0.0\n");
}

#[async_std::test]
async fn explicit_args_install_at_the_root() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "a", "version": "2.1.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(root.path(), r#"{ "name": "root", "version": "1.0.0" }"#);

    // A bare name resolves through the default dist-tag.
    let (ideal, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec!["a".into()])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "a 2.1.0\n");
}

#[async_std::test]
async fn production_mode_skips_dev_dependencies() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "d", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0" },
            "devDependencies": { "d": "^1.0.0" }
        }"#,
    );

    let (ideal, _) = installer(root.path(), &registry)
        .production(true)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "a 1.0.0\n");

    let (with_dev, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(with_dev.render_paths(), "a 1.0.0\nd 1.0.0\n");
}

#[async_std::test]
async fn dev_dependency_transitives_stay_below_the_dev_dependency() {
    // d is a dev dep of the root and wants c@^1. Even though the root slot
    // for `c` is free, dev transitives do not hoist past their dev parent.
    let registry = MemoryRegistry::new();
    registry.publish_json(
        r#"{ "name": "d", "version": "1.0.0", "dependencies": { "c": "^1.0.0" } }"#,
    );
    registry.publish_json(r#"{ "name": "c", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "devDependencies": { "d": "^1.0.0" }
        }"#,
    );

    let (ideal, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "d 1.0.0\nd/node_modules/c 1.0.0\n");
}

#[async_std::test]
async fn dev_entries_shadowed_by_runtime_deps_are_ignored() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "x", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "x", "version": "2.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "x": "^1.0.0" },
            "devDependencies": { "x": "^2.0.0" }
        }"#,
    );

    let (ideal, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "x 1.0.0\n");
}

#[async_std::test]
async fn optional_resolution_failure_downgrades_to_a_warning() {
    // `opt` is not published at all; the install must still succeed, with
    // the optional subtree absent.
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0" },
            "optionalDependencies": { "opt": "^1.0.0" }
        }"#,
    );

    let (ideal, warnings) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "a 1.0.0\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("opt"));
}

#[async_std::test]
async fn missing_required_dependency_is_fatal() {
    let registry = MemoryRegistry::new();

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "ghost": "^1.0.0" }
        }"#,
    );

    let result = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await;
    assert!(result.is_err());
}

#[async_std::test]
async fn embedded_shrinkwrap_overrides_range_resolution() {
    // a@1.0.0 ships a shrinkwrap pinning b@1.0.0, even though its manifest
    // range would prefer b@1.9.0.
    let registry = MemoryRegistry::new();
    registry.publish_json(
        r#"{
            "name": "a",
            "version": "1.0.0",
            "dependencies": { "b": "^1.0.0" },
            "shrinkwrap": { "dependencies": { "b": { "version": "1.0.0" } } }
        }"#,
    );
    registry.publish_json(r#"{ "name": "b", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "b", "version": "1.9.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } }"#,
    );

    let (ideal, _) = installer(root.path(), &registry)
        .build()
        .resolve_ideal(vec![])
        .await
        .unwrap();
    assert_eq!(ideal.render_paths(), "a 1.0.0\na/node_modules/b 1.0.0\n");
}

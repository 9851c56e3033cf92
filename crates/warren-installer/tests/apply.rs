use pretty_assertions::assert_eq;
use warren_common::Manifest;
use warren_fetch::MemoryRegistry;

mod support;
use support::{installer, project};

fn manifest(raw: &str) -> Manifest {
    serde_json::from_str(raw).unwrap()
}

fn installed_version(root: &std::path::Path, subpath: &str) -> String {
    let manifest = Manifest::from_path(
        root.join("node_modules")
            .join(subpath)
            .join("package.json"),
    )
    .unwrap();
    manifest.version.unwrap().to_string()
}

#[async_std::test]
async fn install_materializes_the_ideal_tree() {
    let registry = MemoryRegistry::new();
    registry.publish_with_files(
        manifest(r#"{ "name": "a", "version": "1.0.0", "dependencies": { "b": "^1.0.0" } }"#),
        vec![("index.js".into(), b"module.exports = 'a';".to_vec())],
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

    let report = installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert_eq!(report.added, 3);
    assert_eq!(report.removed + report.updated + report.moved, 0);

    let node_modules = root.path().join("node_modules");
    assert!(node_modules.join("a/index.js").exists());
    assert_eq!(installed_version(root.path(), "a"), "1.0.0");
    assert_eq!(installed_version(root.path(), "b"), "2.0.0");
    assert_eq!(installed_version(root.path(), "a/node_modules/b"), "1.5.0");

    // Staging and the install lock are cleaned up on the way out.
    assert!(!node_modules.join(".staging").exists());
    assert!(!node_modules.join(".staging.lock").exists());
}

#[async_std::test]
async fn reinstall_of_a_correct_tree_is_a_no_op() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } }"#,
    );

    let inst = installer(root.path(), &registry).build();
    let first = inst.install(vec![]).await.unwrap();
    assert_eq!(first.added, 1);

    let second = inst.install(vec![]).await.unwrap();
    assert_eq!(second.action_count(), 0);
}

#[async_std::test]
async fn version_bump_becomes_an_update() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "x", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "x": "^1.0.0" } }"#,
    );
    installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert_eq!(installed_version(root.path(), "x"), "1.0.0");

    // The project moves to x@^2 after 2.0.0 ships.
    registry.publish_json(r#"{ "name": "x", "version": "2.0.0" }"#);
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "x": "^2.0.0" } }"#,
    );

    let inst = installer(root.path(), &registry).build();
    let (actions, _) = inst.preview(vec![]).await.unwrap();
    let rendered: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
    assert_eq!(rendered, vec!["update x"]);

    let report = inst.install(vec![]).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(installed_version(root.path(), "x"), "2.0.0");
}

#[async_std::test]
async fn dropped_dependency_is_removed_from_disk() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "b", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0", "b": "^1.0.0" }
        }"#,
    );
    installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert!(root.path().join("node_modules/b").exists());

    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } }"#,
    );
    let report = installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert!(!root.path().join("node_modules/b").exists());
    assert!(root.path().join("node_modules/a").exists());
}

#[cfg(unix)]
#[async_std::test]
async fn lifecycle_scripts_run_in_phase_order() {
    let registry = MemoryRegistry::new();
    registry.publish_json(
        r#"{
            "name": "scripted",
            "version": "1.0.0",
            "scripts": {
                "preinstall": "echo pre >> events.log",
                "install": "echo install >> events.log",
                "postinstall": "echo post >> events.log"
            }
        }"#,
    );

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "scripted": "^1.0.0" } }"#,
    );

    installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();

    // preinstall ran in staging, so its marker traveled into place with the
    // package; install/postinstall appended at the final location.
    let log = std::fs::read_to_string(
        root.path()
            .join("node_modules/scripted/events.log"),
    )
    .unwrap();
    assert_eq!(log, "pre\ninstall\npost\n");
}

#[cfg(unix)]
#[async_std::test]
async fn failing_lifecycle_script_aborts_and_cleans_up() {
    let registry = MemoryRegistry::new();
    registry.publish_json(
        r#"{
            "name": "broken",
            "version": "1.0.0",
            "scripts": { "postinstall": "exit 1" }
        }"#,
    );

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "broken": "^1.0.0" } }"#,
    );

    let result = installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await;
    assert!(result.is_err());

    // Completed serial phases are not rolled back, but staging and the lock
    // are released.
    let node_modules = root.path().join("node_modules");
    assert!(!node_modules.join(".staging").exists());
    assert!(!node_modules.join(".staging.lock").exists());
}

#[cfg(unix)]
#[async_std::test]
async fn optional_install_failure_degrades_to_a_warning() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);
    registry.publish_json(
        r#"{
            "name": "opt",
            "version": "1.0.0",
            "scripts": { "postinstall": "exit 1" }
        }"#,
    );

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

    let report = installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert!(!report.warnings.is_empty());
    assert!(root.path().join("node_modules/a").exists());
}

#[cfg(unix)]
#[async_std::test]
async fn npat_runs_test_scripts() {
    let registry = MemoryRegistry::new();
    registry.publish_json(
        r#"{
            "name": "tested",
            "version": "1.0.0",
            "scripts": { "test": "touch tested-ran" }
        }"#,
    );

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "tested": "^1.0.0" } }"#,
    );

    installer(root.path(), &registry)
        .npat(true)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert!(root
        .path()
        .join("node_modules/tested/tested-ran")
        .exists());
}

#[cfg(unix)]
#[async_std::test]
async fn root_lifecycle_hooks_run_for_plain_installs_only() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0" },
            "scripts": { "postinstall": "touch root-post" }
        }"#,
    );

    installer(root.path(), &registry)
        .build()
        .install(vec!["a@^1.0.0".into()])
        .await
        .unwrap();
    assert!(!root.path().join("root-post").exists());

    installer(root.path(), &registry)
        .build()
        .install(vec![])
        .await
        .unwrap();
    assert!(root.path().join("root-post").exists());
}

#[async_std::test]
async fn explicit_targets_leave_the_rest_of_the_tree_alone() {
    let registry = MemoryRegistry::new();
    registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "b", "version": "1.0.0" }"#);
    registry.publish_json(r#"{ "name": "c", "version": "1.0.0" }"#);

    let root = tempfile::tempdir().unwrap();
    project(
        root.path(),
        r#"{ "name": "root", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } }"#,
    );
    installer(root.path(), &registry)
        .scripts(false)
        .build()
        .install(vec![])
        .await
        .unwrap();

    // The manifest grows a dependency on `c`, but installing `b` explicitly
    // must neither add `c` nor remove anything already installed.
    project(
        root.path(),
        r#"{
            "name": "root",
            "version": "1.0.0",
            "dependencies": { "a": "^1.0.0", "c": "^1.0.0" }
        }"#,
    );
    let report = installer(root.path(), &registry)
        .scripts(false)
        .build()
        .install(vec!["b@^1.0.0".into()])
        .await
        .unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.removed + report.updated + report.moved, 0);
    assert!(root.path().join("node_modules/a").exists());
    assert!(root.path().join("node_modules/b").exists());
    assert!(!root.path().join("node_modules/c").exists());
}

#[async_std::test]
async fn self_install_args_are_discarded() {
    let registry = MemoryRegistry::new();

    let root = tempfile::tempdir().unwrap();
    project(root.path(), r#"{ "name": "root", "version": "1.0.0" }"#);

    let report = installer(root.path(), &registry)
        .scripts(false)
        .build()
        .install(vec!["./".into()])
        .await
        .unwrap();
    assert_eq!(report.action_count(), 0);
    assert!(!root.path().join("node_modules/root").exists());
}

#[async_std::test]
async fn concurrent_install_is_locked_out() {
    let registry = MemoryRegistry::new();
    let root = tempfile::tempdir().unwrap();
    project(root.path(), r#"{ "name": "root", "version": "1.0.0" }"#);

    let node_modules = root.path().join("node_modules");
    let lock = warren_installer::InstallLock::try_acquire(&node_modules, ".staging")
        .await
        .unwrap();

    let result = installer(root.path(), &registry)
        .scripts(false)
        .build()
        .install(vec![])
        .await;
    assert!(matches!(
        result,
        Err(warren_installer::InstallerError::LockFailed { .. })
    ));
    lock.release().await.unwrap();
}

#[async_std::test]
async fn directory_dependencies_install_from_disk() {
    let registry = MemoryRegistry::new();

    let root = tempfile::tempdir().unwrap();
    let lib = root.path().join("lib-src");
    std::fs::create_dir_all(&lib).unwrap();
    std::fs::write(
        lib.join("package.json"),
        r#"{ "name": "lib", "version": "0.1.0" }"#,
    )
    .unwrap();
    std::fs::write(lib.join("main.js"), "exports.lib = 1;").unwrap();

    project(root.path(), r#"{ "name": "root", "version": "1.0.0" }"#);

    let report = installer(root.path(), &registry)
        .scripts(false)
        .build()
        .install(vec!["./lib-src".into()])
        .await
        .unwrap();
    assert_eq!(report.added, 1);
    assert!(root.path().join("node_modules/lib/main.js").exists());
    assert_eq!(installed_version(root.path(), "lib"), "0.1.0");
}

use std::fs;

use code_indexer::search::QueryOptions;
use code_indexer::{IndexerError, ProjectController};
use tempfile::tempdir;

#[tokio::test]
async fn fresh_project_builds_shallow_then_deep_index() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("app.py"),
        "def helper():\n    return 1\n\n\ndef main():\n    helper()\n",
    )
    .unwrap();
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    fs::write(dir.path().join("node_modules/vendored.js"), "ignored").unwrap();

    let controller = ProjectController::new();
    controller
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();

    let files = controller.find_files("*.py").await.unwrap();
    assert_eq!(files, vec!["app.py".to_string()]);

    let deep = controller.build_deep().await.unwrap();
    assert!(deep.files.contains_key("app.py"));
    assert!(!deep.files.contains_key("node_modules/vendored.js"));
    assert_eq!(deep.edges.len(), 1);
    assert_eq!(deep.edges[0].callee_qualified_name, "app.py::helper");
}

#[tokio::test]
async fn glob_find_files_matches_nested_paths() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/sub")).unwrap();
    fs::write(dir.path().join("src/sub/mod.rs"), "fn f() {}\n").unwrap();
    fs::write(dir.path().join("README.md"), "hello\n").unwrap();

    let controller = ProjectController::new();
    controller
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();

    let matches = controller.find_files("src/**/*.rs").await.unwrap();
    assert_eq!(matches, vec!["src/sub/mod.rs".to_string()]);
}

#[tokio::test]
async fn catastrophic_regex_pattern_is_refused_before_dispatch() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello\n").unwrap();

    let controller = ProjectController::new();
    controller
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();

    let mut opts = QueryOptions::default();
    opts.regex = true;
    let err = controller
        .search_code("(a+)+", opts)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::Search(_)));
}

#[tokio::test]
async fn search_code_finds_plain_text_via_builtin_or_external_backend() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "needle here\nnothing\n").unwrap();

    let controller = ProjectController::new();
    controller
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();

    let matches = controller
        .search_code("needle", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].line, 1);
}

#[tokio::test]
async fn deep_index_survives_a_fresh_controller_via_persisted_settings() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();

    let first = ProjectController::new();
    first
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();
    first.build_deep().await.unwrap();

    // A second controller pointed at the same project root picks up the persisted
    // deep index without rebuilding, since `set_project_path` loads it from the
    // Settings Store if present.
    let second = ProjectController::new();
    second
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();
    let summary = second.file_summary("a.py").await.unwrap();
    assert_eq!(summary.symbols.len(), 1);

    first.clear_settings().await.unwrap();
}

#[tokio::test]
async fn clear_settings_resets_state_and_deletes_index_root() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();

    let controller = ProjectController::new();
    controller
        .set_project_path(dir.path().to_path_buf())
        .await
        .unwrap();
    let info = controller.get_settings_info().await.unwrap();
    assert!(std::path::Path::new(&info.project_root).exists());

    controller.clear_settings().await.unwrap();

    let err = controller.find_files("*.py").await.unwrap_err();
    assert!(matches!(err, IndexerError::NotReady));
}

use futures::StreamExt;
use rstest::rstest;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use trawl::error::engine::ErrorKind;
use trawl::{
    Config, Content, CustomLoader, IntegrityTracker, LoadEngine, MemoryHashStore, ResultView, SessionId, Verification,
    bytes_to_human,
};

fn base() -> Config {
    Config { full_posix: false, track_integrity: false, ..Config::default() }
}

fn mixed_directory(dir: &Path) {
    for name in ["one.csv", "two.csv", "three.csv"] {
        fs::write(dir.join(name), "id,name\n1,ada\n").unwrap();
    }
    fs::write(dir.join("readme.txt"), "hello").unwrap();
    fs::write(dir.join("notes.txt"), "world").unwrap();
}

#[tokio::test]
async fn csv_allow_list_yields_only_csv_entries() {
    let temp_dir = tempfile::tempdir().unwrap();
    mixed_directory(temp_dir.path());
    let config = Config { default_extensions: Some(vec!["csv".into()]), ..base() };
    let view = LoadEngine::new(config).unwrap().load_all(temp_dir.path()).await.unwrap();
    let map = view.into_map().unwrap();
    assert_eq!(map.len(), 3);
    assert!(map.keys().all(|key| key.ends_with(".csv")));
    assert!(map.values().all(|contents| contents.kind() == "Table"));
}

#[rstest]
#[case(false, 0)]
#[case(true, 1)]
#[tokio::test]
async fn empty_files_follow_allow_empty(#[case] allow_empty: bool, #[case] expected: usize) {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("empty.txt"), "").unwrap();
    let engine = LoadEngine::new(Config { allow_empty, ..base() }).unwrap();
    let map = engine.load_all(temp_dir.path()).await.unwrap().into_map().unwrap();
    assert_eq!(map.len(), expected);
    if allow_empty {
        assert!(map.get("empty.txt").unwrap().is_empty());
    }
}

#[tokio::test]
async fn unknown_extension_list_is_rejected_with_a_hint() {
    let config = Config { default_extensions: Some(vec!["jsno".into()]), ..base() };
    let err = LoadEngine::new(config).err().unwrap();
    let ErrorKind::Extension(rejection) = &*err else {
        panic!("expected an extension error, got {err:?}");
    };
    assert_eq!(rejection.invalid, ["jsno"]);
    assert_eq!(rejection.suggestion.as_deref(), Some("json"));
}

#[tokio::test]
async fn load_one_is_memoized() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("settings.json");
    fs::write(&path, r#"{"debug": true}"#).unwrap();
    let engine = LoadEngine::new(base()).unwrap();
    let first = engine.load_one(&path).await.unwrap();
    let second = engine.load_one(&path).await.unwrap();
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(first.contents.as_ref().unwrap(), second.contents.as_ref().unwrap()));
}

#[tokio::test]
async fn malformed_file_falls_back_to_raw_text() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("broken.yaml"), "key: [unclosed").unwrap();
    let map = LoadEngine::new(base()).unwrap().load_all(temp_dir.path()).await.unwrap().into_map().unwrap();
    assert_eq!(map.get("broken.yaml").unwrap().as_ref(), &Content::Text("key: [unclosed".into()));
}

#[tokio::test]
async fn custom_loader_receives_bound_options() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("greeting.txt"), "hello").unwrap();
    let loader = CustomLoader::new("suffixing", &["suffix"], |path, options| {
        let body = fs::read_to_string(path).unwrap();
        Ok(Content::Text(format!("{body}{}", options.get("suffix").map(String::as_str).unwrap_or(""))))
    });
    let mut config = base();
    config.loader_options.insert("suffix".into(), "!".into());
    config.loader_options.insert("unused".into(), "x".into());
    let engine = LoadEngine::builder(config).with_loader("txt", loader).build().unwrap();
    let map = engine.load_all(temp_dir.path()).await.unwrap().into_map().unwrap();
    assert_eq!(map.get("greeting.txt").unwrap().as_ref(), &Content::Text("hello!".into()));
}

#[tokio::test]
async fn lazy_view_is_single_pass() {
    let temp_dir = tempfile::tempdir().unwrap();
    mixed_directory(temp_dir.path());
    let engine = LoadEngine::new(Config { generator: true, ..base() }).unwrap();
    let ResultView::Lazy(mut lazy) = engine.load_all(temp_dir.path()).await.unwrap() else {
        panic!("expected a lazy view");
    };
    assert_eq!(lazy.stream().unwrap().count().await, 5);
    assert!(lazy.stream().is_err());
}

#[tokio::test]
async fn loaded_files_verify_until_modified() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("ledger.csv");
    fs::write(&path, "amount\n10\n").unwrap();
    let tracker = IntegrityTracker::new(Arc::new(MemoryHashStore::default()));
    let engine = LoadEngine::builder(Config { track_integrity: true, ..base() })
        .with_tracker(Some(tracker.clone()))
        .build()
        .unwrap();
    engine.load_all(temp_dir.path()).await.unwrap();
    assert!(tracker.verify(&path, Some(engine.session())).unwrap().is_verified());

    fs::write(&path, "amount\n99\n").unwrap();
    assert!(matches!(tracker.verify(&path, None).unwrap(), Verification::Tampered { .. }));
    assert!(matches!(
        tracker.verify(&path, Some(&SessionId::new("elsewhere"))).unwrap(),
        Verification::Unrecorded { .. }
    ));
}

#[tokio::test]
async fn metrics_export_over_loaded_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
    fs::write(temp_dir.path().join("b.txt"), "bb").unwrap();
    let mut config = base();
    config.metrics.export_name = Some(out_dir.path().join("stats"));
    let engine = LoadEngine::new(config).unwrap();
    let map = engine.load_all(temp_dir.path()).await.unwrap().into_map().unwrap();

    let collector = engine.metrics(map.paths());
    assert_eq!(collector.total_files().await.unwrap(), 2);
    let written = engine.export_metrics(map.paths()).await.unwrap();
    assert_eq!(written, out_dir.path().join("stats.json"));
    let document: serde_json::Value = serde_json::from_slice(&fs::read(&written).unwrap()).unwrap();
    let mut keys: Vec<&String> = document.as_object().unwrap().keys().collect();
    keys.sort();
    assert_eq!(keys, ["a.txt", "b.txt"]);
}

#[test]
fn human_sizes() {
    assert!(bytes_to_human(0).is_none());
    let size = bytes_to_human(1536).unwrap();
    assert_eq!((size.symbolic.as_str(), size.value, size.bytes), ("1.50 KB", 1.5, 1536));
}

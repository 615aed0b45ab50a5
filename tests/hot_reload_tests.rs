use fedrouter::cache::{watch_asset_root, CacheClass, CacheStore, Conditional, MemoryCacheStore, ResponseCache};
use fedrouter::hot_reload::watch_config;
use fedrouter::static_files::StaticFiles;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{fixture, get};

const CONFIG_V1: &str = r#"instance:
  clearnet_domain: social.example
blocklist:
  domains: []
"#;

const CONFIG_V2: &str = r#"instance:
  clearnet_domain: social.example
blocklist:
  domains: [peer.example]
  crawlers: [GPTBot]
"#;

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..40 {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    done()
}

#[test]
fn test_watch_config_swaps_blocklist() {
    let f = fixture();
    let path = f.dir.path().join("fedrouter.yaml");
    fs::write(&path, CONFIG_V1).unwrap();

    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reloads);
    let watcher = watch_config(&path, f.dispatcher.blocklist_handle(), move |_cfg| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .expect("watch_config");

    let req = get("/users/alice", "text/html").with_header("Referer", "https://peer.example/@bob");
    assert_eq!(f.dispatch(&req).status, 200);

    // allow watcher thread to start
    std::thread::sleep(Duration::from_millis(100));
    fs::write(&path, CONFIG_V2).unwrap();

    assert!(wait_for(|| f.dispatch(&req).status == 403));
    assert!(reloads.load(Ordering::SeqCst) >= 1);
    drop(watcher);
}

#[test]
fn test_broken_config_keeps_blocklist() {
    let f = fixture();
    let path = f.dir.path().join("fedrouter.yaml");
    fs::write(&path, CONFIG_V2).unwrap();
    let handle = f.dispatcher.blocklist_handle();
    let watcher = watch_config(&path, Arc::clone(&handle), |_| {}).expect("watch_config");

    std::thread::sleep(Duration::from_millis(100));
    fs::write(&path, "blocklist: [unterminated").unwrap();
    std::thread::sleep(Duration::from_millis(300));

    // the fixture's own list is still active
    assert!(handle.load().is_blocked_domain("spam.example"));
    drop(watcher);
}

#[test]
fn test_asset_watch_evicts_changed_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("icons")).unwrap();
    let file = dir.path().join("icons/like.png");
    fs::write(&file, b"v1").unwrap();

    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(4));
    let cache = ResponseCache::new(Arc::clone(&store), Some(StaticFiles::new(dir.path())), None);
    let cond = Conditional::default();
    let first = cache.serve(CacheClass::Static, "icons/like.png", &cond).unwrap();
    assert_eq!(&*first.entry().bytes, b"v1");
    assert_eq!(store.len(), 1);

    let watcher = watch_asset_root(dir.path(), Arc::clone(&store)).expect("watch_asset_root");
    std::thread::sleep(Duration::from_millis(100));
    fs::write(&file, b"v2").unwrap();

    assert!(wait_for(|| store.is_empty()));
    let second = cache.serve(CacheClass::Static, "icons/like.png", &cond).unwrap();
    assert_eq!(&*second.entry().bytes, b"v2");
    drop(watcher);
}

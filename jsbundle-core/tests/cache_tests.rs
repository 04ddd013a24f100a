//! 缓存往返测试

mod common;

use common::{bundler, config, project, run_bundle};
use jsbundle_config::BundleConfig;
use jsbundle_core::{BundleError, ModulePath, CACHE_FILE};
use jsbundle_vfs::VirtualFileSystem;
use std::path::Path;

fn debug_config() -> BundleConfig {
    let mut config = config();
    config.debug = true;
    config
}

fn files() -> [(&'static str, &'static str); 3] {
    [
        ("/p/main.js", "module.exports = require('./a') + require('./b');"),
        ("/p/a.js", "module.exports = 1;"),
        ("/p/b.js", "module.exports = 2;"),
    ]
}

#[tokio::test]
async fn test_debug_build_writes_cache() {
    let host = project(&files());
    bundler(&host, debug_config()).build().await.unwrap();
    assert!(host.is_file(&Path::new("/p").join(CACHE_FILE)));

    let host = project(&files());
    bundler(&host, config()).build().await.unwrap();
    assert!(!host.exists(&Path::new("/p").join(CACHE_FILE)));
}

#[tokio::test]
async fn test_unchanged_restart_requeues_nothing() {
    let host = project(&files());
    let first = bundler(&host, debug_config()).build().await.unwrap();

    let mut warm = bundler(&host, debug_config());
    assert_eq!(warm.session().len(), 3);
    assert_eq!(warm.session().queue_len(), 0);
    let second = warm.build().await.unwrap();
    assert_eq!(second.code, first.code);
    assert_eq!(run_bundle(&second.code, "entry").unwrap(), "3");
}

#[tokio::test]
async fn test_touched_file_is_the_only_requeue() {
    let host = project(&files());
    bundler(&host, debug_config()).build().await.unwrap();

    host.write_file(Path::new("/p/b.js"), b"module.exports = 40;").unwrap();
    let mut warm = bundler(&host, debug_config());
    let queued: Vec<_> = warm.session().queued_paths().cloned().collect();
    assert_eq!(queued, vec![ModulePath::file("/p/b.js")]);

    let output = warm.build().await.unwrap();
    assert_eq!(run_bundle(&output.code, "entry").unwrap(), "41");
}

#[tokio::test]
async fn test_deleted_file_is_restored_as_removed() {
    let host = project(&[
        ("/p/main.js", "module.exports = function () { return require('./a'); };"),
        ("/p/a.js", "module.exports = 1;"),
    ]);
    bundler(&host, debug_config()).build().await.unwrap();
    host.remove_file(Path::new("/p/a.js")).unwrap();

    let mut warm = bundler(&host, debug_config());
    assert!(warm.session().record(1).unwrap().removed);
    let output = warm.build().await.unwrap();
    let message = run_bundle(&output.code, "try { entry(); } catch (e) { e.message; }").unwrap();
    assert!(message.contains("removed"), "{message}");
}

#[tokio::test]
async fn test_malformed_cache_handling() {
    let host = project(&files());
    host.write_file(&Path::new("/p").join(CACHE_FILE), b"{ not json").unwrap();

    let mut lenient = bundler(&host, config());
    assert!(lenient.build().await.is_ok());

    let err = jsbundle_core::Bundler::new(debug_config(), host.clone()).err().unwrap();
    assert!(matches!(err, BundleError::Cache(_)));
}

#[tokio::test]
async fn test_cache_for_other_entry_is_ignored() {
    let host = project(&[
        ("/p/main.js", "module.exports = 1;"),
        ("/p/other.js", "module.exports = 2;"),
    ]);
    bundler(&host, debug_config()).build().await.unwrap();

    let mut other = BundleConfig::with_entry("other.js");
    let output = bundler(&host, other.clone()).build().await.unwrap();
    assert_eq!(run_bundle(&output.code, "entry").unwrap(), "2");

    other.debug = true;
    assert!(jsbundle_core::Bundler::new(other, host.clone()).is_err());
}

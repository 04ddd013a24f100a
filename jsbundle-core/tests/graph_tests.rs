//! 模块表与解析器的性质测试

mod common;

use common::{bundler, config, project};
use jsbundle_core::{ModulePath, Resolver, Session};
use std::path::Path;
use std::sync::Arc;

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let host = project(&[
        ("/p/main.js", ""),
        ("/p/node_modules/dep/package.json", r#"{"main":"./lib"}"#),
        ("/p/node_modules/dep/lib/index.js", ""),
    ]);
    let resolver = Resolver::new(host, Arc::new(config()));
    let from = ModulePath::file("/p/main.js");
    for specifier in ["dep", "fs", "process"] {
        let first = resolver.resolve(&from, specifier).unwrap();
        let second = resolver.resolve(&from, specifier).unwrap();
        assert_eq!(first, second, "{specifier}");
    }
    assert_eq!(
        resolver.resolve(&from, "dep").unwrap(),
        ModulePath::file("/p/node_modules/dep/lib/index.js")
    );
}

#[tokio::test]
async fn test_index_allocation() {
    let mut session = Session::new();
    let a = ModulePath::file("/p/a.js");
    let b = ModulePath::file("/p/b.js");
    assert_eq!(session.index_of(&a), 0);
    assert_eq!(session.index_of(&a), 0);
    assert_eq!(session.index_of(&b), 1);
    assert_eq!(session.index_of(&ModulePath::External("fs".into())), 2);
}

#[tokio::test]
async fn test_enqueue_once() {
    let mut session = Session::new();
    let a = ModulePath::file("/p/a.js");
    assert!(session.enqueue(&a));
    assert!(!session.enqueue(&a));
    assert_eq!(session.queue_len(), 1);
}

#[tokio::test]
async fn test_discovery_order_is_breadth_first() {
    let host = project(&[
        ("/p/main.js", "require('./a'); require('./b');"),
        ("/p/a.js", "require('./c');"),
        ("/p/b.js", "require('./a');"),
        ("/p/c.js", ""),
    ]);
    let mut bundler = bundler(&host, config());
    bundler.build().await.unwrap();
    let order: Vec<String> = bundler
        .session()
        .records()
        .iter()
        .map(|record| record.path.display_relative(Path::new("/p")))
        .collect();
    assert_eq!(order, ["main.js", "a.js", "b.js", "c.js"]);
}

#[tokio::test]
async fn test_rebuild_is_stable() {
    let host = project(&[
        ("/p/main.js", "module.exports = require('./a') + require('./b');"),
        ("/p/a.js", "module.exports = 1;"),
        ("/p/b.js", "module.exports = 2;"),
    ]);
    let mut bundler = bundler(&host, config());
    let first = bundler.build().await.unwrap();
    let second = bundler.build().await.unwrap();
    assert_eq!(first.code, second.code);

    let mut fresh = common::bundler(&host, config());
    assert_eq!(fresh.build().await.unwrap().code, first.code);
}

#[tokio::test]
async fn test_invalidated_module_keeps_index() {
    let host = project(&[
        ("/p/main.js", "module.exports = require('./a');"),
        ("/p/a.js", "module.exports = 1;"),
        ("/p/b.js", "module.exports = 2;"),
    ]);
    let mut bundler = bundler(&host, config());
    bundler.build().await.unwrap();

    let a = ModulePath::file("/p/a.js");
    let mut session = Session::new();
    assert_eq!(session.index_of(&ModulePath::file("/p/main.js")), 0);
    assert_eq!(session.index_of(&a), 1);
    assert!(session.invalidate(&a, false));
    assert_eq!(session.index_of(&ModulePath::file("/p/b.js")), 2);
    assert_eq!(session.lookup(&a), Some(1));
    assert!(!session.invalidate(&ModulePath::file("/p/unknown.js"), true));
    assert_eq!(bundler.session().lookup(&a), Some(1));
}

//! 测试辅助工具
//!
//! 内存文件系统上的项目构建，以及用 boa 执行生成的 bundle

#![allow(dead_code)]

use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, Source};
use jsbundle_config::{BundleConfig, Target};
use jsbundle_core::{BuildOutput, Bundler};
use jsbundle_vfs::MemoryFileSystem;
use std::sync::Arc;

/// 创建工作目录为 `/p` 的内存项目
pub fn project(files: &[(&str, &str)]) -> Arc<MemoryFileSystem> {
    Arc::new(
        MemoryFileSystem::with_files(
            files
                .iter()
                .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec())),
        )
        .with_cwd("/p"),
    )
}

/// 入口为 `main.js` 的默认配置
pub fn config() -> BundleConfig {
    BundleConfig::with_entry("main.js")
}

pub fn bundler(host: &Arc<MemoryFileSystem>, config: BundleConfig) -> Bundler {
    Bundler::new(config, host.clone()).expect("bundler setup failed")
}

/// 构建一次并返回 bundler 与产物
pub async fn build(files: &[(&str, &str)], config: BundleConfig) -> (Bundler, BuildOutput) {
    let host = project(files);
    let mut bundler = bundler(&host, config);
    let output = bundler.build().await.expect("build failed");
    (bundler, output)
}

/// 执行浏览器 bundle，入口导出绑定为全局 `entry`，再对 `expr` 求值
///
/// # Example
/// ```ignore
/// let out = run_bundle(&output.code, "entry.answer");
/// assert_eq!(out.unwrap(), "42");
/// ```
pub fn run_bundle(code: &str, expr: &str) -> Result<String, String> {
    let mut context = Context::default();
    let exports = context
        .eval(Source::from_bytes(code))
        .map_err(|e| format!("bundle threw: {}", e))?;
    context
        .register_global_property(js_string!("entry"), exports, Attribute::all())
        .map_err(|e| e.to_string())?;
    eval_expr(&mut context, expr)
}

/// 执行 node 目标的 bundle，提供最小的 `module` 与 `require`
pub fn run_node_bundle(code: &str, expr: &str) -> Result<String, String> {
    let mut context = Context::default();
    let prelude = "var module = { exports: {} };\nfunction require(name) { return { native: name }; }\n";
    context
        .eval(Source::from_bytes(prelude))
        .map_err(|e| e.to_string())?;
    context
        .eval(Source::from_bytes(code))
        .map_err(|e| format!("bundle threw: {}", e))?;
    let exports = context
        .eval(Source::from_bytes("module.exports"))
        .map_err(|e| e.to_string())?;
    context
        .register_global_property(js_string!("entry"), exports, Attribute::all())
        .map_err(|e| e.to_string())?;
    eval_expr(&mut context, expr)
}

fn eval_expr(context: &mut Context, expr: &str) -> Result<String, String> {
    let value = context
        .eval(Source::from_bytes(expr))
        .map_err(|e| format!("expression threw: {}", e))?;
    let text = value.to_string(context).map_err(|e| e.to_string())?;
    Ok(text.to_std_string_escaped())
}

/// 构建并执行，返回 `expr` 的字符串值
pub async fn eval(files: &[(&str, &str)], expr: &str) -> String {
    let (_, output) = build(files, config()).await;
    run_bundle(&output.code, expr).unwrap_or_else(|e| panic!("{}\n--- bundle ---\n{}", e, output.code))
}

pub fn node_config() -> BundleConfig {
    let mut config = config();
    config.target = Target::Node;
    config
}

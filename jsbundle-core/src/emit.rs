//! 产物输出 - 写入文件或标准输出

use crate::error::BundleError;
use crate::orchestrator::BuildOutput;
use jsbundle_config::{BundleConfig, SourceMapMode};
use jsbundle_vfs::VirtualFileSystem;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 构建产物的输出目标
pub trait Emitter {
    fn name(&self) -> &'static str;

    fn emit(&mut self, output: &BuildOutput) -> Result<(), BundleError>;
}

/// 文件发射器
///
/// 写入 `<folder>/<file>`；开启外部 source map 时另写 `<file>.map`。
pub struct FileEmitter {
    host: Arc<dyn VirtualFileSystem>,
    folder: PathBuf,
    file: String,
    write_map: bool,
}

impl FileEmitter {
    /// 创建新的文件发射器，`folder` 相对于工作目录
    pub fn new(host: Arc<dyn VirtualFileSystem>, folder: impl Into<PathBuf>, file: impl Into<String>) -> Self {
        let folder = host.cwd().join(folder.into());
        Self {
            host,
            folder,
            file: file.into(),
            write_map: false,
        }
    }

    pub fn with_source_map(mut self, write_map: bool) -> Self {
        self.write_map = write_map;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.folder.join(&self.file)
    }
}

impl Emitter for FileEmitter {
    fn name(&self) -> &'static str {
        "file"
    }

    fn emit(&mut self, output: &BuildOutput) -> Result<(), BundleError> {
        self.host.create_dir_all(&self.folder)?;
        let path = self.output_path();
        self.host.write_file(&path, output.code.as_bytes())?;

        if self.write_map {
            let map = output
                .source_map
                .as_deref()
                .ok_or_else(|| BundleError::Emit(String::from("构建结果缺少 source map")))?;
            let map_path = self.folder.join(format!("{}.map", self.file));
            self.host.write_file(&map_path, map.as_bytes())?;
        }
        info!(target: "jsbundle::emit", path = %path.display(), bytes = output.code.len(), "written");
        Ok(())
    }
}

/// 标准输出发射器
pub struct StdoutEmitter<W: Write> {
    out: W,
}

impl StdoutEmitter<std::io::Stdout> {
    /// 创建新的标准输出发射器
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl Default for StdoutEmitter<std::io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdoutEmitter<W> {
    /// 写入任意 writer，便于测试
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Emitter for StdoutEmitter<W> {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn emit(&mut self, output: &BuildOutput) -> Result<(), BundleError> {
        self.out
            .write_all(output.code.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| BundleError::Emit(format!("写入标准输出失败: {}", e)))
    }
}

/// 按配置选择输出目标：配置了 `output.file` 写文件，否则写标准输出
pub fn write_output(
    config: &BundleConfig,
    host: Arc<dyn VirtualFileSystem>,
    output: &BuildOutput,
) -> Result<(), BundleError> {
    match &config.output.file {
        Some(file) => FileEmitter::new(host, &config.output.folder, file)
            .with_source_map(config.source_maps == SourceMapMode::On)
            .emit(output),
        None => StdoutEmitter::new().emit(output),
    }
}

//! 流水线输出
//!
//! CI 通过 `GITHUB_OUTPUT` 指向的文件收集步骤输出，每行一个 `name=value`。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::Result;

/// 输出名
pub const BUILD_VERSION_OUTPUT: &str = "build-version";

/// 追加一条步骤输出到指定文件
pub fn append_output(path: &Path, name: &str, value: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}={}", name, value)?;
    debug!(path = %path.display(), name, "Step output written");
    Ok(())
}

/// 发布新版本号：写入 `GITHUB_OUTPUT`（若已设置）并打印到标准输出
pub fn publish_build_version(version_number: i64) -> Result<()> {
    let value = version_number.to_string();
    if let Some(path) = std::env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
        append_output(Path::new(&path), BUILD_VERSION_OUTPUT, &value)?;
    }
    println!("{}={}", BUILD_VERSION_OUTPUT, value);
    Ok(())
}

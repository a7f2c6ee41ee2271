//! PID 文件管理

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 持有 PID 文件，drop 时删除
#[derive(Debug)]
pub struct PidFileGuard {
    path: Option<PathBuf>,
}

impl PidFileGuard {
    /// 未配置路径时返回空 guard
    pub fn create(pid_path: Option<&str>) -> Result<Self> {
        let Some(path_str) = pid_path else {
            return Ok(Self { path: None });
        };
        let path = Path::new(path_str);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create PID file directory: {parent:?}"))?;
        }

        let pid = std::process::id();
        fs::write(path, format!("{pid}\n"))
            .with_context(|| format!("Failed to write PID file: {path:?}"))?;

        info!("PID file written: {:?} (PID: {})", path, pid);
        Ok(Self {
            path: Some(path.to_path_buf()),
        })
    }

}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => info!("PID file removed: {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove PID file {:?}: {}", path, e),
        }
    }
}

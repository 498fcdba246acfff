use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::EngineError;

/// 外部进程的执行结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// 地图编译器与外部编辑器的调用接口，核心只关心成功与否及输出文本。
pub trait MapToolchain {
    /// 将 `source` 编译为 `target`，等待进程结束。
    fn compile(&self, source: &Path, target: &Path) -> Result<ToolOutput, EngineError>;

    /// 启动外部编辑器（可选地打开指定地图），不等待其退出。
    fn open(&self, map: Option<&Path>) -> Result<ToolOutput, EngineError>;
}

/// 以子进程方式调用已配置的可执行文件。
#[derive(Debug, Clone, Default)]
pub struct ProcessToolchain {
    compiler: Option<PathBuf>,
    viewer: Option<PathBuf>,
}

impl ProcessToolchain {
    pub fn new(compiler: Option<PathBuf>, viewer: Option<PathBuf>) -> Self {
        Self { compiler, viewer }
    }
}

impl MapToolchain for ProcessToolchain {
    fn compile(&self, source: &Path, target: &Path) -> Result<ToolOutput, EngineError> {
        let Some(compiler) = self.compiler.as_deref() else {
            return Err(EngineError::Tool {
                tool: "compiler",
                message: "未配置地图编译器".to_string(),
            });
        };
        debug!(compiler = %compiler.display(), source = %source.display(), target = %target.display(), "调用地图编译器");
        let output = Command::new(compiler)
            .arg(source)
            .arg(target)
            .output()
            .map_err(|err| EngineError::Tool {
                tool: "compiler",
                message: format!("无法启动 {}: {err}", compiler.display()),
            })?;
        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn open(&self, map: Option<&Path>) -> Result<ToolOutput, EngineError> {
        let Some(viewer) = self.viewer.as_deref() else {
            return Err(EngineError::Tool {
                tool: "viewer",
                message: "未配置外部编辑器".to_string(),
            });
        };
        let mut command = Command::new(viewer);
        if let Some(map) = map {
            command.arg(map);
        }
        // 编辑器的输出不能混入本进程的标准输出（例如 `--json` 报告）。
        command.stdout(Stdio::null()).stderr(Stdio::null());
        let child = command.spawn().map_err(|err| EngineError::Tool {
            tool: "viewer",
            message: format!("无法启动 {}: {err}", viewer.display()),
        })?;
        info!(viewer = %viewer.display(), pid = child.id(), "已启动外部编辑器");
        Ok(ToolOutput {
            success: true,
            stdout: format!("pid {}", child.id()),
            stderr: String::new(),
        })
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub tools: ToolConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

/// 指定配置文件的环境变量。
pub const CONFIG_ENV: &str = "QMAP_CONFIG";

/// 在工作目录中依次查找的配置文件，先找到的生效。
pub const CONFIG_CANDIDATES: [&str; 2] = ["qmap.toml", "config/default.toml"];

impl AppConfig {
    /// 从显式路径加载地图工具配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `QMAP_CONFIG` 优先；否则在当前工作目录中按 [`CONFIG_CANDIDATES`] 查找。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }
        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "无法确定地图工程目录（当前工作目录不可用）".to_string(),
            source,
        })?;
        Self::discover_in(&cwd)
    }

    /// 在 `project_dir` 下查找配置文件；都不存在时使用内建默认值。
    pub fn discover_in(project_dir: &Path) -> Result<Self, ConfigError> {
        match Self::locate(project_dir) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// 返回 `project_dir` 下第一个存在的候选配置文件。
    pub fn locate(project_dir: &Path) -> Option<PathBuf> {
        CONFIG_CANDIDATES
            .iter()
            .map(|name| project_dir.join(name))
            .find(|path| path.is_file())
    }
}

/// 日志配置，`level` 使用 `tracing_subscriber::EnvFilter` 的语法。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 地图与编译产物所在目录。相对路径以当前工作目录为基准。
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "ProjectConfig::default_maps_dir")]
    pub maps_dir: PathBuf,
    #[serde(default = "ProjectConfig::default_build_dir")]
    pub build_dir: PathBuf,
}

impl ProjectConfig {
    fn default_maps_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_build_dir() -> PathBuf {
        PathBuf::from("build")
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            maps_dir: Self::default_maps_dir(),
            build_dir: Self::default_build_dir(),
        }
    }
}

/// 外部工具：地图编译器与可视化编辑器，均按可执行文件路径调用。
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub compiler: Option<PathBuf>,
    #[serde(default)]
    pub viewer: Option<PathBuf>,
    #[serde(default = "ToolConfig::default_compiled_extension")]
    pub compiled_extension: String,
}

impl ToolConfig {
    fn default_compiled_extension() -> String {
        "plb".to_string()
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            compiler: None,
            viewer: None,
            compiled_extension: Self::default_compiled_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    /// `near` 查询的默认半径（地图单位）。
    #[serde(default = "EditorConfig::default_search_radius")]
    pub search_radius: f64,
}

impl EditorConfig {
    fn default_search_radius() -> f64 {
        32.0
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            search_radius: Self::default_search_radius(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

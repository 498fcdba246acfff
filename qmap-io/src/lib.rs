//! `.map` 文本格式的读写：递归下降解析器、规范化写出器以及文件级便捷接口。

use std::fs;
use std::path::{Path, PathBuf};

use qmap_core::map::MapDocument;
use thiserror::Error;
use tracing::debug;

mod parser;
mod writer;

pub use parser::{ParseError, parse};
pub use writer::{format_float, write};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read map file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write map file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse map file {path:?}: {source}")]
    InvalidMap {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<MapDocument, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &MapDocument, path: &Path) -> Result<(), IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MapFacade;

impl MapFacade {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for MapFacade {
    fn load(&self, path: &Path) -> Result<MapDocument, IoError> {
        parse_file(path)
    }
}

impl DocumentSaver for MapFacade {
    fn save(&self, document: &MapDocument, path: &Path) -> Result<(), IoError> {
        write_file(document, path)
    }
}

/// 整体读入文件后交给 [`parse`]。
pub fn parse_file(path: impl AsRef<Path>) -> Result<MapDocument, IoError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let document = parse(&data).map_err(|source| IoError::InvalidMap {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        entity_count = document.entity_count(),
        brush_count = document.brush_count(),
        "已解析地图文件"
    );
    Ok(document)
}

/// 写出 [`write`] 的结果；文本本身已以换行结尾。
pub fn write_file(document: &MapDocument, path: impl AsRef<Path>) -> Result<(), IoError> {
    let path = path.as_ref();
    fs::write(path, write(document)).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        entity_count = document.entity_count(),
        "已写出地图文件"
    );
    Ok(())
}

pub mod command;
pub mod toolchain;

pub mod errors {
    use std::path::PathBuf;

    use qmap_io::IoError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("no map loaded")]
        NoMapLoaded,
        #[error("no map file specified")]
        NoMapFile,
        #[error("map file not found: {0:?}")]
        MapNotFound(PathBuf),
        #[error("entity {0} not found")]
        EntityNotFound(usize),
        #[error("brush {brush} not found in entity {entity}")]
        BrushNotFound { entity: usize, brush: usize },
        #[error(transparent)]
        Io(#[from] IoError),
        #[error("{tool} failed: {message}")]
        Tool { tool: &'static str, message: String },
    }
}

pub mod session {
    use std::fs;
    use std::path::{Path, PathBuf};

    use qmap_core::geometry::{Bounds3D, Vector3};
    use qmap_core::map::{CLASSNAME_KEY, Entity, MapDocument, NearbyGeometry};
    use serde::Serialize;
    use tracing::{debug, info};

    use crate::errors::EngineError;
    use crate::toolchain::{MapToolchain, ToolOutput};

    /// 地图概览，供 CLI 打印或序列化为 JSON。
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct MapReport {
        pub map_file: Option<String>,
        pub entity_count: usize,
        pub brush_count: usize,
        pub face_count: usize,
        pub bounds: Option<Bounds3D>,
        pub entities: Vec<EntitySummary>,
        pub textures: Vec<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct EntitySummary {
        pub index: usize,
        pub classname: String,
        pub origin: Option<Vector3>,
        pub brush_count: usize,
        /// 除 `classname` 以外的属性，保持文件中的顺序。
        pub properties: Vec<(String, String)>,
        pub brushes: Vec<BrushSummary>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct BrushSummary {
        pub index: usize,
        pub face_count: usize,
        pub center: Option<Vector3>,
        pub bounds: Option<Bounds3D>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct EntityMove {
        pub index: usize,
        pub classname: String,
        pub old_origin: Option<Vector3>,
        pub new_origin: Option<Vector3>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct BrushMove {
        pub entity_index: usize,
        pub brush_index: usize,
        pub old_center: Option<Vector3>,
        pub new_center: Option<Vector3>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct SaveReport {
        pub path: PathBuf,
        pub entity_count: usize,
        pub brush_count: usize,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct CompileReport {
        pub source: PathBuf,
        pub target: PathBuf,
        pub output: ToolOutput,
    }

    /// 编辑会话：持有当前地图文档及其文件名，所有读写都相对于 `maps_dir`。
    ///
    /// 会话本身按 `&mut` 独占使用；需要在多个请求之间共享时，由调用方加锁，
    /// 保证修改期间没有其他读者。
    #[derive(Debug)]
    pub struct EditorSession {
        maps_dir: PathBuf,
        document: Option<MapDocument>,
        current_file: Option<String>,
    }

    impl EditorSession {
        pub fn new(maps_dir: impl Into<PathBuf>) -> Self {
            Self {
                maps_dir: maps_dir.into(),
                document: None,
                current_file: None,
            }
        }

        /// 使用内存中的文档初始化会话，`file` 为保存时使用的默认文件名。
        pub fn with_document(
            maps_dir: impl Into<PathBuf>,
            document: MapDocument,
            file: Option<String>,
        ) -> Self {
            Self {
                maps_dir: maps_dir.into(),
                document: Some(document),
                current_file: file,
            }
        }

        #[inline]
        pub fn maps_dir(&self) -> &Path {
            &self.maps_dir
        }

        #[inline]
        pub fn document(&self) -> Option<&MapDocument> {
            self.document.as_ref()
        }

        #[inline]
        pub fn current_file(&self) -> Option<&str> {
            self.current_file.as_deref()
        }

        #[inline]
        pub fn map_path(&self, name: &str) -> PathBuf {
            self.maps_dir.join(name)
        }

        /// 加载地图并替换当前文档。解析失败时保留原有文档不变。
        pub fn load(&mut self, name: &str) -> Result<MapReport, EngineError> {
            let path = self.map_path(name);
            if !path.exists() {
                return Err(EngineError::MapNotFound(path));
            }
            let document = qmap_io::parse_file(&path)?;
            info!(
                path = %path.display(),
                entity_count = document.entity_count(),
                brush_count = document.brush_count(),
                "已加载地图"
            );
            self.document = Some(document);
            self.current_file = Some(name.to_string());
            self.info()
        }

        pub fn info(&self) -> Result<MapReport, EngineError> {
            let document = self.require_document()?;
            let entities = document
                .entities()
                .iter()
                .enumerate()
                .map(|(index, entity)| summarize_entity(index, entity))
                .collect();
            Ok(MapReport {
                map_file: self.current_file.clone(),
                entity_count: document.entity_count(),
                brush_count: document.brush_count(),
                face_count: document.face_count(),
                bounds: document.bounds(),
                entities,
                textures: document.textures(),
            })
        }

        /// 新增点实体，返回其索引。`properties` 中的 `classname` 会被忽略。
        pub fn add_entity(
            &mut self,
            classname: &str,
            origin: Option<Vector3>,
            properties: &[(String, String)],
        ) -> Result<usize, EngineError> {
            let document = self.require_document_mut()?;
            let mut entity = Entity::new(classname);
            if let Some(origin) = origin {
                entity.set_origin(origin);
            }
            for (key, value) in properties {
                if key != CLASSNAME_KEY {
                    entity.set_property(key.as_str(), value.as_str());
                }
            }
            let index = document.add_entity(entity);
            debug!(index, classname, "已新增实体");
            Ok(index)
        }

        /// 将实体移动到新位置，带笔刷的实体整体平移。
        pub fn move_entity(&mut self, index: usize, origin: Vector3) -> Result<EntityMove, EngineError> {
            let entity = self
                .require_document_mut()?
                .entity_mut(index)
                .ok_or(EngineError::EntityNotFound(index))?;
            let old_origin = entity.origin();
            entity.set_origin(origin);
            debug!(index, x = origin.x(), y = origin.y(), z = origin.z(), "已移动实体");
            Ok(EntityMove {
                index,
                classname: entity.classname().to_string(),
                old_origin,
                new_origin: entity.origin(),
            })
        }

        pub fn move_brush(
            &mut self,
            entity_index: usize,
            brush_index: usize,
            offset: Vector3,
        ) -> Result<BrushMove, EngineError> {
            let entity = self
                .require_document_mut()?
                .entity_mut(entity_index)
                .ok_or(EngineError::EntityNotFound(entity_index))?;
            let brush = entity
                .brushes
                .get_mut(brush_index)
                .ok_or(EngineError::BrushNotFound {
                    entity: entity_index,
                    brush: brush_index,
                })?;
            let old_center = brush.center();
            brush.translate(offset);
            debug!(entity_index, brush_index, "已平移笔刷");
            Ok(BrushMove {
                entity_index,
                brush_index,
                old_center,
                new_center: brush.center(),
            })
        }

        /// 保存到 `name`，缺省时写回当前文件。
        pub fn save(&self, name: Option<&str>) -> Result<SaveReport, EngineError> {
            let document = self.require_document()?;
            let target = name
                .or(self.current_file.as_deref())
                .ok_or(EngineError::NoMapFile)?;
            let path = self.map_path(target);
            qmap_io::write_file(document, &path)?;
            info!(path = %path.display(), "已保存地图");
            Ok(SaveReport {
                path,
                entity_count: document.entity_count(),
                brush_count: document.brush_count(),
            })
        }

        pub fn geometry_near(&self, point: Vector3, radius: f64) -> Result<NearbyGeometry, EngineError> {
            Ok(self.require_document()?.geometry_near(point, radius))
        }

        /// 先保存当前地图，再调用编译器生成 `build_dir/<name>.<extension>`。
        pub fn compile(
            &self,
            toolchain: &dyn MapToolchain,
            build_dir: &Path,
            extension: &str,
        ) -> Result<CompileReport, EngineError> {
            let saved = self.save(None)?;
            fs::create_dir_all(build_dir).map_err(|err| EngineError::Tool {
                tool: "compiler",
                message: format!("无法创建输出目录 {}: {err}", build_dir.display()),
            })?;
            let file_name = saved
                .path
                .file_name()
                .map(PathBuf::from)
                .ok_or(EngineError::NoMapFile)?;
            let target = build_dir.join(file_name.with_extension(extension));
            let output = toolchain.compile(&saved.path, &target)?;
            info!(
                source = %saved.path.display(),
                target = %target.display(),
                success = output.success,
                "编译器已结束"
            );
            Ok(CompileReport {
                source: saved.path,
                target,
                output,
            })
        }

        /// 在外部编辑器中打开 `name`（相对于 `maps_dir`），缺省时打开当前地图；
        /// 两者都没有时只启动编辑器。
        pub fn open_in_viewer(
            &self,
            toolchain: &dyn MapToolchain,
            name: Option<&str>,
        ) -> Result<ToolOutput, EngineError> {
            let path = match name.or(self.current_file.as_deref()) {
                Some(name) => {
                    let path = self.map_path(name);
                    if !path.exists() {
                        return Err(EngineError::MapNotFound(path));
                    }
                    Some(path)
                }
                None => None,
            };
            toolchain.open(path.as_deref())
        }

        fn require_document(&self) -> Result<&MapDocument, EngineError> {
            self.document.as_ref().ok_or(EngineError::NoMapLoaded)
        }

        fn require_document_mut(&mut self) -> Result<&mut MapDocument, EngineError> {
            self.document.as_mut().ok_or(EngineError::NoMapLoaded)
        }
    }

    fn summarize_entity(index: usize, entity: &Entity) -> EntitySummary {
        EntitySummary {
            index,
            classname: entity.classname().to_string(),
            origin: entity.origin(),
            brush_count: entity.brush_count(),
            properties: entity
                .properties()
                .iter()
                .filter(|(key, _)| *key != CLASSNAME_KEY)
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            brushes: entity
                .brushes
                .iter()
                .enumerate()
                .map(|(index, brush)| BrushSummary {
                    index,
                    face_count: brush.face_count(),
                    center: brush.center(),
                    bounds: brush.bounds(),
                })
                .collect(),
        }
    }

}

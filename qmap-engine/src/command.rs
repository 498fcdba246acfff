use std::collections::HashMap;
use std::path::PathBuf;

use qmap_core::geometry::Vector3;
use qmap_io::format_float;

use crate::session::EditorSession;
use crate::toolchain::MapToolchain;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    /// 以空白切分一行命令文本，首个单词为命令名。空行返回 None。
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let name = words.next()?;
        Some(Self {
            name,
            args: words.collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// 命令执行时需要的非会话参数，通常来自应用配置。
#[derive(Debug, Clone)]
pub struct CommandSettings {
    pub build_dir: PathBuf,
    pub compiled_extension: String,
    pub search_radius: f64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            compiled_extension: "plb".to_string(),
            search_radius: 32.0,
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn usage(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut EditorSession,
    pub toolchain: &'a dyn MapToolchain,
    pub settings: &'a CommandSettings,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(InfoCommand);
        bus.register(AddEntityCommand);
        bus.register(MoveEntityCommand);
        bus.register(MoveBrushCommand);
        bus.register(NearCommand);
        bus.register(SaveCommand);
        bus.register(CompileCommand);
        bus.register(LaunchCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    /// 已注册命令名，按字母序排列。
    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn usage(&self, name: &str) -> Option<&'static str> {
        self.handlers.get(name).map(|handler| handler.usage())
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn arg_index(args: &[String], position: usize, what: &str) -> Result<usize, String> {
    let raw = args
        .get(position)
        .ok_or_else(|| format!("缺少参数: {what}"))?;
    raw.parse::<usize>()
        .map_err(|_| format!("{what} 不是有效索引（值：\"{raw}\"）"))
}

fn arg_f64(args: &[String], position: usize, what: &str) -> Result<f64, String> {
    let raw = args
        .get(position)
        .ok_or_else(|| format!("缺少参数: {what}"))?;
    raw.parse::<f64>()
        .map_err(|_| format!("{what} 不是有效数值（值：\"{raw}\"）"))
}

fn arg_vector(args: &[String], start: usize, what: &str) -> Result<Vector3, String> {
    Ok(Vector3::new(
        arg_f64(args, start, &format!("{what}.x"))?,
        arg_f64(args, start + 1, &format!("{what}.y"))?,
        arg_f64(args, start + 2, &format!("{what}.z"))?,
    ))
}

fn describe(point: Option<Vector3>) -> String {
    match point {
        Some(p) => format!(
            "({}, {}, {})",
            format_float(p.x()),
            format_float(p.y()),
            format_float(p.z())
        ),
        None => "<无>".to_string(),
    }
}

struct InfoCommand;

impl CommandHandler for InfoCommand {
    fn name(&self) -> &'static str {
        "info"
    }

    fn usage(&self) -> &'static str {
        "info"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.info() {
            Ok(report) => CommandResponse::ok(format!(
                "{} 个实体，{} 个笔刷，{} 种贴图",
                report.entity_count,
                report.brush_count,
                report.textures.len()
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct AddEntityCommand;

impl AddEntityCommand {
    /// `<classname> [x y z] [key=value ...]`
    fn parse_args(args: &[String]) -> Result<(String, Option<Vector3>, Vec<(String, String)>), String> {
        let classname = args.first().ok_or("缺少参数: classname")?.clone();
        let mut rest = &args[1..];
        let origin = match rest {
            [x, y, z, ..] if [x, y, z].iter().all(|v| v.parse::<f64>().is_ok()) => {
                let origin = arg_vector(rest, 0, "origin")?;
                rest = &rest[3..];
                Some(origin)
            }
            _ => None,
        };
        let properties = rest
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| format!("属性应为 key=value 形式（值：\"{pair}\"）"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((classname, origin, properties))
    }
}

impl CommandHandler for AddEntityCommand {
    fn name(&self) -> &'static str {
        "add_entity"
    }

    fn usage(&self) -> &'static str {
        "add_entity <classname> [x y z] [key=value ...]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let (classname, origin, properties) = match Self::parse_args(&request.args) {
            Ok(parsed) => parsed,
            Err(message) => return CommandResponse::err(message),
        };
        match context.session.add_entity(&classname, origin, &properties) {
            Ok(index) => CommandResponse::ok(format!("已新增实体 #{index} ({classname})")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct MoveEntityCommand;

impl CommandHandler for MoveEntityCommand {
    fn name(&self) -> &'static str {
        "move_entity"
    }

    fn usage(&self) -> &'static str {
        "move_entity <index> <x> <y> <z>"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = arg_index(&request.args, 0, "index")
            .and_then(|index| Ok((index, arg_vector(&request.args, 1, "origin")?)));
        let (index, origin) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return CommandResponse::err(message),
        };
        match context.session.move_entity(index, origin) {
            Ok(moved) => CommandResponse::ok(format!(
                "实体 #{} ({}) 已从 {} 移动到 {}",
                moved.index,
                moved.classname,
                describe(moved.old_origin),
                describe(moved.new_origin)
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct MoveBrushCommand;

impl CommandHandler for MoveBrushCommand {
    fn name(&self) -> &'static str {
        "move_brush"
    }

    fn usage(&self) -> &'static str {
        "move_brush <entity> <brush> <dx> <dy> <dz>"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let args = &request.args;
        let parsed = (|| {
            Ok::<_, String>((
                arg_index(args, 0, "entity")?,
                arg_index(args, 1, "brush")?,
                arg_vector(args, 2, "offset")?,
            ))
        })();
        let (entity, brush, offset) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return CommandResponse::err(message),
        };
        match context.session.move_brush(entity, brush, offset) {
            Ok(moved) => CommandResponse::ok(format!(
                "笔刷 {}/{} 中心从 {} 移动到 {}",
                moved.entity_index,
                moved.brush_index,
                describe(moved.old_center),
                describe(moved.new_center)
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct NearCommand;

impl CommandHandler for NearCommand {
    fn name(&self) -> &'static str {
        "near"
    }

    fn usage(&self) -> &'static str {
        "near <x> <y> <z> [radius]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let args = &request.args;
        let point = match arg_vector(args, 0, "point") {
            Ok(point) => point,
            Err(message) => return CommandResponse::err(message),
        };
        let radius = if args.len() > 3 {
            match arg_f64(args, 3, "radius") {
                Ok(radius) => radius,
                Err(message) => return CommandResponse::err(message),
            }
        } else {
            context.settings.search_radius
        };
        match context.session.geometry_near(point, radius) {
            Ok(nearby) => {
                let mut lines = vec![format!(
                    "半径 {} 内有 {} 个实体、{} 个笔刷",
                    format_float(radius),
                    nearby.entities.len(),
                    nearby.brushes.len()
                )];
                for hit in &nearby.entities {
                    lines.push(format!(
                        "  实体 #{} {} 距离 {}",
                        hit.index,
                        hit.classname,
                        format_float(hit.distance)
                    ));
                }
                for hit in &nearby.brushes {
                    lines.push(format!(
                        "  笔刷 {}/{} ({}) 距离 {}",
                        hit.entity_index,
                        hit.brush_index,
                        hit.classname,
                        format_float(hit.distance)
                    ));
                }
                CommandResponse::ok(lines.join("\n"))
            }
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct SaveCommand;

impl CommandHandler for SaveCommand {
    fn name(&self) -> &'static str {
        "save"
    }

    fn usage(&self) -> &'static str {
        "save [file]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.save(request.args.first().map(String::as_str)) {
            Ok(report) => CommandResponse::ok(format!(
                "已保存 {}（{} 个实体，{} 个笔刷）",
                report.path.display(),
                report.entity_count,
                report.brush_count
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct CompileCommand;

impl CommandHandler for CompileCommand {
    fn name(&self) -> &'static str {
        "compile"
    }

    fn usage(&self) -> &'static str {
        "compile"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let settings = context.settings;
        match context.session.compile(
            context.toolchain,
            &settings.build_dir,
            &settings.compiled_extension,
        ) {
            Ok(report) if report.output.success => {
                CommandResponse::ok(format!("编译完成: {}", report.target.display()))
            }
            Ok(report) => CommandResponse::err(format!(
                "编译失败: {}",
                report.output.stderr.trim_end()
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct LaunchCommand;

impl CommandHandler for LaunchCommand {
    fn name(&self) -> &'static str {
        "launch"
    }

    fn usage(&self) -> &'static str {
        "launch [file]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let file = request.args.first().map(String::as_str);
        match context.session.open_in_viewer(context.toolchain, file) {
            Ok(output) if output.success => match file {
                Some(file) => CommandResponse::ok(format!("外部编辑器已启动并打开 {file}")),
                None => CommandResponse::ok("外部编辑器已启动"),
            },
            Ok(output) => CommandResponse::err(output.stderr),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

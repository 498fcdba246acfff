use std::path::PathBuf;

use qmap_config::{AppConfig, ConfigError};
use qmap_engine::command::{CommandBus, CommandContext, CommandRequest, CommandSettings};
use qmap_engine::session::EditorSession;
use qmap_engine::toolchain::ProcessToolchain;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;

const USAGE: &str = "用法：qmap [--config PATH] [--json] [--exec \"命令 参数...\"]... [--output FILE] MAP";

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    json: bool,
    commands: Vec<String>,
    output: Option<String>,
    map: Option<String>,
}

fn parse_args() -> Options {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--config" | "--exec" | "--output" => {
                let Some(value) = args.next() else {
                    eprintln!("`{arg}` 需要提供参数");
                    std::process::exit(1);
                };
                match arg.as_str() {
                    "--config" => options.config = Some(PathBuf::from(value)),
                    "--exec" => options.commands.push(value),
                    _ => options.output = Some(value),
                }
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            _ if options.map.is_none() => options.map = Some(arg),
            other => {
                eprintln!("多余的参数：{other}");
                std::process::exit(1);
            }
        }
    }
    options
}

fn main() {
    let options = parse_args();
    let config = load_configuration(options.config.clone());
    init_logging(&config);

    let Some(map) = options.map.as_deref() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    let mut session = EditorSession::new(&config.project.maps_dir);
    if let Err(err) = session.load(map) {
        error!(error = %err, map, "无法加载地图");
        std::process::exit(1);
    }

    let toolchain =
        ProcessToolchain::new(config.tools.compiler.clone(), config.tools.viewer.clone());
    let settings = CommandSettings {
        build_dir: config.project.build_dir.clone(),
        compiled_extension: config.tools.compiled_extension.clone(),
        search_radius: config.editor.search_radius,
    };
    let bus = CommandBus::new();
    let mut failed = false;
    {
        let mut context = CommandContext {
            session: &mut session,
            toolchain: &toolchain,
            settings: &settings,
        };
        for line in &options.commands {
            let Some(request) = CommandRequest::parse(line) else {
                continue;
            };
            let response = bus.dispatch(&request, &mut context);
            let message = response.message.unwrap_or_default();
            if response.success {
                info!(command = %request.name, "命令执行成功");
                if !options.json {
                    println!("{message}");
                }
            } else {
                failed = true;
                error!(command = %request.name, "{message}");
                if let Some(usage) = bus.usage(&request.name) {
                    eprintln!("用法：{usage}");
                } else {
                    eprintln!("支持的命令: {}", bus.available_commands().join(", "));
                }
                break;
            }
        }
    }

    if !failed {
        if let Some(output) = options.output.as_deref() {
            match session.save(Some(output)) {
                Ok(report) => info!(path = %report.path.display(), "已写出地图"),
                Err(err) => {
                    error!(error = %err, "保存地图失败");
                    failed = true;
                }
            }
        }
    }

    match session.info() {
        Ok(report) if options.json => match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                error!(error = %err, "无法序列化地图概览");
                failed = true;
            }
        },
        Ok(report) => cli::print_report(&report),
        Err(err) => {
            error!(error = %err, "无法生成地图概览");
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    let result = match &override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    };
    result.unwrap_or_else(|err| {
        // 日志尚未初始化，配置问题直接写到标准错误。
        match &err {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => eprintln!(
                "qmap: 地图工具配置 {} 无效，改用内建默认值（地图目录 \".\"，未配置编译器与编辑器）：{err}",
                path.display()
            ),
            ConfigError::Context { .. } => {
                eprintln!("qmap: 无法查找地图工具配置，改用内建默认值：{err}");
            }
        }
        AppConfig::default()
    })
}

/// `RUST_LOG` 优先于配置中的 `logging.level`；日志写到标准错误，不干扰 `--json` 输出。
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        warn!("日志订阅器已存在，沿用现有设置");
    }
}

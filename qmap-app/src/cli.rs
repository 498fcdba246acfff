use qmap_core::geometry::{Bounds3D, Vector3};
use qmap_engine::session::MapReport;
use qmap_io::format_float;

fn point(p: Vector3) -> String {
    format!(
        "({}, {}, {})",
        format_float(p.x()),
        format_float(p.y()),
        format_float(p.z())
    )
}

fn bounds(b: Bounds3D) -> String {
    format!("{} - {}", point(b.min()), point(b.max()))
}

/// 打印地图概览：实体、属性、笔刷与贴图。
pub fn print_report(report: &MapReport) {
    println!(
        "地图：{}",
        report.map_file.as_deref().unwrap_or("<未命名>")
    );
    println!(
        "实体 {} 个，笔刷 {} 个，面 {} 个",
        report.entity_count, report.brush_count, report.face_count
    );
    if let Some(b) = report.bounds {
        println!("包围盒：{}", bounds(b));
    }

    for entity in &report.entities {
        match entity.origin {
            Some(origin) => println!(
                "  #{} {} @ {}",
                entity.index,
                entity.classname,
                point(origin)
            ),
            None => println!("  #{} {}", entity.index, entity.classname),
        }
        for (key, value) in &entity.properties {
            println!("      {key} = {value}");
        }
        for brush in &entity.brushes {
            let extent = brush.bounds.map(bounds).unwrap_or_else(|| "<空>".to_string());
            println!(
                "      笔刷 {}：{} 个面，{}",
                brush.index, brush.face_count, extent
            );
        }
    }

    if !report.textures.is_empty() {
        println!("贴图：{}", report.textures.join(", "));
    }
}

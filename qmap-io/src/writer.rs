use qmap_core::geometry::Vector3;
use qmap_core::map::{Brush, Entity, Face, MapDocument};

const INDENT: &str = "    ";

/// 将文档序列化为标准 `.map` 文本。实体之间空一行，末尾保留一个换行；
/// 空文档输出单个换行。
pub fn write(document: &MapDocument) -> String {
    if document.entities().is_empty() {
        return "\n".to_string();
    }
    let mut out = String::new();
    for (index, entity) in document.entities().iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        write_entity(&mut out, entity);
    }
    out
}

/// 保留 6 位小数，再去掉末尾的 0 和孤立的小数点：`1.500000` → `1.5`，`2.000000` → `2`。
pub fn format_float(value: f64) -> String {
    let text = format!("{value:.6}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn write_entity(out: &mut String, entity: &Entity) {
    out.push_str("{\n");
    for (key, value) in entity.properties().iter() {
        out.push_str(&format!("{INDENT}\"{key}\" \"{}\"\n", escape_value(value)));
    }
    for brush in &entity.brushes {
        write_brush(out, brush);
    }
    out.push_str("}\n");
}

fn write_brush(out: &mut String, brush: &Brush) {
    out.push_str(INDENT);
    out.push_str("{\n");
    for face in &brush.faces {
        out.push_str(INDENT);
        out.push_str(INDENT);
        out.push_str(&format_face(face));
        out.push('\n');
    }
    out.push_str(INDENT);
    out.push_str("}\n");
}

fn format_face(face: &Face) -> String {
    format!(
        "{} {} {} {} {} {} {} {} {}",
        format_point(face.point1),
        format_point(face.point2),
        format_point(face.point3),
        format_texture(&face.texture),
        format_float(face.offset_u),
        format_float(face.offset_v),
        format_float(face.rotation),
        format_float(face.scale_u),
        format_float(face.scale_v),
    )
}

fn format_point(point: Vector3) -> String {
    format!(
        "( {} {} {} )",
        format_float(point.x()),
        format_float(point.y()),
        format_float(point.z())
    )
}

/// 普通贴图名原样输出；空名或含有分隔字符的名字加引号，保证可以重新解析。
fn format_texture(texture: &str) -> String {
    let needs_quotes = texture.is_empty()
        || texture.starts_with("//")
        || texture.starts_with('"')
        || texture
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, '{' | '}' | '(' | ')'));
    if needs_quotes {
        format!("\"{texture}\"")
    } else {
        texture.to_string()
    }
}

/// 属性值中的 `"` 写作 `\"`，键原样输出。
#[inline]
fn escape_value(raw: &str) -> String {
    raw.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_float_strips_trailing_zeros() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(-64.0), "-64");
        assert_eq!(format_float(0.125), "0.125");
        assert_eq!(format_float(1.0 / 3.0), "0.333333");
        assert_eq!(format_float(0.0000004), "0");
        assert_eq!(format_float(1e21), "1000000000000000000000");
    }

    #[test]
    fn face_line_layout() {
        let mut face = Face::new(
            [
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            "base/floor",
        );
        face.offset_u = 16.0;
        face.rotation = 90.0;
        face.scale_v = 0.5;
        assert_eq!(
            format_face(&face),
            "( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) base/floor 16 0 90 1 0.5"
        );
    }

    #[test]
    fn texture_quoting_only_when_needed() {
        assert_eq!(format_texture("*water1"), "*water1");
        assert_eq!(format_texture(""), "\"\"");
        assert_eq!(format_texture("my tex"), "\"my tex\"");
        assert_eq!(format_texture("//odd"), "\"//odd\"");
    }

    #[test]
    fn entity_block_layout() {
        let mut doc = MapDocument::new();
        let mut world = Entity::new("worldspawn");
        world.set_property("message", "the \"big\" one");
        world.brushes.push(Brush::new(vec![Face::new(
            [
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            "tex",
        )]));
        doc.add_entity(world);
        doc.add_entity(Entity::new("info_player_start"));

        let expected = concat!(
            "{\n",
            "    \"classname\" \"worldspawn\"\n",
            "    \"message\" \"the \\\"big\\\" one\"\n",
            "    {\n",
            "        ( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) tex 0 0 0 1 1\n",
            "    }\n",
            "}\n",
            "\n",
            "{\n",
            "    \"classname\" \"info_player_start\"\n",
            "}\n",
        );
        assert_eq!(write(&doc), expected);
    }

    #[test]
    fn empty_document_writes_single_newline() {
        assert_eq!(write(&MapDocument::new()), "\n");
        assert_eq!(crate::parse(&write(&MapDocument::new())).unwrap().entity_count(), 0);
    }

    #[test]
    fn only_values_are_escaped() {
        let mut entity = Entity::new("info_notnull");
        entity.set_property("say\"it", "a \"b\"");
        let mut doc = MapDocument::new();
        doc.add_entity(entity);
        assert!(write(&doc).contains("    \"say\"it\" \"a \\\"b\\\"\"\n"));
    }
}

pub mod geometry {
    use std::ops::{Add, Div, Mul, Neg, Sub};

    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 长度低于该阈值的向量在归一化时视为零向量。
    pub const NORMALIZE_EPSILON: f64 = 1e-10;

    /// 三维向量（右手系，Z 轴向上），内部以 `glam::DVec3` 表示。
    /// 同时用作地图中的点坐标与位移量。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const ZERO: Self = Self(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        /// 由坐标切片构造，缺失分量补零，多余分量忽略。
        pub fn from_slice(coords: &[f64]) -> Self {
            match coords {
                [x, y, z, ..] => Self::new(*x, *y, *z),
                [x, y] => Self::new(*x, *y, 0.0),
                [x] => Self::new(*x, 0.0, 0.0),
                [] => Self::ZERO,
            }
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn to_array(self) -> [f64; 3] {
            self.0.to_array()
        }

        #[inline]
        pub fn dot(self, other: Vector3) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn cross(self, other: Vector3) -> Vector3 {
            Self(self.0.cross(other.0))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        /// 归一化。长度不足 [`NORMALIZE_EPSILON`] 时返回零向量而不是 NaN。
        #[inline]
        pub fn normalize(self) -> Vector3 {
            let len = self.length();
            if len < NORMALIZE_EPSILON {
                Self::ZERO
            } else {
                Self(self.0 / len)
            }
        }

        #[inline]
        pub fn distance(self, other: Vector3) -> f64 {
            (self - other).length()
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    impl From<[f64; 3]> for Vector3 {
        fn from(value: [f64; 3]) -> Self {
            Self(DVec3::from_array(value))
        }
    }

    impl Add for Vector3 {
        type Output = Vector3;

        #[inline]
        fn add(self, rhs: Vector3) -> Vector3 {
            Self(self.0 + rhs.0)
        }
    }

    impl Sub for Vector3 {
        type Output = Vector3;

        #[inline]
        fn sub(self, rhs: Vector3) -> Vector3 {
            Self(self.0 - rhs.0)
        }
    }

    impl Mul<f64> for Vector3 {
        type Output = Vector3;

        #[inline]
        fn mul(self, rhs: f64) -> Vector3 {
            Self(self.0 * rhs)
        }
    }

    impl Div<f64> for Vector3 {
        type Output = Vector3;

        #[inline]
        fn div(self, rhs: f64) -> Vector3 {
            Self(self.0 / rhs)
        }
    }

    impl Neg for Vector3 {
        type Output = Vector3;

        #[inline]
        fn neg(self) -> Vector3 {
            Self(-self.0)
        }
    }

    /// 轴对齐包围盒，用于笔刷、实体以及整张地图的范围估算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds3D {
        min: Vector3,
        max: Vector3,
    }

    impl Bounds3D {
        #[inline]
        pub fn new(min: Vector3, max: Vector3) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                max: Vector3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y() || self.min.z() > self.max.z()
        }

        #[inline]
        pub fn min(&self) -> Vector3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Vector3 {
            self.max
        }

        pub fn include_point(&mut self, point: Vector3) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Vector3(self.min.as_vec3().min(point.as_vec3()));
            self.max = Vector3(self.max.as_vec3().max(point.as_vec3()));
        }

        pub fn include_bounds(&mut self, other: &Bounds3D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Vector3 {
            debug_assert!(!self.is_empty());
            (self.min + self.max) / 2.0
        }

        #[inline]
        pub fn size(&self) -> Vector3 {
            self.max - self.min
        }

        pub fn contains(&self, point: Vector3) -> bool {
            let p = point.as_vec3();
            let min = self.min.as_vec3();
            let max = self.max.as_vec3();
            p.cmpge(min).all() && p.cmple(max).all()
        }
    }
}

pub mod map {
    use std::collections::BTreeSet;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds3D, NORMALIZE_EPSILON, Vector3};

    pub const CLASSNAME_KEY: &str = "classname";
    pub const ORIGIN_KEY: &str = "origin";
    pub const WORLDSPAWN: &str = "worldspawn";

    /// 笔刷的一个半空间：三点确定平面，附带贴图投影参数。
    /// 三点应当不共线，否则 [`Face::normal`] 返回零向量。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Face {
        pub point1: Vector3,
        pub point2: Vector3,
        pub point3: Vector3,
        pub texture: String,
        #[serde(default)]
        pub offset_u: f64,
        #[serde(default)]
        pub offset_v: f64,
        /// 贴图旋转角，单位为度。
        #[serde(default)]
        pub rotation: f64,
        #[serde(default = "Face::default_scale")]
        pub scale_u: f64,
        #[serde(default = "Face::default_scale")]
        pub scale_v: f64,
    }

    impl Face {
        pub fn new(points: [Vector3; 3], texture: impl Into<String>) -> Self {
            let [point1, point2, point3] = points;
            Self {
                point1,
                point2,
                point3,
                texture: texture.into(),
                offset_u: 0.0,
                offset_v: 0.0,
                rotation: 0.0,
                scale_u: Self::default_scale(),
                scale_v: Self::default_scale(),
            }
        }

        fn default_scale() -> f64 {
            1.0
        }

        #[inline]
        pub fn points(&self) -> [Vector3; 3] {
            [self.point1, self.point2, self.point3]
        }

        /// 单位法向量，方向由三点的绕序按右手定则决定。
        pub fn normal(&self) -> Vector3 {
            self.plane_cross().normalize()
        }

        /// 三点共线（或重合）时平面无定义。
        pub fn is_degenerate(&self) -> bool {
            self.plane_cross().length() < NORMALIZE_EPSILON
        }

        /// 三个定义点的平均值。
        pub fn center(&self) -> Vector3 {
            (self.point1 + self.point2 + self.point3) / 3.0
        }

        pub fn translate(&mut self, offset: Vector3) {
            self.point1 = self.point1 + offset;
            self.point2 = self.point2 + offset;
            self.point3 = self.point3 + offset;
        }

        #[inline]
        fn plane_cross(&self) -> Vector3 {
            (self.point2 - self.point1).cross(self.point3 - self.point1)
        }
    }

    /// 由若干半空间围成的凸体。此处只保存平面，不推导顶点。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Brush {
        pub faces: Vec<Face>,
    }

    impl Brush {
        #[inline]
        pub fn new(faces: Vec<Face>) -> Self {
            Self { faces }
        }

        #[inline]
        pub fn face_count(&self) -> usize {
            self.faces.len()
        }

        /// 所有面定义点的分量最小/最大值。无面时返回 None。
        pub fn bounds(&self) -> Option<Bounds3D> {
            let mut bounds = Bounds3D::empty();
            for face in &self.faces {
                for point in face.points() {
                    bounds.include_point(point);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        #[inline]
        pub fn center(&self) -> Option<Vector3> {
            self.bounds().map(|bounds| bounds.center())
        }

        pub fn translate(&mut self, offset: Vector3) {
            for face in &mut self.faces {
                face.translate(offset);
            }
        }

        pub fn textures(&self) -> impl Iterator<Item = &str> {
            self.faces.iter().map(|face| face.texture.as_str())
        }
    }

    /// 保持插入顺序的键值表，键唯一。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Properties {
        entries: Vec<(String, String)>,
    }

    impl Properties {
        #[inline]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, key: &str) -> Option<&str> {
            self.entries
                .iter()
                .find_map(|(k, v)| if k == key { Some(v.as_str()) } else { None })
        }

        #[inline]
        pub fn contains_key(&self, key: &str) -> bool {
            self.entries.iter().any(|(k, _)| k == key)
        }

        /// 写入键值。已存在的键原位替换并返回旧值，新键追加到末尾。
        pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
            let key = key.into();
            let value = value.into();
            match self.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => Some(std::mem::replace(slot, value)),
                None => {
                    self.entries.push((key, value));
                    None
                }
            }
        }

        pub fn remove(&mut self, key: &str) -> Option<String> {
            let index = self.entries.iter().position(|(k, _)| k == key)?;
            Some(self.entries.remove(index).1)
        }

        pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
            self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entries.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }
    }

    /// 地图实体：属性表加上可选的笔刷列表（点实体没有笔刷）。
    ///
    /// 类名只存放在 `classname` 属性里，[`Entity::classname`] 是对它的读取，
    /// 因此两者不可能不一致。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Entity {
        properties: Properties,
        pub brushes: Vec<Brush>,
    }

    impl Entity {
        pub fn new(classname: impl Into<String>) -> Self {
            let mut entity = Self::default();
            entity.set_classname(classname);
            entity
        }

        #[inline]
        pub fn classname(&self) -> &str {
            self.properties.get(CLASSNAME_KEY).unwrap_or("")
        }

        #[inline]
        pub fn set_classname(&mut self, classname: impl Into<String>) {
            self.properties.insert(CLASSNAME_KEY, classname);
        }

        #[inline]
        pub fn property(&self, key: &str) -> Option<&str> {
            self.properties.get(key)
        }

        #[inline]
        pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.properties.insert(key, value);
        }

        /// 删除属性并返回旧值。`classname` 不允许删除，返回 None。
        pub fn remove_property(&mut self, key: &str) -> Option<String> {
            if key == CLASSNAME_KEY {
                return None;
            }
            self.properties.remove(key)
        }

        #[inline]
        pub fn properties(&self) -> &Properties {
            &self.properties
        }

        #[inline]
        pub fn brush_count(&self) -> usize {
            self.brushes.len()
        }

        #[inline]
        pub fn is_point_entity(&self) -> bool {
            self.brushes.is_empty()
        }

        #[inline]
        pub fn is_worldspawn(&self) -> bool {
            self.classname() == WORLDSPAWN
        }

        /// 实体位置：优先解析 `origin` 属性（三个空白分隔的浮点数），
        /// 否则取各笔刷中心的平均值；都没有时返回 None。
        pub fn origin(&self) -> Option<Vector3> {
            self.explicit_origin().or_else(|| self.brush_origin())
        }

        /// 移动实体到新位置。`origin` 属性按整数截断写回；
        /// 若实体有笔刷且原本有位置，笔刷随之平移相同的偏移量。
        pub fn set_origin(&mut self, origin: Vector3) {
            if !self.brushes.is_empty() {
                if let Some(current) = self.origin() {
                    let offset = origin - current;
                    for brush in &mut self.brushes {
                        brush.translate(offset);
                    }
                }
            }
            self.properties.insert(ORIGIN_KEY, format_origin(origin));
        }

        pub fn bounds(&self) -> Option<Bounds3D> {
            let mut bounds = Bounds3D::empty();
            let mut has = false;
            for brush in &self.brushes {
                if let Some(brush_bounds) = brush.bounds() {
                    bounds.include_bounds(&brush_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        fn explicit_origin(&self) -> Option<Vector3> {
            let raw = self.properties.get(ORIGIN_KEY)?;
            let mut parts = raw.split_whitespace().map(|part| part.parse::<f64>());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => Some(Vector3::new(x, y, z)),
                _ => None,
            }
        }

        fn brush_origin(&self) -> Option<Vector3> {
            let centers: Vec<Vector3> = self.brushes.iter().filter_map(Brush::center).collect();
            if centers.is_empty() {
                return None;
            }
            let sum = centers.iter().fold(Vector3::ZERO, |acc, center| acc + *center);
            Some(sum / centers.len() as f64)
        }
    }

    fn format_origin(origin: Vector3) -> String {
        format!(
            "{} {} {}",
            origin.x() as i64,
            origin.y() as i64,
            origin.z() as i64
        )
    }

    /// 实体筛选条件，各条件均可缺省，同时给出时取交集。
    /// `property_value` 仅在给出 `property_key` 时生效。
    #[derive(Debug, Clone, Default)]
    pub struct EntityQuery {
        pub classname: Option<String>,
        pub property_key: Option<String>,
        pub property_value: Option<String>,
    }

    impl EntityQuery {
        pub fn classname(classname: impl Into<String>) -> Self {
            Self {
                classname: Some(classname.into()),
                ..Self::default()
            }
        }

        pub fn with_property(mut self, key: impl Into<String>, value: Option<String>) -> Self {
            self.property_key = Some(key.into());
            self.property_value = value;
            self
        }

        pub fn matches(&self, entity: &Entity) -> bool {
            if let Some(classname) = &self.classname {
                if entity.classname() != classname {
                    return false;
                }
            }
            if let Some(key) = &self.property_key {
                match (entity.property(key), &self.property_value) {
                    (None, _) => return false,
                    (Some(actual), Some(expected)) if actual != expected => return false,
                    _ => {}
                }
            }
            true
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityHit {
        pub index: usize,
        pub classname: String,
        pub origin: Vector3,
        pub distance: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BrushHit {
        pub entity_index: usize,
        pub brush_index: usize,
        pub classname: String,
        pub center: Vector3,
        pub bounds: Bounds3D,
        pub distance: f64,
    }

    /// 某点附近的实体与笔刷，均按距离升序排列。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct NearbyGeometry {
        pub entities: Vec<EntityHit>,
        pub brushes: Vec<BrushHit>,
    }

    /// 整张地图：有序的实体列表。第一个实体通常是 worldspawn。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct MapDocument {
        entities: Vec<Entity>,
    }

    impl MapDocument {
        #[inline]
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn with_entities(entities: Vec<Entity>) -> Self {
            Self { entities }
        }

        #[inline]
        pub fn entities(&self) -> &[Entity] {
            &self.entities
        }

        #[inline]
        pub fn entities_mut(&mut self) -> &mut [Entity] {
            &mut self.entities
        }

        #[inline]
        pub fn entity(&self, index: usize) -> Option<&Entity> {
            self.entities.get(index)
        }

        #[inline]
        pub fn entity_mut(&mut self, index: usize) -> Option<&mut Entity> {
            self.entities.get_mut(index)
        }

        /// 追加实体并返回其索引。
        pub fn add_entity(&mut self, entity: Entity) -> usize {
            self.entities.push(entity);
            self.entities.len() - 1
        }

        pub fn remove_entity(&mut self, index: usize) -> Option<Entity> {
            if index < self.entities.len() {
                Some(self.entities.remove(index))
            } else {
                None
            }
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        pub fn brush_count(&self) -> usize {
            self.entities.iter().map(Entity::brush_count).sum()
        }

        pub fn face_count(&self) -> usize {
            self.entities
                .iter()
                .flat_map(|entity| &entity.brushes)
                .map(Brush::face_count)
                .sum()
        }

        /// 第一个类名为 worldspawn 或带有笔刷的实体。
        pub fn worldspawn(&self) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|entity| entity.is_worldspawn() || !entity.brushes.is_empty())
        }

        pub fn find_entities<'a>(
            &'a self,
            query: &'a EntityQuery,
        ) -> impl Iterator<Item = (usize, &'a Entity)> + 'a {
            self.entities
                .iter()
                .enumerate()
                .filter(move |(_, entity)| query.matches(entity))
        }

        pub fn bounds(&self) -> Option<Bounds3D> {
            let mut bounds = Bounds3D::empty();
            let mut has = false;
            for entity in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        /// 所有面使用的贴图名，去重后按字典序排列。
        pub fn textures(&self) -> Vec<String> {
            let names: BTreeSet<&str> = self
                .entities
                .iter()
                .flat_map(|entity| &entity.brushes)
                .flat_map(Brush::textures)
                .collect();
            names.into_iter().map(str::to_string).collect()
        }

        /// 查找位置（实体）或笔刷中心落在 `radius` 范围内的几何体。
        pub fn geometry_near(&self, point: Vector3, radius: f64) -> NearbyGeometry {
            let mut nearby = NearbyGeometry::default();
            for (index, entity) in self.entities.iter().enumerate() {
                if let Some(origin) = entity.origin() {
                    let distance = point.distance(origin);
                    if distance <= radius {
                        nearby.entities.push(EntityHit {
                            index,
                            classname: entity.classname().to_string(),
                            origin,
                            distance,
                        });
                    }
                }
                for (brush_index, brush) in entity.brushes.iter().enumerate() {
                    let Some(bounds) = brush.bounds() else {
                        continue;
                    };
                    let center = bounds.center();
                    let distance = point.distance(center);
                    if distance <= radius {
                        nearby.brushes.push(BrushHit {
                            entity_index: index,
                            brush_index,
                            classname: entity.classname().to_string(),
                            center,
                            bounds,
                            distance,
                        });
                    }
                }
            }
            nearby
                .entities
                .sort_by(|a, b| a.distance.total_cmp(&b.distance));
            nearby
                .brushes
                .sort_by(|a, b| a.distance.total_cmp(&b.distance));
            nearby
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn face(points: [[f64; 3]; 3], texture: &str) -> Face {
            Face::new(points.map(Vector3::from), texture)
        }

        /// 以 `center` 为中心、半边长为 `half` 的轴对齐立方体，六个面。
        fn cube(center: Vector3, half: f64) -> Brush {
            let (x, y, z) = (center.x(), center.y(), center.z());
            let (lo_x, hi_x) = (x - half, x + half);
            let (lo_y, hi_y) = (y - half, y + half);
            let (lo_z, hi_z) = (z - half, z + half);
            Brush::new(vec![
                face([[lo_x, lo_y, lo_z], [lo_x, lo_y, hi_z], [lo_x, hi_y, lo_z]], "wall"),
                face([[hi_x, hi_y, hi_z], [hi_x, lo_y, hi_z], [hi_x, hi_y, lo_z]], "wall"),
                face([[lo_x, lo_y, lo_z], [hi_x, lo_y, lo_z], [lo_x, lo_y, hi_z]], "wall"),
                face([[hi_x, hi_y, hi_z], [hi_x, hi_y, lo_z], [lo_x, hi_y, hi_z]], "wall"),
                face([[lo_x, lo_y, lo_z], [lo_x, hi_y, lo_z], [hi_x, lo_y, lo_z]], "floor"),
                face([[hi_x, hi_y, hi_z], [lo_x, hi_y, hi_z], [hi_x, lo_y, hi_z]], "ceil"),
            ])
        }

        fn assert_vec_eq(actual: Vector3, expected: [f64; 3]) {
            let [x, y, z] = expected;
            assert!(
                (actual.x() - x).abs() < 1e-9
                    && (actual.y() - y).abs() < 1e-9
                    && (actual.z() - z).abs() < 1e-9,
                "expected {expected:?}, got {:?}",
                actual.to_array()
            );
        }

        #[test]
        fn face_normal_follows_right_hand_rule() {
            let face = face([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], "floor");
            let normal = face.normal();
            assert_vec_eq(normal, [0.0, 0.0, 1.0]);
            assert!((normal.length() - 1.0).abs() < 1e-12);
            assert!(!face.is_degenerate());
        }

        #[test]
        fn collinear_face_has_zero_normal() {
            let face = face([[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]], "bad");
            let normal = face.normal();
            assert_eq!(normal.length(), 0.0);
            assert!(!normal.x().is_nan());
            assert!(face.is_degenerate());
        }

        #[test]
        fn face_center_and_translate() {
            let mut face = face([[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [0.0, 3.0, 0.0]], "floor");
            assert_vec_eq(face.center(), [1.0, 1.0, 0.0]);
            face.translate(Vector3::new(0.0, 0.0, 8.0));
            assert_vec_eq(face.point2, [3.0, 0.0, 8.0]);
            assert_eq!(face.scale_u, 1.0);
            assert_eq!(face.scale_v, 1.0);
        }

        #[test]
        fn brush_bounds_cover_every_face_point() {
            let brush = Brush::new(vec![
                face([[-10.0, -5.0, 0.0], [10.0, -5.0, 0.0], [-10.0, 5.0, 0.0]], "a"),
                face([[10.0, 5.0, 20.0], [-10.0, 5.0, 20.0], [10.0, -5.0, 20.0]], "b"),
            ]);
            let bounds = brush.bounds().expect("brush has faces");
            assert_vec_eq(bounds.min(), [-10.0, -5.0, 0.0]);
            assert_vec_eq(bounds.max(), [10.0, 5.0, 20.0]);
            assert_vec_eq(brush.center().unwrap(), [0.0, 0.0, 10.0]);
        }

        #[test]
        fn empty_brush_has_no_bounds() {
            let brush = Brush::default();
            assert!(brush.bounds().is_none());
            assert!(brush.center().is_none());
        }

        #[test]
        fn classname_is_backed_by_property() {
            let mut entity = Entity::new("info_player_start");
            assert_eq!(entity.property(CLASSNAME_KEY), Some("info_player_start"));

            entity.set_property(CLASSNAME_KEY, "light");
            assert_eq!(entity.classname(), "light");

            entity.set_classname("func_door");
            assert_eq!(entity.property(CLASSNAME_KEY), Some("func_door"));
            assert_eq!(entity.remove_property(CLASSNAME_KEY), None);
            assert_eq!(entity.classname(), "func_door");
        }

        #[test]
        fn properties_keep_insertion_order_on_replace() {
            let mut props = Properties::new();
            props.insert("classname", "light");
            props.insert("light", "300");
            props.insert("origin", "0 0 0");
            assert_eq!(props.insert("light", "200"), Some("300".to_string()));
            let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
            assert_eq!(keys, ["classname", "light", "origin"]);
            assert_eq!(props.remove("light"), Some("200".to_string()));
            assert_eq!(props.len(), 2);
        }

        #[test]
        fn origin_prefers_explicit_property() {
            let mut entity = Entity::new("light");
            assert!(entity.origin().is_none());
            entity.set_property(ORIGIN_KEY, "16 -32 48");
            assert_vec_eq(entity.origin().unwrap(), [16.0, -32.0, 48.0]);
        }

        #[test]
        fn origin_derived_from_brush_centers() {
            let mut entity = Entity::new("func_wall");
            entity.brushes.push(cube(Vector3::new(0.0, 0.0, 0.0), 8.0));
            entity.brushes.push(cube(Vector3::new(10.0, 0.0, 0.0), 8.0));
            assert_vec_eq(entity.origin().unwrap(), [5.0, 0.0, 0.0]);
        }

        #[test]
        fn malformed_origin_falls_back_to_brushes() {
            let mut entity = Entity::new("func_wall");
            entity.set_property(ORIGIN_KEY, "1 2");
            assert!(entity.origin().is_none());
            entity.brushes.push(cube(Vector3::new(4.0, 4.0, 4.0), 2.0));
            assert_vec_eq(entity.origin().unwrap(), [4.0, 4.0, 4.0]);
        }

        #[test]
        fn set_origin_moves_owned_brushes() {
            let mut entity = Entity::new("func_door");
            entity.brushes.push(cube(Vector3::new(0.0, 0.0, 0.0), 16.0));
            let before = entity.brushes[0].clone();

            entity.set_origin(Vector3::new(100.0, 0.0, 0.0));

            assert_eq!(entity.property(ORIGIN_KEY), Some("100 0 0"));
            for (moved, original) in entity.brushes[0].faces.iter().zip(&before.faces) {
                for (p, q) in moved.points().iter().zip(original.points()) {
                    assert_vec_eq(*p - q, [100.0, 0.0, 0.0]);
                }
            }
        }

        #[test]
        fn set_origin_truncates_point_entity_coordinates() {
            let mut entity = Entity::new("info_player_start");
            entity.set_origin(Vector3::new(12.9, -7.5, 0.2));
            assert_eq!(entity.property(ORIGIN_KEY), Some("12 -7 0"));
            assert_vec_eq(entity.origin().unwrap(), [12.0, -7.0, 0.0]);
        }

        #[test]
        fn document_queries_and_aggregates() {
            let mut world = Entity::new(WORLDSPAWN);
            world.set_property("wad", "base.wad");
            world.brushes.push(cube(Vector3::new(0.0, 0.0, 0.0), 64.0));
            world.brushes.push(cube(Vector3::new(256.0, 0.0, 0.0), 32.0));

            let mut light = Entity::new("light");
            light.set_origin(Vector3::new(0.0, 0.0, 48.0));
            light.set_property("light", "300");

            let mut dim = Entity::new("light");
            dim.set_origin(Vector3::new(512.0, 0.0, 0.0));
            dim.set_property("light", "100");

            let mut doc = MapDocument::new();
            assert!(doc.bounds().is_none());
            assert_eq!(doc.add_entity(world), 0);
            doc.add_entity(light);
            doc.add_entity(dim);

            assert_eq!(doc.entity_count(), 3);
            assert_eq!(doc.brush_count(), 2);
            assert_eq!(doc.face_count(), 12);
            assert_eq!(doc.worldspawn().map(Entity::classname), Some(WORLDSPAWN));
            assert_eq!(doc.textures(), ["ceil", "floor", "wall"]);

            let bounds = doc.bounds().expect("world has brushes");
            assert_vec_eq(bounds.min(), [-64.0, -64.0, -64.0]);
            assert_vec_eq(bounds.max(), [288.0, 64.0, 64.0]);

            let lights = EntityQuery::classname("light");
            assert_eq!(doc.find_entities(&lights).count(), 2);
            let bright = EntityQuery::classname("light")
                .with_property("light", Some("300".to_string()));
            let found: Vec<usize> = doc.find_entities(&bright).map(|(i, _)| i).collect();
            assert_eq!(found, [1]);
            let with_wad = EntityQuery::default().with_property("wad", None);
            assert_eq!(doc.find_entities(&with_wad).count(), 1);

            let removed = doc.remove_entity(2).expect("entity exists");
            assert_eq!(removed.property("light"), Some("100"));
            assert!(doc.remove_entity(5).is_none());
            assert!(doc.entity(2).is_none());
        }

        #[test]
        fn geometry_near_sorts_hits_by_distance() {
            let mut world = Entity::new(WORLDSPAWN);
            world.brushes.push(cube(Vector3::new(20.0, 0.0, 0.0), 4.0));
            world.brushes.push(cube(Vector3::new(5.0, 0.0, 0.0), 4.0));
            world.brushes.push(cube(Vector3::new(500.0, 0.0, 0.0), 4.0));
            let mut player = Entity::new("info_player_start");
            player.set_origin(Vector3::new(0.0, 10.0, 0.0));

            let mut doc = MapDocument::with_entities(vec![world, player]);
            let nearby = doc.geometry_near(Vector3::ZERO, 32.0);

            let brush_order: Vec<usize> = nearby.brushes.iter().map(|hit| hit.brush_index).collect();
            assert_eq!(brush_order, [1, 0]);
            // worldspawn 的派生位置在 (175, 0, 0)，超出半径
            assert_eq!(nearby.entities.len(), 1);
            assert_eq!(nearby.entities[0].index, 1);
            assert!((nearby.entities[0].distance - 10.0).abs() < 1e-9);

            doc.entities_mut()[1].set_origin(Vector3::new(1000.0, 0.0, 0.0));
            assert!(doc.geometry_near(Vector3::ZERO, 32.0).entities.is_empty());
        }

        #[test]
        fn vector_helpers() {
            let v = Vector3::from_slice(&[3.0, 4.0]);
            assert_vec_eq(v, [3.0, 4.0, 0.0]);
            assert!((v.length() - 5.0).abs() < 1e-12);
            assert_vec_eq(v.normalize(), [0.6, 0.8, 0.0]);
            assert_eq!(Vector3::ZERO.normalize(), Vector3::ZERO);
            assert_vec_eq(-v * 2.0, [-6.0, -8.0, 0.0]);
            assert!((v.distance(Vector3::ZERO) - 5.0).abs() < 1e-12);
            assert!((v.dot(Vector3::new(1.0, 1.0, 1.0)) - 7.0).abs() < 1e-12);
            assert_vec_eq(Vector3::from_slice(&[1.0, 2.0, 3.0, 4.0]), [1.0, 2.0, 3.0]);
        }

        #[test]
        fn bounds_contains_and_size() {
            let mut bounds = Bounds3D::empty();
            assert!(bounds.is_empty());
            bounds.include_point(Vector3::new(1.0, 2.0, 3.0));
            bounds.include_point(Vector3::new(-1.0, 0.0, 5.0));
            assert_vec_eq(bounds.size(), [2.0, 2.0, 2.0]);
            assert!(bounds.contains(Vector3::new(0.0, 1.0, 4.0)));
            assert!(!bounds.contains(Vector3::new(0.0, 3.0, 4.0)));
        }
    }
}

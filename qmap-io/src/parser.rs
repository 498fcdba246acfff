use qmap_core::geometry::Vector3;
use qmap_core::map::{Brush, Entity, Face, MapDocument};
use thiserror::Error;

/// 解析失败时的唯一错误类型，携带 1 起始的行列号。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}（第 {line} 行，第 {column} 列）")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// 将 `.map` 文本解析为 [`MapDocument`]。任何语法错误都会中止整个解析。
pub fn parse(source: &str) -> Result<MapDocument, ParseError> {
    MapParser::new(source).parse()
}

/// 单遍递归下降解析器，只向前看一个字符，不回溯。
struct MapParser<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> MapParser<'a> {
    fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn parse(mut self) -> Result<MapDocument, ParseError> {
        let mut document = MapDocument::new();
        loop {
            self.skip_insignificant();
            match self.peek() {
                None => break,
                Some('{') => {
                    let entity = self.parse_entity()?;
                    document.add_entity(entity);
                }
                Some(other) => {
                    return Err(self.error(format!("期望 '{{' 开始实体，实际为 '{other}'")));
                }
            }
        }
        Ok(document)
    }

    /// entity := '{' property* brush* '}'
    fn parse_entity(&mut self) -> Result<Entity, ParseError> {
        self.expect('{')?;
        self.skip_insignificant();

        let mut entity = Entity::default();
        while self.peek() == Some('"') {
            let key = self.parse_quoted()?;
            self.skip_insignificant();
            let value = self.parse_quoted()?;
            entity.set_property(key, value);
            self.skip_insignificant();
        }

        // 出现第一个笔刷后不再接受属性，随后的 '"' 会在 expect('}') 处报错。
        while self.peek() == Some('{') {
            let brush = self.parse_brush()?;
            entity.brushes.push(brush);
            self.skip_insignificant();
        }

        self.expect('}')?;
        Ok(entity)
    }

    /// brush := '{' face* '}'
    fn parse_brush(&mut self) -> Result<Brush, ParseError> {
        self.expect('{')?;
        self.skip_insignificant();

        let mut brush = Brush::default();
        while self.peek() == Some('(') {
            let face = self.parse_face()?;
            brush.faces.push(face);
            self.skip_insignificant();
        }

        self.expect('}')?;
        Ok(brush)
    }

    /// face := point point point token number{5}
    fn parse_face(&mut self) -> Result<Face, ParseError> {
        let point1 = self.parse_point()?;
        self.skip_insignificant();
        let point2 = self.parse_point()?;
        self.skip_insignificant();
        let point3 = self.parse_point()?;
        self.skip_insignificant();

        let texture = self.parse_token()?;
        let mut face = Face::new([point1, point2, point3], texture);
        face.offset_u = self.parse_number("贴图 U 偏移")?;
        face.offset_v = self.parse_number("贴图 V 偏移")?;
        face.rotation = self.parse_number("贴图旋转角")?;
        face.scale_u = self.parse_number("贴图 U 缩放")?;
        face.scale_v = self.parse_number("贴图 V 缩放")?;
        Ok(face)
    }

    /// point := '(' number number number ')'
    fn parse_point(&mut self) -> Result<Vector3, ParseError> {
        self.expect('(')?;
        let x = self.parse_number("X 坐标")?;
        let y = self.parse_number("Y 坐标")?;
        let z = self.parse_number("Z 坐标")?;
        self.skip_insignificant();
        self.expect(')')?;
        Ok(Vector3::new(x, y, z))
    }

    /// 读取一个记号并转换为浮点数；出错时报告记号起始位置。
    fn parse_number(&mut self, context: &str) -> Result<f64, ParseError> {
        self.skip_insignificant();
        let (line, column) = (self.line, self.column);
        let token = self.parse_token()?;
        token.trim().parse::<f64>().map_err(|_| {
            ParseError::new(format!("{context} 不是有效数值（值：\"{token}\"）"), line, column)
        })
    }

    /// 带引号字符串，或由非空白、非 `{}()` 字符组成的最长串。
    fn parse_token(&mut self) -> Result<String, ParseError> {
        if self.peek() == Some('"') {
            return self.parse_quoted();
        }

        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '{' | '}' | '(' | ')') {
                break;
            }
            self.advance();
        }

        if start == self.pos {
            return Err(match self.peek() {
                Some(ch) => self.error(format!("期望记号，实际为 '{ch}'")),
                None => self.error("期望记号，但已到达文件结尾"),
            });
        }
        Ok(self.source[start..self.pos].to_string())
    }

    /// 读取 `"..."`，内容到下一个引号为止，不做任何转义处理。
    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        self.expect('"')?;
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '"' {
                let content = self.source[start..self.pos].to_string();
                self.advance();
                return Ok(content);
            }
            self.advance();
        }
        Err(self.error("字符串缺少结束引号"))
    }

    fn skip_insignificant(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' || ch == '\r' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(actual) if actual == expected => {
                self.advance();
                Ok(())
            }
            Some(actual) => Err(self.error(format!("期望 '{expected}'，实际为 '{actual}'"))),
            None => Err(self.error(format!("期望 '{expected}'，但已到达文件结尾"))),
        }
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    #[inline]
    fn peek_second(&self) -> Option<char> {
        self.source[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line, self.column)
    }
}

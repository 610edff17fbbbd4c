//! PLY header layout and fixed-width body access.
//!
//! A splat file is a text header (`ply`, `format ...`, `element ...`,
//! `property ...`, `end_header`) followed by a body. Only the
//! `binary_little_endian` body is read: every element is then a run of
//! fixed-width records laid out back to back in declaration order, so the
//! absolute offset of any element follows from the header alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::CodecError;

/// Body encoding declared by the `format` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyFormat {
    BinaryLittleEndian,
    BinaryBigEndian,
    Ascii,
}

impl BodyFormat {
    /// Name as written in the header.
    pub fn name(&self) -> &'static str {
        match self {
            BodyFormat::BinaryLittleEndian => "binary_little_endian",
            BodyFormat::BinaryBigEndian => "binary_big_endian",
            BodyFormat::Ascii => "ascii",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "binary_little_endian" => Some(BodyFormat::BinaryLittleEndian),
            "binary_big_endian" => Some(BodyFormat::BinaryBigEndian),
            "ascii" => Some(BodyFormat::Ascii),
            _ => None,
        }
    }
}

/// PLY primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    /// Parses both the classic (`uchar`) and sized (`uint8`) spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "char" | "int8" => ScalarType::Int8,
            "uchar" | "uint8" => ScalarType::UInt8,
            "short" | "int16" => ScalarType::Int16,
            "ushort" | "uint16" => ScalarType::UInt16,
            "int" | "int32" => ScalarType::Int32,
            "uint" | "uint32" => ScalarType::UInt32,
            "float" | "float32" => ScalarType::Float32,
            "double" | "float64" => ScalarType::Float64,
            _ => return None,
        };
        Some(ty)
    }

    /// Classic header spelling.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Int8 => "char",
            ScalarType::UInt8 => "uchar",
            ScalarType::Int16 => "short",
            ScalarType::UInt16 => "ushort",
            ScalarType::Int32 => "int",
            ScalarType::UInt32 => "uint",
            ScalarType::Float32 => "float",
            ScalarType::Float64 => "double",
        }
    }

    /// Width in bytes.
    pub fn width(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    /// Reads one little-endian value. `bytes` must hold at least `width()` bytes.
    pub fn read_le(&self, bytes: &[u8]) -> f64 {
        match self {
            ScalarType::Int8 => i8::from_le_bytes(array(bytes)) as f64,
            ScalarType::UInt8 => bytes[0] as f64,
            ScalarType::Int16 => i16::from_le_bytes(array(bytes)) as f64,
            ScalarType::UInt16 => u16::from_le_bytes(array(bytes)) as f64,
            ScalarType::Int32 => i32::from_le_bytes(array(bytes)) as f64,
            ScalarType::UInt32 => u32::from_le_bytes(array(bytes)) as f64,
            ScalarType::Float32 => f32::from_le_bytes(array(bytes)) as f64,
            ScalarType::Float64 => f64::from_le_bytes(array(bytes)),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// How a property is stored in each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Known fixed-width primitive
    Scalar(ScalarType),
    /// Unrecognised type name, assumed to be a 4-byte float
    Assumed(String),
    /// `property list <count type> <item type>`; makes the record variable-width
    List,
}

impl PropertyKind {
    /// Width in bytes, `None` for lists.
    pub fn width(&self) -> Option<usize> {
        match self {
            PropertyKind::Scalar(ty) => Some(ty.width()),
            PropertyKind::Assumed(_) => Some(4),
            PropertyKind::List => None,
        }
    }

    fn scalar(&self) -> Option<ScalarType> {
        match self {
            PropertyKind::Scalar(ty) => Some(*ty),
            PropertyKind::Assumed(_) => Some(ScalarType::Float32),
            PropertyKind::List => None,
        }
    }
}

/// A named field of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlyProperty {
    pub name: String,
    pub kind: PropertyKind,
}

/// A declared element (record group) and where it lives in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlyElement {
    pub name: String,

    /// Number of records
    pub count: usize,

    /// Fields in record order
    pub properties: Vec<PlyProperty>,

    /// Bytes per record; `None` when a list property is present
    pub record_width: Option<usize>,

    /// Absolute byte offset of the first record; `None` when unknowable
    pub offset: Option<usize>,
}

impl PlyElement {
    fn new(name: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            count,
            properties: Vec::new(),
            record_width: Some(0),
            offset: None,
        }
    }

    /// Total bytes occupied by this element, if fixed-width and
    /// representable.
    pub fn byte_len(&self) -> Option<usize> {
        self.record_width.and_then(|w| w.checked_mul(self.count))
    }

    /// Byte offset of `name` inside a record.
    pub fn property_offset(&self, name: &str) -> Option<(usize, &PlyProperty)> {
        let mut offset = 0;
        for property in &self.properties {
            if property.name == name {
                return Some((offset, property));
            }
            offset += property.kind.width()?;
        }
        None
    }
}

/// Parsed header of a PLY file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlyLayout {
    pub format: BodyFormat,

    /// Declared elements in header order
    pub elements: Vec<PlyElement>,

    /// Bytes consumed by the header, terminators included
    pub body_offset: usize,
}

impl PlyLayout {
    /// Parses the header at the start of `bytes`.
    ///
    /// Lines are `\n`-terminated (a trailing `\r` is tolerated). The header
    /// is parsed whatever the body format is; callers that read the body
    /// check [`PlyLayout::require_little_endian`] first.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = 0usize;
        let mut line_no = 0usize;
        let mut format: Option<BodyFormat> = None;
        let mut elements: Vec<PlyElement> = Vec::new();

        loop {
            let rest = &bytes[cursor..];
            let Some(newline) = rest.iter().position(|&b| b == b'\n') else {
                return Err(CodecError::MissingTerminator);
            };
            let raw = &rest[..newline];
            cursor += newline + 1;
            line_no += 1;

            if raw.contains(&0) {
                return Err(CodecError::malformed(line_no, "NUL byte in header"));
            }
            let line = std::str::from_utf8(raw)
                .map_err(|_| CodecError::malformed(line_no, "header is not valid UTF-8"))?
                .trim_end_matches('\r');

            if line_no == 1 {
                if line.trim() != "ply" {
                    return Err(CodecError::NotPly);
                }
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };

            match keyword {
                "end_header" => break,
                "comment" | "obj_info" => {}
                "format" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| CodecError::malformed(line_no, "format without a type"))?;
                    let parsed = BodyFormat::from_name(name).ok_or_else(|| {
                        CodecError::malformed(line_no, format!("unknown format `{}`", name))
                    })?;
                    format = Some(parsed);
                }
                "element" => {
                    let (Some(name), Some(count)) = (tokens.next(), tokens.next()) else {
                        return Err(CodecError::malformed(line_no, "element needs a name and a count"));
                    };
                    let count: usize = count.parse().map_err(|_| {
                        CodecError::malformed(line_no, format!("invalid element count `{}`", count))
                    })?;
                    elements.push(PlyElement::new(name, count));
                }
                "property" => {
                    let element = elements.last_mut().ok_or_else(|| {
                        CodecError::malformed(line_no, "property before any element")
                    })?;
                    let property = parse_property(line_no, &element.name, tokens)?;
                    element.record_width = match (element.record_width, property.kind.width()) {
                        (Some(total), Some(width)) => Some(total + width),
                        _ => None,
                    };
                    element.properties.push(property);
                }
                other => {
                    return Err(CodecError::malformed(
                        line_no,
                        format!("unknown keyword `{}`", other),
                    ));
                }
            }
        }

        let format = format.ok_or_else(|| CodecError::malformed(line_no, "missing format line"))?;

        // Offsets stay known until the first variable-width element
        let mut offset = Some(cursor);
        for element in &mut elements {
            element.offset = offset;
            offset = match (offset, element.record_width) {
                (Some(start), Some(_)) => {
                    let end = element.byte_len().and_then(|len| start.checked_add(len));
                    if end.is_none() {
                        return Err(CodecError::malformed(
                            line_no,
                            format!("element `{}` with {} records overflows", element.name, element.count),
                        ));
                    }
                    end
                }
                _ => None,
            };
        }

        Ok(Self {
            format,
            elements,
            body_offset: cursor,
        })
    }

    /// Looks up an element by name.
    pub fn element(&self, name: &str) -> Option<&PlyElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Fails with `UnsupportedFormat` unless the body is binary little-endian.
    pub fn require_little_endian(&self) -> Result<(), CodecError> {
        match self.format {
            BodyFormat::BinaryLittleEndian => Ok(()),
            other => Err(CodecError::UnsupportedFormat(other.name().to_string())),
        }
    }

    /// Returns the body bytes of a fixed-width element.
    pub fn element_bytes<'a>(
        &self,
        bytes: &'a [u8],
        element: &PlyElement,
    ) -> Result<&'a [u8], CodecError> {
        let (Some(start), Some(_)) = (element.offset, element.record_width) else {
            return Err(CodecError::VariableWidth(element.name.clone()));
        };
        let end = element
            .byte_len()
            .and_then(|len| start.checked_add(len))
            .unwrap_or(usize::MAX);
        if end > bytes.len() {
            return Err(CodecError::Truncated {
                element: element.name.clone(),
                needed: end,
                available: bytes.len(),
            });
        }
        Ok(&bytes[start..end])
    }

    /// Reads every scalar of an element in record order, each converted
    /// from its declared type.
    pub fn read_scalars(&self, bytes: &[u8], element: &PlyElement) -> Result<Vec<f64>, CodecError> {
        let region = self.element_bytes(bytes, element)?;
        let kinds: Vec<ScalarType> = element
            .properties
            .iter()
            .filter_map(|p| p.kind.scalar())
            .collect();

        if kinds.is_empty() {
            return Ok(Vec::new());
        }

        // Every scalar is at least one byte, so the region bounds the count
        let mut values = Vec::with_capacity(element.count.saturating_mul(kinds.len()).min(region.len()));
        let mut cursor = 0usize;
        for _ in 0..element.count {
            for kind in &kinds {
                values.push(kind.read_le(&region[cursor..]));
                cursor += kind.width();
            }
        }
        Ok(values)
    }
}

fn parse_property<'a>(
    line_no: usize,
    element: &str,
    mut tokens: impl Iterator<Item = &'a str>,
) -> Result<PlyProperty, CodecError> {
    let type_name = tokens
        .next()
        .ok_or_else(|| CodecError::malformed(line_no, "property without a type"))?;

    if type_name == "list" {
        let (Some(_count_ty), Some(_item_ty), Some(name)) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(CodecError::malformed(line_no, "list property needs two types and a name"));
        };
        return Ok(PlyProperty {
            name: name.to_string(),
            kind: PropertyKind::List,
        });
    }

    let name = tokens
        .next()
        .ok_or_else(|| CodecError::malformed(line_no, "property without a name"))?;

    let kind = match ScalarType::from_name(type_name) {
        Some(ty) => PropertyKind::Scalar(ty),
        None => {
            warn!(
                "unknown PLY type `{}` for {}.{}, assuming 4 bytes",
                type_name, element, name
            );
            PropertyKind::Assumed(type_name.to_string())
        }
    };

    Ok(PlyProperty {
        name: name.to_string(),
        kind,
    })
}

/// Reads the `x, y, z` columns of the `vertex` element as flat triples.
pub fn read_vertex_positions(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    let layout = PlyLayout::parse(bytes)?;
    layout.require_little_endian()?;

    let vertex = layout
        .element("vertex")
        .ok_or_else(|| CodecError::MissingElement("vertex".to_string()))?;
    let record_width = vertex
        .record_width
        .ok_or_else(|| CodecError::VariableWidth(vertex.name.clone()))?;

    let mut columns = Vec::with_capacity(3);
    for axis in ["x", "y", "z"] {
        let (offset, property) = vertex.property_offset(axis).ok_or_else(|| {
            CodecError::MissingProperty {
                element: vertex.name.clone(),
                property: axis.to_string(),
            }
        })?;
        let ty = property.kind.scalar().ok_or_else(|| CodecError::MissingProperty {
            element: vertex.name.clone(),
            property: axis.to_string(),
        })?;
        columns.push((offset, ty));
    }

    let region = layout.element_bytes(bytes, vertex)?;
    let mut positions = Vec::with_capacity((region.len() / record_width).saturating_mul(3));
    for record in region.chunks_exact(record_width) {
        for (offset, ty) in &columns {
            positions.push(ty.read_le(&record[*offset..]) as f32);
        }
    }
    Ok(positions)
}

/// Minimal binary PLY writer.
///
/// The header is built from `element` calls; values are appended in record
/// order with the `push_*` methods using the writer's byte order.
#[derive(Debug, Clone)]
pub struct PlyWriter {
    format: BodyFormat,
    header: Vec<String>,
    body: Vec<u8>,
}

impl PlyWriter {
    /// Little-endian writer.
    pub fn new() -> Self {
        Self::with_format(BodyFormat::BinaryLittleEndian)
    }

    /// Big-endian writer (only useful to produce files the reader rejects).
    pub fn big_endian() -> Self {
        Self::with_format(BodyFormat::BinaryBigEndian)
    }

    fn with_format(format: BodyFormat) -> Self {
        Self {
            format,
            header: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds a `comment` header line.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.header.push(format!("comment {}", text));
        self
    }

    /// Declares an element and its scalar properties.
    pub fn element(&mut self, name: &str, count: usize, properties: &[(ScalarType, &str)]) -> &mut Self {
        self.header.push(format!("element {} {}", name, count));
        for (ty, property) in properties {
            self.header.push(format!("property {} {}", ty.name(), property));
        }
        self
    }

    /// Appends one value of the given type.
    pub fn push(&mut self, ty: ScalarType, value: f64) -> &mut Self {
        let little = self.format == BodyFormat::BinaryLittleEndian;
        macro_rules! put {
            ($v:expr) => {
                if little {
                    self.body.extend_from_slice(&$v.to_le_bytes())
                } else {
                    self.body.extend_from_slice(&$v.to_be_bytes())
                }
            };
        }
        match ty {
            ScalarType::Int8 => put!(value as i8),
            ScalarType::UInt8 => put!(value as u8),
            ScalarType::Int16 => put!(value as i16),
            ScalarType::UInt16 => put!(value as u16),
            ScalarType::Int32 => put!(value as i32),
            ScalarType::UInt32 => put!(value as u32),
            ScalarType::Float32 => put!(value as f32),
            ScalarType::Float64 => put!(value),
        }
        self
    }

    pub fn push_f32(&mut self, value: f32) -> &mut Self {
        self.push(ScalarType::Float32, value as f64)
    }

    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        self.push(ScalarType::UInt32, value as f64)
    }

    pub fn push_u8(&mut self, value: u8) -> &mut Self {
        self.push(ScalarType::UInt8, value as f64)
    }

    /// Returns header followed by body.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        out.extend_from_slice(b"ply\n");
        out.extend_from_slice(format!("format {} 1.0\n", self.format.name()).as_bytes());
        for line in &self.header {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out.extend_from_slice(b"end_header\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl Default for PlyWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_element_file() -> Vec<u8> {
        let mut writer = PlyWriter::new();
        writer
            .element(
                "vertex",
                2,
                &[
                    (ScalarType::Float32, "x"),
                    (ScalarType::Float32, "y"),
                    (ScalarType::Float32, "z"),
                    (ScalarType::UInt8, "opacity"),
                ],
            )
            .element("image_size", 2, &[(ScalarType::UInt32, "image_size")]);
        writer
            .push_f32(1.0).push_f32(2.0).push_f32(3.0).push_u8(255)
            .push_f32(-1.0).push_f32(0.5).push_f32(4.0).push_u8(0)
            .push_u32(640)
            .push_u32(480);
        writer.finish()
    }

    #[test]
    fn test_layout_offsets_follow_declaration_order() {
        let bytes = two_element_file();
        let layout = PlyLayout::parse(&bytes).unwrap();

        assert_eq!(layout.format, BodyFormat::BinaryLittleEndian);
        let vertex = layout.element("vertex").unwrap();
        assert_eq!(vertex.record_width, Some(13));
        assert_eq!(vertex.offset, Some(layout.body_offset));

        let image_size = layout.element("image_size").unwrap();
        assert_eq!(image_size.offset, Some(layout.body_offset + 26));
        assert_eq!(layout.body_offset + 26 + 8, bytes.len());
    }

    #[test]
    fn test_body_offset_counts_crlf_terminators() {
        let header = "ply\r\nformat binary_little_endian 1.0\r\nelement color_space 1\r\nproperty uchar color_space\r\nend_header\r\n";
        let mut bytes = header.as_bytes().to_vec();
        bytes.push(1);

        let layout = PlyLayout::parse(&bytes).unwrap();
        assert_eq!(layout.body_offset, header.len());
        let element = layout.element("color_space").unwrap();
        assert_eq!(layout.read_scalars(&bytes, element).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_read_scalars_converts_declared_types() {
        let bytes = two_element_file();
        let layout = PlyLayout::parse(&bytes).unwrap();
        let image_size = layout.element("image_size").unwrap();

        assert_eq!(layout.read_scalars(&bytes, image_size).unwrap(), vec![640.0, 480.0]);
    }

    #[test]
    fn test_read_vertex_positions() {
        let positions = read_vertex_positions(&two_element_file()).unwrap();
        assert_eq!(positions, vec![1.0, 2.0, 3.0, -1.0, 0.5, 4.0]);
    }

    #[test]
    fn test_unknown_type_assumes_four_bytes() {
        let bytes = b"ply\nformat binary_little_endian 1.0\nelement thing 1\nproperty half a\nproperty uchar b\nend_header\n";
        let layout = PlyLayout::parse(bytes).unwrap();
        let thing = layout.element("thing").unwrap();

        assert_eq!(thing.record_width, Some(5));
        assert!(matches!(thing.properties[0].kind, PropertyKind::Assumed(_)));
    }

    #[test]
    fn test_list_property_hides_later_offsets() {
        let bytes = b"ply\nformat binary_little_endian 1.0\nelement face 1\nproperty list uchar int vertex_indices\nelement color_space 1\nproperty uchar color_space\nend_header\n";
        let layout = PlyLayout::parse(bytes).unwrap();

        assert_eq!(layout.element("face").unwrap().record_width, None);
        let color = layout.element("color_space").unwrap();
        assert_eq!(color.offset, None);
        assert_eq!(
            layout.read_scalars(bytes, color),
            Err(CodecError::VariableWidth("color_space".to_string()))
        );
    }

    #[test]
    fn test_header_errors() {
        assert_eq!(PlyLayout::parse(b"obj\n"), Err(CodecError::NotPly));
        assert_eq!(
            PlyLayout::parse(b"ply\nformat binary_little_endian 1.0\n"),
            Err(CodecError::MissingTerminator)
        );
        assert!(matches!(
            PlyLayout::parse(b"ply\nformat binary_little_endian 1.0\nelement vertex many\nend_header\n"),
            Err(CodecError::MalformedHeader { line: 3, .. })
        ));
        assert!(matches!(
            PlyLayout::parse(b"ply\nformat binary_little_endian 1.0\ncom\0ment\nend_header\n"),
            Err(CodecError::MalformedHeader { line: 3, .. })
        ));
        assert!(matches!(
            PlyLayout::parse(b"ply\nelement vertex 1\nend_header\n"),
            Err(CodecError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_truncated_body_is_reported() {
        let mut bytes = two_element_file();
        bytes.truncate(bytes.len() - 3);
        let layout = PlyLayout::parse(&bytes).unwrap();
        let image_size = layout.element("image_size").unwrap();

        assert!(matches!(
            layout.read_scalars(&bytes, image_size),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_overflowing_element_size_is_malformed() {
        let header = b"ply\nformat binary_little_endian 1.0\nelement vertex 4611686018427387904\nproperty float x\nproperty float y\nproperty float z\nend_header\n";

        assert!(matches!(PlyLayout::parse(header), Err(CodecError::MalformedHeader { .. })));
        assert!(read_vertex_positions(header).is_err());
    }

    #[test]
    fn test_huge_count_without_overflow_is_truncated() {
        let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1000000000000\nproperty float x\nproperty float y\nproperty float z\nend_header\n\0\0";
        let layout = PlyLayout::parse(bytes).unwrap();
        let vertex = layout.element("vertex").unwrap();

        assert!(matches!(layout.read_scalars(bytes, vertex), Err(CodecError::Truncated { .. })));
        assert!(matches!(read_vertex_positions(bytes), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_propertyless_element_reads_nothing() {
        let bytes = b"ply\nformat binary_little_endian 1.0\nelement marker 1000000000000000\nend_header\n";
        let layout = PlyLayout::parse(bytes).unwrap();
        let marker = layout.element("marker").unwrap();

        assert_eq!(marker.byte_len(), Some(0));
        assert!(layout.read_scalars(bytes, marker).unwrap().is_empty());
    }

    #[test]
    fn test_big_endian_body_is_unsupported() {
        let mut writer = PlyWriter::big_endian();
        writer.element("vertex", 1, &[(ScalarType::Float32, "x"), (ScalarType::Float32, "y"), (ScalarType::Float32, "z")]);
        writer.push_f32(0.0).push_f32(0.0).push_f32(1.0);

        let err = read_vertex_positions(&writer.finish()).unwrap_err();
        assert!(err.is_unsupported());
    }
}

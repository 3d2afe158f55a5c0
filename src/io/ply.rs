//! Stanford PLY surfaces through `ply-rs`
//!
//! Vertices are written as doubles so positions round-trip exactly; colors
//! as `uchar` red/green/blue; comments as header `comment` lines.

use super::{IoError, IoResult};
use crate::float_types::Real;
use crate::surface::{Rgb, Surface};
use nalgebra::Point3;
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

pub fn read_ply(path: &Path) -> IoResult<Surface> {
    let file = File::open(path).map_err(|e| IoError::file(path, e))?;
    read_ply_from(&mut BufReader::new(file), path)
}

pub fn read_ply_from<R: BufRead>(reader: &mut R, path: &Path) -> IoResult<Surface> {
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(reader)
        .map_err(|e| IoError::Ply(format!("{}: {e}", path.display())))?;

    let mut vertices = Vec::new();
    let mut colors = Vec::new();
    if let Some(elements) = ply.payload.get("vertex") {
        vertices.reserve(elements.len());
        for element in elements {
            vertices.push(Point3::new(
                float_property(element, "x", path)?,
                float_property(element, "y", path)?,
                float_property(element, "z", path)?,
            ));
            if let (Some(r), Some(g), Some(b)) = (
                color_channel(element.get("red")),
                color_channel(element.get("green")),
                color_channel(element.get("blue")),
            ) {
                colors.push(Rgb::new(r, g, b));
            }
        }
    }

    let mut faces = Vec::new();
    if let Some(elements) = ply.payload.get("face") {
        faces.reserve(elements.len());
        for element in elements {
            let ids = element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"))
                .and_then(index_list)
                .ok_or_else(|| IoError::malformed(path, "face without a vertex index list"))?;
            if ids.len() < 3 {
                return Err(IoError::malformed(path, "face with fewer than 3 vertices"));
            }
            for i in 1..ids.len() - 1 {
                faces.push([ids[0], ids[i], ids[i + 1]]);
            }
        }
    }

    debug!("PLY parsed: {} vertices, {} faces", vertices.len(), faces.len());

    let mut surface = Surface::new(vertices, faces)?;
    surface.comments = ply.header.comments.clone();
    if !colors.is_empty() && colors.len() == surface.vertex_count() {
        surface.colors = Some(colors);
    }
    Ok(surface)
}

pub fn write_ply(path: &Path, surface: &Surface) -> IoResult<()> {
    let file = File::create(path).map_err(|e| IoError::file(path, e))?;
    let mut writer = BufWriter::new(file);
    write_ply_to(&mut writer, surface)?;
    writer.flush().map_err(|e| IoError::file(path, e))
}

pub fn write_ply_to<W: Write>(writer: &mut W, surface: &Surface) -> IoResult<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header.comments = surface.comments.clone();

    let colors = surface
        .colors
        .as_deref()
        .filter(|c| c.len() == surface.vertex_count());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    if colors.is_some() {
        for name in ["red", "green", "blue"] {
            vertex_def.properties.add(PropertyDef::new(
                name.to_string(),
                PropertyType::Scalar(ScalarType::UChar),
            ));
        }
    }
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    ply.header.elements.add(face_def);

    let mut vertex_payload = Vec::with_capacity(surface.vertex_count());
    for (v, p) in surface.positions().iter().enumerate() {
        let mut element = DefaultElement::new();
        element.insert("x".to_string(), Property::Double(p.x as f64));
        element.insert("y".to_string(), Property::Double(p.y as f64));
        element.insert("z".to_string(), Property::Double(p.z as f64));
        if let Some(colors) = colors {
            let c = colors[v];
            element.insert("red".to_string(), Property::UChar(to_byte(c.r)));
            element.insert("green".to_string(), Property::UChar(to_byte(c.g)));
            element.insert("blue".to_string(), Property::UChar(to_byte(c.b)));
        }
        vertex_payload.push(element);
    }
    ply.payload.insert("vertex".to_string(), vertex_payload);

    let mut face_payload = Vec::with_capacity(surface.face_count());
    for face in surface.faces() {
        let mut element = DefaultElement::new();
        element.insert(
            "vertex_indices".to_string(),
            Property::ListInt(face.iter().map(|&i| i as i32).collect()),
        );
        face_payload.push(element);
    }
    ply.payload.insert("face".to_string(), face_payload);

    // Header counts must match the payload
    ply.make_consistent()
        .map_err(|e| IoError::Ply(format!("consistency error: {e:?}")))?;

    Writer::new().write_ply(writer, &mut ply)?;
    Ok(())
}

fn float_property(element: &DefaultElement, name: &str, path: &Path) -> IoResult<Real> {
    let value = match element.get(name) {
        Some(Property::Float(v)) => *v as Real,
        Some(Property::Double(v)) => *v as Real,
        Some(Property::Int(v)) => *v as Real,
        Some(Property::UInt(v)) => *v as Real,
        Some(Property::Short(v)) => *v as Real,
        Some(Property::UShort(v)) => *v as Real,
        Some(Property::Char(v)) => *v as Real,
        Some(Property::UChar(v)) => *v as Real,
        _ => {
            return Err(IoError::malformed(
                path,
                format!("missing or invalid vertex property {name}"),
            ));
        },
    };
    Ok(value)
}

/// Color channel as a fraction of full intensity
fn color_channel(prop: Option<&Property>) -> Option<Real> {
    match prop {
        Some(Property::UChar(v)) => Some(*v as Real / 255.0),
        Some(Property::UShort(v)) => Some((*v).min(255) as Real / 255.0),
        Some(Property::Int(v)) => Some((*v).clamp(0, 255) as Real / 255.0),
        Some(Property::UInt(v)) => Some((*v).min(255) as Real / 255.0),
        Some(Property::Float(v)) => Some((*v as Real).clamp(0.0, 1.0)),
        Some(Property::Double(v)) => Some((*v as Real).clamp(0.0, 1.0)),
        _ => None,
    }
}

fn index_list(prop: &Property) -> Option<Vec<usize>> {
    match prop {
        Property::ListInt(ids) => ids.iter().map(|&i| usize::try_from(i).ok()).collect(),
        Property::ListUInt(ids) => Some(ids.iter().map(|&i| i as usize).collect()),
        Property::ListUChar(ids) => Some(ids.iter().map(|&i| i as usize).collect()),
        Property::ListUShort(ids) => Some(ids.iter().map(|&i| i as usize).collect()),
        Property::ListShort(ids) => ids.iter().map(|&i| usize::try_from(i).ok()).collect(),
        _ => None,
    }
}

fn to_byte(channel: Real) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_then_read_keeps_positions_comments_and_colors() {
        let mut s = Surface::icosphere(5.0, 1);
        s.add_comment("pial surface");
        s.paint(Rgb::RED);

        let mut bytes = Vec::new();
        write_ply_to(&mut bytes, &s).unwrap();
        let back = read_ply_from(&mut Cursor::new(bytes), Path::new("mem.ply")).unwrap();

        assert_eq!(back.positions(), s.positions());
        assert_eq!(back.faces(), s.faces());
        assert_eq!(back.comments, vec!["pial surface".to_string()]);
        let colors = back.colors.unwrap();
        assert!((colors[0].r - 1.0).abs() < 1e-12);
        assert!((colors[0].g - 0.2).abs() < 1e-12);
    }

    #[test]
    fn uncolored_surface_reads_back_without_colors() {
        let s = Surface::grid_plane(3, 1.0);
        let mut bytes = Vec::new();
        write_ply_to(&mut bytes, &s).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(!text.contains("red"));
        let back = read_ply_from(&mut Cursor::new(bytes), Path::new("mem.ply")).unwrap();
        assert!(back.colors.is_none());
        assert_eq!(back.face_count(), 8);
    }

    #[test]
    fn face_with_bad_index_is_rejected() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 9\n";
        let err = read_ply_from(&mut Cursor::new(text), Path::new("bad.ply")).unwrap_err();
        assert!(matches!(err, IoError::InvalidSurface(_)));
    }
}

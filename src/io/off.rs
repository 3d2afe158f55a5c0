//! Object File Format (`OFF` / `COFF`)
//!
//! ```text
//! COFF
//! # free-text comment
//! <vertices> <faces> <edges>
//! x y z [r g b a]
//! 3 i j k
//! ```
//!
//! Colors are written as floats in `[0, 1]`; integer colors in `[0, 255]`
//! are accepted on input. Polygons with more than three corners are split
//! into a triangle fan.

use super::{IoError, IoResult};
use crate::float_types::Real;
use crate::surface::{Rgb, Surface};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Largest up-front reservation taken from a header count
const MAX_RESERVE: usize = 1 << 20;

pub fn read_off(path: &Path) -> IoResult<Surface> {
    let file = File::open(path).map_err(|e| IoError::file(path, e))?;
    read_off_from(BufReader::new(file), path)
}

pub fn write_off(path: &Path, surface: &Surface) -> IoResult<()> {
    let file = File::create(path).map_err(|e| IoError::file(path, e))?;
    let mut writer = BufWriter::new(file);
    write_off_to(&mut writer, surface).map_err(|e| IoError::file(path, e))?;
    writer.flush().map_err(|e| IoError::file(path, e))
}

/// Line cursor that hands out non-empty, non-comment lines as token lists
/// and collects `#` comments on the way.
struct Lines<'p, R> {
    inner: std::iter::Enumerate<std::io::Lines<R>>,
    path: &'p Path,
    line: usize,
    comments: Vec<String>,
}

impl<'p, R: BufRead> Lines<'p, R> {
    fn next_tokens(&mut self) -> IoResult<Option<Vec<String>>> {
        for (idx, line) in self.inner.by_ref() {
            let line = line.map_err(|e| IoError::file(self.path, e))?;
            self.line = idx + 1;
            let trimmed = line.trim();
            if let Some(comment) = trimmed.strip_prefix('#') {
                self.comments.push(comment.trim().to_string());
                continue;
            }
            // Trailing comments after data
            let data = trimmed.split('#').next().unwrap_or_default();
            if data.trim().is_empty() {
                continue;
            }
            return Ok(Some(data.split_whitespace().map(str::to_string).collect()));
        }
        Ok(None)
    }

    fn expect_tokens(&mut self, what: &str) -> IoResult<Vec<String>> {
        self.next_tokens()?.ok_or_else(|| {
            IoError::malformed(self.path, format!("unexpected end of file, expected {what}"))
        })
    }

    fn number<T: std::str::FromStr>(&self, token: &str) -> IoResult<T> {
        token.parse().map_err(|_| IoError::ParseNumber {
            path: self.path.to_path_buf(),
            line: self.line,
            token: token.to_string(),
        })
    }
}

pub fn read_off_from<R: BufRead>(reader: R, path: &Path) -> IoResult<Surface> {
    let mut lines = Lines {
        inner: reader.lines().enumerate(),
        path,
        line: 0,
        comments: Vec::new(),
    };

    let mut header = lines.expect_tokens("OFF header")?;
    let keyword = header.remove(0);
    let has_color = match keyword.as_str() {
        "OFF" => false,
        "COFF" => true,
        other => {
            return Err(IoError::malformed(path, format!("unknown header keyword {other:?}")));
        },
    };

    // Counts may share the header line
    let counts = if header.is_empty() {
        lines.expect_tokens("vertex and face counts")?
    } else {
        header
    };
    if counts.len() < 2 {
        return Err(IoError::malformed(path, "missing vertex or face count"));
    }
    let n_vertices: usize = lines.number(&counts[0])?;
    let n_faces: usize = lines.number(&counts[1])?;

    // Header counts are untrusted: reserve a bounded amount and let the data grow it
    let mut vertices = Vec::with_capacity(n_vertices.min(MAX_RESERVE));
    let mut raw_colors: Vec<[Real; 3]> =
        Vec::with_capacity(if has_color { n_vertices.min(MAX_RESERVE) } else { 0 });
    for _ in 0..n_vertices {
        let tokens = lines.expect_tokens("a vertex")?;
        let needed = if has_color { 6 } else { 3 };
        if tokens.len() < needed {
            return Err(IoError::malformed(
                path,
                format!("line {}: expected {needed} values, found {}", lines.line, tokens.len()),
            ));
        }
        vertices.push(Point3::new(
            lines.number(&tokens[0])?,
            lines.number(&tokens[1])?,
            lines.number(&tokens[2])?,
        ));
        if has_color {
            raw_colors.push([
                lines.number(&tokens[3])?,
                lines.number(&tokens[4])?,
                lines.number(&tokens[5])?,
            ]);
        }
    }

    let mut faces = Vec::with_capacity(n_faces.min(MAX_RESERVE));
    for _ in 0..n_faces {
        let tokens = lines.expect_tokens("a face")?;
        let corners: usize = lines.number(&tokens[0])?;
        if corners < 3 || tokens.len() < corners + 1 {
            return Err(IoError::malformed(
                path,
                format!("line {}: face needs at least 3 vertex ids", lines.line),
            ));
        }
        let ids = tokens[1..=corners]
            .iter()
            .map(|t| lines.number::<usize>(t))
            .collect::<IoResult<Vec<_>>>()?;
        for i in 1..corners - 1 {
            faces.push([ids[0], ids[i], ids[i + 1]]);
        }
    }

    let mut surface = Surface::new(vertices, faces)?;
    surface.comments = lines.comments;
    if has_color {
        // Integer colors use the 0-255 range
        let range: Real = if raw_colors.iter().flatten().any(|&c| c > 1.0) {
            255.0
        } else {
            1.0
        };
        surface.colors = Some(
            raw_colors
                .into_iter()
                .map(|[r, g, b]| Rgb::new(r / range, g / range, b / range))
                .collect(),
        );
    }
    Ok(surface)
}

pub fn write_off_to<W: Write>(writer: &mut W, surface: &Surface) -> std::io::Result<()> {
    let colors = surface
        .colors
        .as_deref()
        .filter(|c| c.len() == surface.vertex_count());

    writeln!(writer, "{}", if colors.is_some() { "COFF" } else { "OFF" })?;
    for comment in &surface.comments {
        for line in comment.lines() {
            writeln!(writer, "# {line}")?;
        }
    }
    writeln!(writer, "{} {} {}", surface.vertex_count(), surface.face_count(), surface.edge_count())?;

    for (v, p) in surface.positions().iter().enumerate() {
        match colors {
            Some(colors) => {
                let c = colors[v];
                writeln!(writer, "{} {} {} {} {} {} 1", p.x, p.y, p.z, c.r, c.g, c.b)?
            },
            None => writeln!(writer, "{} {} {}", p.x, p.y, p.z)?,
        }
    }
    for [a, b, c] in surface.faces() {
        writeln!(writer, "3 {a} {b} {c}")?;
    }
    Ok(())
}

//! Nastran bulk data export.
//!
//! Grid points are written as large-field `GRID*` records and elements as
//! small-field `CQUAD4` records with property id 1. Node and element ids are
//! 1-based. A quad with a collapsed corner is written as `CTRIA3`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{MeshError, Result};

/// Property id referenced by every element.
pub const PROPERTY_ID: usize = 1;

/// Real number in a 16-character large field, e.g. `-1.23456789E-03`.
fn large_real(x: f64) -> String {
    let s = format!("{:.8E}", x);
    match s.split_once('E') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(e) => format!("{}E{:+03}", mantissa, e),
            Err(_) => s,
        },
        None => s,
    }
}

/// The distinct corners of a quad in order, dropping repeats.
fn distinct_corners(q: &[usize; 4]) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(4);
    for &v in q {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Write grid points and quads as bulk data.
pub fn write<W: Write>(writer: &mut W, points: &[Point3<f64>], quads: &[[usize; 4]]) -> Result<()> {
    writeln!(writer, "$ brepmesh bulk data: {} grids, {} elements", points.len(), quads.len())?;
    writeln!(writer, "BEGIN BULK")?;
    for (i, p) in points.iter().enumerate() {
        writeln!(
            writer,
            "{:<8}{:>16}{:>16}{:>16}{:>16}{:<8}",
            "GRID*",
            i + 1,
            "",
            large_real(p.x),
            large_real(p.y),
            "*"
        )?;
        writeln!(writer, "{:<8}{:>16}", "*", large_real(p.z))?;
    }
    for (e, q) in quads.iter().enumerate() {
        if let Some(&v) = q.iter().find(|&&v| v >= points.len()) {
            return Err(MeshError::InvalidState(format!(
                "element {} references missing node {}",
                e, v
            )));
        }
        let corners = distinct_corners(q);
        let keyword = match corners.len() {
            4 => "CQUAD4",
            3 => "CTRIA3",
            _ => {
                return Err(MeshError::DegenerateElement {
                    element: e,
                    volume: 0.0,
                })
            }
        };
        write!(writer, "{:<8}{:>8}{:>8}", keyword, e + 1, PROPERTY_ID)?;
        for v in corners {
            write!(writer, "{:>8}", v + 1)?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "ENDDATA")?;
    Ok(())
}

/// Write grid points and quads to a bulk data file.
pub fn save<P: AsRef<Path>>(path: P, points: &[Point3<f64>], quads: &[[usize; 4]]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer, points, quads).map_err(|e| match e {
        MeshError::Io(io) => MeshError::SaveError {
            path: path.to_path_buf(),
            message: io.to_string(),
        },
        other => other,
    })?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_real_fits_field() {
        assert_eq!(large_real(1.0), "1.00000000E+00");
        assert_eq!(large_real(-0.00123456789), "-1.23456789E-03");
        assert!(large_real(-1.0e-200).len() <= 16);
    }

    #[test]
    fn test_records() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.5),
        ];
        let mut buf = Vec::new();
        write(&mut buf, &points, &[[0, 1, 2, 3], [0, 1, 2, 2]]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "BEGIN BULK");
        assert!(lines[2].starts_with("GRID*   "));
        assert_eq!(&lines[2][8..24], "               1");
        assert_eq!(lines[2].len(), 80);
        assert_eq!(lines[9], format!("*{}5.00000000E-01", " ".repeat(9)));
        let field = |v: usize| format!("{:>8}", v);
        let quad: String = [1, 1, 1, 2, 3, 4].iter().map(|&v| field(v)).collect();
        assert_eq!(lines[10], format!("CQUAD4  {}", quad));
        let tri: String = [2, 1, 1, 2, 3].iter().map(|&v| field(v)).collect();
        assert_eq!(lines[11], format!("CTRIA3  {}", tri));
        assert_eq!(*lines.last().unwrap(), "ENDDATA");
    }

    #[test]
    fn test_missing_node_rejected() {
        let points = vec![Point3::origin(); 3];
        let mut buf = Vec::new();
        assert!(write(&mut buf, &points, &[[0, 1, 2, 3]]).is_err());
    }
}

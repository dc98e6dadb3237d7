//! Legacy VTK (ASCII unstructured grid) support.
//!
//! Used for the final assembled mesh and for the per-stage diagnostic
//! dumps. Points and cells are written in storage order so a dump can be
//! compared index for index with the in-memory arrays. [`UnstructuredGrid::read`]
//! parses the files this module writes.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{MeshError, Result};

/// VTK cell type codes used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellKind {
    /// Two-node line (dual graph edges, boundary segments).
    Line = 3,
    /// Three-node triangle.
    Triangle = 5,
    /// Four-node quad.
    Quad = 9,
    /// Eight-node hexahedron.
    Hexahedron = 12,
}

impl CellKind {
    /// Node count of the cell type.
    pub fn num_nodes(self) -> usize {
        match self {
            CellKind::Line => 2,
            CellKind::Triangle => 3,
            CellKind::Quad => 4,
            CellKind::Hexahedron => 8,
        }
    }

    /// Cell type from its VTK code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(CellKind::Line),
            5 => Some(CellKind::Triangle),
            9 => Some(CellKind::Quad),
            12 => Some(CellKind::Hexahedron),
            _ => None,
        }
    }
}

/// An unstructured grid: points, mixed cells and an optional per-cell
/// quality scalar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnstructuredGrid {
    /// Title line.
    pub title: String,
    /// Point coordinates.
    pub points: Vec<Point3<f64>>,
    /// Cells with their node indices.
    pub cells: Vec<(CellKind, Vec<usize>)>,
    /// Optional `quality` cell data, one value per cell.
    pub quality: Option<Vec<f64>>,
}

impl UnstructuredGrid {
    /// Create an empty grid.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the points.
    pub fn with_points(mut self, points: Vec<Point3<f64>>) -> Self {
        self.points = points;
        self
    }

    /// Append cells of one kind.
    pub fn with_cells<const N: usize>(mut self, kind: CellKind, cells: &[[usize; N]]) -> Self {
        self.cells
            .extend(cells.iter().map(|c| (kind, c.to_vec())));
        self
    }

    /// Attach per-cell quality values.
    pub fn with_quality(mut self, quality: Vec<f64>) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells of one kind.
    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|(k, _)| *k == kind).count()
    }

    /// Write the grid in legacy ASCII format.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let title = if self.title.is_empty() {
            "brepmesh"
        } else {
            self.title.lines().next().unwrap_or("brepmesh")
        };
        writeln!(writer, "# vtk DataFile Version 3.0")?;
        writeln!(writer, "{}", title)?;
        writeln!(writer, "ASCII")?;
        writeln!(writer, "DATASET UNSTRUCTURED_GRID")?;

        writeln!(writer, "POINTS {} double", self.points.len())?;
        for p in &self.points {
            writeln!(writer, "{:.16e} {:.16e} {:.16e}", p.x, p.y, p.z)?;
        }

        let size: usize = self.cells.iter().map(|(_, c)| c.len() + 1).sum();
        writeln!(writer, "CELLS {} {}", self.cells.len(), size)?;
        for (_, cell) in &self.cells {
            write!(writer, "{}", cell.len())?;
            for v in cell {
                write!(writer, " {}", v)?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "CELL_TYPES {}", self.cells.len())?;
        for (kind, _) in &self.cells {
            writeln!(writer, "{}", *kind as u8)?;
        }

        if let Some(quality) = &self.quality {
            writeln!(writer, "CELL_DATA {}", quality.len())?;
            writeln!(writer, "SCALARS quality double 1")?;
            writeln!(writer, "LOOKUP_TABLE default")?;
            for q in quality {
                writeln!(writer, "{:.16e}", q)?;
            }
        }
        Ok(())
    }

    /// Write the grid to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer).map_err(|e| MeshError::SaveError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        writer.flush()?;
        Ok(())
    }

    /// Parse a legacy ASCII unstructured grid.
    pub fn read<R: BufRead>(reader: R) -> std::result::Result<Self, String> {
        let mut lines = reader.lines();
        let mut next_line = move || -> std::result::Result<Option<String>, String> {
            lines.next().transpose().map_err(|e| e.to_string())
        };

        let header = next_line()?.ok_or("empty file")?;
        if !header.starts_with("# vtk DataFile") {
            return Err(format!("not a legacy VTK file: {:?}", header));
        }
        let title = next_line()?.ok_or("missing title")?;
        let format = next_line()?.ok_or("missing format line")?;
        if format.trim() != "ASCII" {
            return Err(format!("unsupported encoding {:?}", format.trim()));
        }

        let mut grid = UnstructuredGrid::new(title);
        let mut tokens: Vec<String> = Vec::new();
        while let Some(line) = next_line()? {
            tokens.extend(line.split_whitespace().map(str::to_string));
        }
        let mut it = tokens.into_iter();
        let mut cell_sizes: Vec<Vec<usize>> = Vec::new();
        while let Some(tok) = it.next() {
            match tok.as_str() {
                "DATASET" => {
                    let kind = it.next().unwrap_or_default();
                    if kind != "UNSTRUCTURED_GRID" {
                        return Err(format!("unsupported dataset {:?}", kind));
                    }
                }
                "POINTS" => {
                    let n = expect_usize(&mut it, "point count")?;
                    it.next();
                    grid.points.reserve(n);
                    for _ in 0..n {
                        let mut xyz = [0.0; 3];
                        for c in xyz.iter_mut() {
                            *c = it
                                .next()
                                .ok_or("truncated POINTS block")?
                                .parse::<f64>()
                                .map_err(|e| format!("bad coordinate: {}", e))?;
                        }
                        grid.points.push(Point3::new(xyz[0], xyz[1], xyz[2]));
                    }
                }
                "CELLS" => {
                    let n = expect_usize(&mut it, "cell count")?;
                    expect_usize(&mut it, "cell list size")?;
                    for _ in 0..n {
                        let len = expect_usize(&mut it, "cell size")?;
                        let mut cell = Vec::with_capacity(len);
                        for _ in 0..len {
                            cell.push(expect_usize(&mut it, "cell index")?);
                        }
                        cell_sizes.push(cell);
                    }
                }
                "CELL_TYPES" => {
                    let n = expect_usize(&mut it, "cell type count")?;
                    if n != cell_sizes.len() {
                        return Err(format!("{} cell types for {} cells", n, cell_sizes.len()));
                    }
                    for cell in cell_sizes.drain(..) {
                        let code = expect_usize(&mut it, "cell type")?;
                        let kind = u8::try_from(code)
                            .ok()
                            .and_then(CellKind::from_code)
                            .ok_or(format!("unsupported cell type {}", code))?;
                        if cell.len() != kind.num_nodes() {
                            return Err(format!("{:?} cell with {} nodes", kind, cell.len()));
                        }
                        grid.cells.push((kind, cell));
                    }
                }
                "CELL_DATA" => {
                    let n = expect_usize(&mut it, "cell data count")?;
                    // SCALARS quality double 1 / LOOKUP_TABLE default
                    for _ in 0..6 {
                        it.next();
                    }
                    let mut values = Vec::with_capacity(n);
                    for _ in 0..n {
                        values.push(
                            it.next()
                                .ok_or("truncated CELL_DATA block")?
                                .parse::<f64>()
                                .map_err(|e| format!("bad scalar: {}", e))?,
                        );
                    }
                    grid.quality = Some(values);
                }
                other => return Err(format!("unexpected token {:?}", other)),
            }
        }
        if grid.cells.iter().flat_map(|(_, c)| c).any(|&v| v >= grid.points.len()) {
            return Err("cell references a missing point".to_string());
        }
        Ok(grid)
    }

    /// Read a grid from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::read(BufReader::new(file)).map_err(|message| MeshError::LoadError {
            path: path.to_path_buf(),
            message,
        })
    }
}

fn expect_usize<I: Iterator<Item = String>>(
    it: &mut I,
    what: &str,
) -> std::result::Result<usize, String> {
    it.next()
        .ok_or_else(|| format!("missing {}", what))?
        .parse::<usize>()
        .map_err(|e| format!("bad {}: {}", what, e))
}

//! Ready-made models used by the CLI, tests and benchmarks.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Point2, Point3, Vector3};

use super::{
    CircularArc, CylinderPatch, EdgeId, EdgeUse, FaceId, LineSegment, Model, Plane, VertexId,
};
use crate::error::Result;

fn line(model: &mut Model, a: VertexId, b: VertexId) -> Result<EdgeId> {
    let (pa, pb) = (model.vertex(a).point(), model.vertex(b).point());
    model.add_edge(LineSegment::new(pa, pb), a, b)
}

/// Axis-aligned `width x height` rectangle in the plane `z = 0`.
pub fn rectangle(width: f64, height: f64) -> Result<Model> {
    let mut model = Model::new();
    let corners = [(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)];
    let v: Vec<VertexId> = corners
        .iter()
        .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
        .collect();
    let mut uses = Vec::with_capacity(4);
    for k in 0..4 {
        uses.push(EdgeUse::fwd(line(&mut model, v[k], v[(k + 1) % 4])?));
    }
    model.add_face(
        Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(width, height)),
        vec![uses],
    )?;
    Ok(model)
}

/// L-shaped planar bracket: a `2s x 2s` square with the upper-right
/// `s x s` quarter removed.
pub fn l_bracket(s: f64) -> Result<Model> {
    let mut model = Model::new();
    let corners = [
        (0.0, 0.0),
        (2.0 * s, 0.0),
        (2.0 * s, s),
        (s, s),
        (s, 2.0 * s),
        (0.0, 2.0 * s),
    ];
    let v: Vec<VertexId> = corners
        .iter()
        .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
        .collect();
    let mut uses = Vec::with_capacity(v.len());
    for k in 0..v.len() {
        uses.push(EdgeUse::fwd(line(&mut model, v[k], v[(k + 1) % v.len()])?));
    }
    model.add_face(
        Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(2.0 * s, 2.0 * s)),
        vec![uses],
    )?;
    Ok(model)
}

/// `width x height` plate in `z = 0` with a centred circular hole.
pub fn plate_with_hole(width: f64, height: f64, radius: f64) -> Result<Model> {
    let mut model = Model::new();
    let layer = Layer::new(&mut model, width, height, Some(radius), 0.0)?;
    layer.add_face(&mut model, width, height)?;
    Ok(model)
}

/// Axis-aligned box `[0,dx] x [0,dy] x [0,dz]`, swept from `z = 0` to `z = dz`.
pub fn block(dx: f64, dy: f64, dz: f64) -> Result<Model> {
    prism(dx, dy, None, dz)
}

/// Plate with a centred hole extruded to `depth`: a swept volume with two
/// face loops.
pub fn holed_block(width: f64, height: f64, radius: f64, depth: f64) -> Result<Model> {
    prism(width, height, Some(radius), depth)
}

struct Layer {
    outer: [VertexId; 4],
    outer_edges: [EdgeId; 4],
    hole: Option<([VertexId; 4], [EdgeId; 4])>,
    z: f64,
}

impl Layer {
    fn new(model: &mut Model, w: f64, h: f64, radius: Option<f64>, z: f64) -> Result<Self> {
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let outer = corners.map(|(x, y)| model.add_vertex(Point3::new(x, y, z)));
        let mut outer_edges = [EdgeId::invalid(); 4];
        for k in 0..4 {
            outer_edges[k] = line(model, outer[k], outer[(k + 1) % 4])?;
        }

        let hole = match radius {
            Some(r) => {
                let center = Point3::new(0.5 * w, 0.5 * h, z);
                let verts = [0usize, 1, 2, 3].map(|k| {
                    let a = k as f64 * FRAC_PI_2;
                    model.add_vertex(center + Vector3::new(r * a.cos(), r * a.sin(), 0.0))
                });
                let mut arcs = [EdgeId::invalid(); 4];
                for k in 0..4 {
                    let a0 = k as f64 * FRAC_PI_2;
                    let arc = CircularArc::xy(center, r, a0, a0 + FRAC_PI_2);
                    arcs[k] = model.add_edge(arc, verts[k], verts[(k + 1) % 4])?;
                }
                Some((verts, arcs))
            }
            None => None,
        };

        Ok(Self {
            outer,
            outer_edges,
            hole,
            z,
        })
    }

    fn add_face(&self, model: &mut Model, w: f64, h: f64) -> Result<FaceId> {
        let mut loops = vec![self.outer_edges.iter().map(|&e| EdgeUse::fwd(e)).collect()];
        if let Some((_, arcs)) = &self.hole {
            // hole loops run clockwise
            loops.push(arcs.iter().rev().map(|&e| EdgeUse::rev(e)).collect());
        }
        model.add_face(
            Plane::xy(self.z, Point2::new(0.0, 0.0), Point2::new(w, h)),
            loops,
        )
    }
}

fn prism(w: f64, h: f64, radius: Option<f64>, depth: f64) -> Result<Model> {
    let mut model = Model::new();
    let bottom_layer = Layer::new(&mut model, w, h, radius, 0.0)?;
    let top_layer = Layer::new(&mut model, w, h, radius, depth)?;
    let bottom = bottom_layer.add_face(&mut model, w, h)?;
    let top = top_layer.add_face(&mut model, w, h)?;
    let mut faces = vec![bottom, top];

    let mut verticals = [EdgeId::invalid(); 4];
    for k in 0..4 {
        verticals[k] = line(&mut model, bottom_layer.outer[k], top_layer.outer[k])?;
    }
    for k in 0..4 {
        let next = (k + 1) % 4;
        let a = model.vertex(bottom_layer.outer[k]).point();
        let b = model.vertex(bottom_layer.outer[next]).point();
        let len = (b - a).norm();
        let plane = Plane::new(
            a,
            (b - a) / len,
            Vector3::z(),
            Point2::new(0.0, 0.0),
            Point2::new(len, depth),
        );
        faces.push(model.add_face(
            plane,
            vec![vec![
                EdgeUse::fwd(bottom_layer.outer_edges[k]),
                EdgeUse::fwd(verticals[next]),
                EdgeUse::rev(top_layer.outer_edges[k]),
                EdgeUse::rev(verticals[k]),
            ]],
        )?);
    }

    if let (Some(r), Some((bv, barcs)), Some((tv, tarcs))) =
        (radius, bottom_layer.hole, top_layer.hole)
    {
        let center = Point3::new(0.5 * w, 0.5 * h, 0.0);
        let mut hole_verticals = [EdgeId::invalid(); 4];
        for k in 0..4 {
            hole_verticals[k] = line(&mut model, bv[k], tv[k])?;
        }
        for k in 0..4 {
            let a0 = k as f64 * FRAC_PI_2;
            let patch = CylinderPatch::new(
                center,
                Vector3::z(),
                Vector3::x(),
                r,
                Point2::new(a0, 0.0),
                Point2::new(a0 + FRAC_PI_2, depth),
            );
            faces.push(model.add_face(
                patch,
                vec![vec![
                    EdgeUse::fwd(barcs[k]),
                    EdgeUse::fwd(hole_verticals[(k + 1) % 4]),
                    EdgeUse::rev(tarcs[k]),
                    EdgeUse::rev(hole_verticals[k]),
                ]],
            )?);
        }
    }

    model.add_volume(faces, Some((bottom, top)))?;
    Ok(model)
}

//! Geometry factory - boxes, trail arcs, and reference geometry
//!
//! Everything here is pure: inputs are plain positions and colors, outputs
//! are value types or freshly built meshes/materials. Nothing touches the
//! ECS world.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::alpha::AlphaMode;
use bevy::render::render_resource::PrimitiveTopology;

/// Color used when an entity carries none
pub const DEFAULT_ENTITY_COLOR: Color = Color::srgb(0.0, 1.0, 0.0);

/// Trails are always drawn at this opacity with additive blending
pub const TRAIL_OPACITY: f32 = 0.5;

/// Polyline samples per history segment
pub const TRAIL_SAMPLES_PER_SEGMENT: usize = 20;

/// Height of the raised midpoint, as a fraction of the segment length
pub const TRAIL_ARC_LIFT: f32 = 0.2;

/// Extent of each reference half-grid
pub const GRID_SIZE: f32 = 1000.0;
pub const GRID_DIVISIONS: u32 = 100;
pub const GRID_COLOR: Color = Color::srgb(0.267, 0.267, 0.267);

/// Length of each world axis indicator
pub const AXIS_LENGTH: f32 = 100.0;

/// Heading arrows drawn on agents
pub const ARROW_LENGTH: f32 = 10.0;
pub const ARROW_COLOR: Color = Color::WHITE;

/// Arrow head length as a fraction of the arrow, and head width as a fraction of the head
const ARROW_HEAD_LENGTH: f32 = 0.2;
const ARROW_HEAD_WIDTH: f32 = 0.2;

/// A box ready to be spawned: unit cube scaled by size
#[derive(Debug, Clone, PartialEq)]
pub struct EntityVisual {
    pub transform: Transform,
    pub color: Color,
}

impl EntityVisual {
    pub fn size(&self) -> f32 {
        self.transform.scale.x
    }

    pub fn material(&self) -> StandardMaterial {
        StandardMaterial {
            base_color: self.color,
            unlit: true,
            ..default()
        }
    }
}

/// A smoothed trail polyline and its shading
#[derive(Debug, Clone, PartialEq)]
pub struct TrailVisual {
    pub points: Vec<Vec3>,
    pub color: Color,
    pub opacity: f32,
}

impl TrailVisual {
    pub fn mesh(&self) -> Mesh {
        let positions: Vec<[f32; 3]> = self.points.iter().map(|p| p.to_array()).collect();
        Mesh::new(PrimitiveTopology::LineStrip, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    }

    pub fn material(&self) -> StandardMaterial {
        StandardMaterial {
            base_color: self.color.with_alpha(self.opacity),
            unlit: true,
            alpha_mode: AlphaMode::Add,
            ..default()
        }
    }
}

/// Heading indicator anchored at an entity
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowVisual {
    pub origin: Vec3,
    /// Unit vector
    pub direction: Vec3,
    pub length: f32,
    pub color: Color,
}

impl ArrowVisual {
    pub fn tip(&self) -> Vec3 {
        self.origin + self.direction * self.length
    }

    /// Shaft plus four barbs, as a line list
    pub fn mesh(&self) -> Mesh {
        let tip = self.tip();
        let head = self.length * ARROW_HEAD_LENGTH;
        let base = tip - self.direction * head;
        let spread = head * ARROW_HEAD_WIDTH * 0.5;
        let (a, b) = self.direction.any_orthonormal_pair();

        let mut positions = vec![self.origin.to_array(), tip.to_array()];
        for side in [a, -a, b, -b] {
            positions.push(tip.to_array());
            positions.push((base + side * spread).to_array());
        }
        Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    }

    pub fn material(&self) -> StandardMaterial {
        line_material(self.color)
    }
}

/// Unit cube scaled by `size` at `position`, green unless a color is given
pub fn entity_mesh(position: Vec3, size: f32, color: Option<Color>) -> EntityVisual {
    EntityVisual {
        transform: Transform::from_translation(position).with_scale(Vec3::splat(size)),
        color: color.unwrap_or(DEFAULT_ENTITY_COLOR),
    }
}

/// Smoothed arc through `history`, or `None` when fewer than two points are given.
///
/// One raised midpoint is inserted between every consecutive pair, a
/// Catmull-Rom spline is run through the result, and the spline is sampled
/// `TRAIL_SAMPLES_PER_SEGMENT` times per history segment. The first and
/// last samples coincide with the first and last history points.
pub fn trail_points(history: &[Vec3]) -> Option<Vec<Vec3>> {
    if history.len() < 2 {
        return None;
    }

    let mut controls = Vec::with_capacity(history.len() * 2 - 1);
    for pair in history.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        controls.push(a);
        controls.push(raised_midpoint(a, b));
    }
    controls.push(history[history.len() - 1]);

    let spans = controls.len() - 1;
    let samples = (history.len() - 1) * TRAIL_SAMPLES_PER_SEGMENT;
    let mut points = Vec::with_capacity(samples + 1);
    for k in 0..=samples {
        let u = k as f32 * spans as f32 / samples as f32;
        let span = (u.floor() as usize).min(spans - 1);
        let t = u - span as f32;
        points.push(catmull_rom_span(&controls, span, t));
    }
    Some(points)
}

/// Trail line for a history, shaded with the owner's color
pub fn trail_line(history: &[Vec3], color: Color) -> Option<TrailVisual> {
    trail_points(history).map(|points| TrailVisual {
        points,
        color,
        opacity: TRAIL_OPACITY,
    })
}

/// Arrow at `position` pointing from the first history point toward the second.
/// `None` with fewer than two points or when those two coincide.
pub fn direction_arrow(history: &[Vec3], position: Vec3) -> Option<ArrowVisual> {
    let [first, second, ..] = history else {
        return None;
    };
    let direction = (*second - *first).try_normalize()?;
    Some(ArrowVisual {
        origin: position,
        direction,
        length: ARROW_LENGTH,
        color: ARROW_COLOR,
    })
}

fn raised_midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5 + Vec3::Y * (a.distance(b) * TRAIL_ARC_LIFT)
}

/// Uniform Catmull-Rom between `controls[span]` and `controls[span + 1]`.
/// Missing neighbours at the ends are mirrored.
fn catmull_rom_span(controls: &[Vec3], span: usize, t: f32) -> Vec3 {
    let p1 = controls[span];
    let p2 = controls[span + 1];
    let p0 = if span == 0 { p1 * 2.0 - p2 } else { controls[span - 1] };
    let p3 = controls.get(span + 2).copied().unwrap_or(p2 * 2.0 - p1);

    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (p1 * 2.0
        + (p2 - p0) * t
        + (p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3) * t2
        + (p1 * 3.0 - p0 - p2 * 3.0 + p3) * t3)
}

/// Plane a reference half-grid lies in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridPlane {
    XY,
    XZ,
    YZ,
}

impl GridPlane {
    pub const ALL: [GridPlane; 3] = [GridPlane::XY, GridPlane::XZ, GridPlane::YZ];

    fn axes(&self) -> (Vec3, Vec3) {
        match self {
            GridPlane::XY => (Vec3::X, Vec3::Y),
            GridPlane::XZ => (Vec3::X, Vec3::Z),
            GridPlane::YZ => (Vec3::Z, Vec3::Y),
        }
    }
}

/// Half-grid from the origin out to `size` along both plane axes, as a line list
pub fn grid_plane_mesh(size: f32, divisions: u32, plane: GridPlane) -> Mesh {
    let (u, v) = plane.axes();
    let step = size / divisions.max(1) as f32;
    let mut positions: Vec<[f32; 3]> = Vec::with_capacity((divisions as usize + 1) * 4);

    for i in 0..=divisions {
        let offset = i as f32 * step;
        // Line parallel to u
        positions.push((v * offset).to_array());
        positions.push((v * offset + u * size).to_array());
        // Line parallel to v
        positions.push((u * offset).to_array());
        positions.push((u * offset + v * size).to_array());
    }

    Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
}

/// Single axis line from the origin
pub fn axis_mesh(axis: Vec3, length: f32) -> Mesh {
    let positions = vec![[0.0, 0.0, 0.0], (axis.normalize_or_zero() * length).to_array()];
    Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
}

/// Unlit line material for reference geometry
pub fn line_material(color: Color) -> StandardMaterial {
    StandardMaterial {
        base_color: color,
        unlit: true,
        ..default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(mesh: &Mesh) -> Vec<[f32; 3]> {
        mesh.attribute(Mesh::ATTRIBUTE_POSITION)
            .and_then(|values| values.as_float3())
            .map(|values| values.to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_entity_mesh_scales_unit_cube() {
        let visual = entity_mesh(Vec3::new(1.0, 2.0, 3.0), 4.0, None);
        assert_eq!(visual.transform.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(visual.transform.scale, Vec3::splat(4.0));
        assert_eq!(visual.size(), 4.0);
        assert_eq!(visual.color, DEFAULT_ENTITY_COLOR);

        let red = Color::srgb(1.0, 0.0, 0.0);
        assert_eq!(entity_mesh(Vec3::ZERO, 1.0, Some(red)).color, red);
    }

    #[test]
    fn test_entity_mesh_is_deterministic() {
        let a = entity_mesh(Vec3::new(5.0, 6.0, 7.0), 2.5, None);
        let b = entity_mesh(Vec3::new(5.0, 6.0, 7.0), 2.5, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_trail_requires_two_points() {
        assert!(trail_points(&[]).is_none());
        assert!(trail_points(&[Vec3::ONE]).is_none());
        assert!(trail_line(&[Vec3::ONE], DEFAULT_ENTITY_COLOR).is_none());
    }

    #[test]
    fn test_trail_sample_count_and_endpoints() {
        let history = [
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::new(20.0, 12.0, 5.0),
        ];
        let points = trail_points(&history).unwrap();
        assert_eq!(points.len(), 2 * TRAIL_SAMPLES_PER_SEGMENT + 1);
        assert!(points[0].distance(history[0]) < 1e-4);
        assert!(points[points.len() - 1].distance(history[2]) < 1e-4);
    }

    #[test]
    fn test_trail_arcs_above_straight_segment() {
        let history = [Vec3::new(0.0, 10.0, 0.0), Vec3::new(100.0, 10.0, 0.0)];
        let points = trail_points(&history).unwrap();
        let peak = points.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert!(peak > 10.0 + 100.0 * TRAIL_ARC_LIFT * 0.9, "peak was {}", peak);

        // The middle sample passes through the raised control point
        let middle = points[TRAIL_SAMPLES_PER_SEGMENT / 2];
        assert!((middle.x - 50.0).abs() < 1e-3);
        assert!((middle.y - (10.0 + 100.0 * TRAIL_ARC_LIFT)).abs() < 1e-3);
    }

    #[test]
    fn test_trail_material_is_translucent_and_additive() {
        let trail = trail_line(&[Vec3::ZERO, Vec3::X], Color::srgb(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(trail.opacity, TRAIL_OPACITY);
        let material = trail.material();
        assert_eq!(material.alpha_mode, AlphaMode::Add);
        assert!((material.base_color.alpha() - TRAIL_OPACITY).abs() < 1e-6);

        let mesh = trail.mesh();
        assert_eq!(mesh.primitive_topology(), PrimitiveTopology::LineStrip);
        assert_eq!(positions(&mesh).len(), trail.points.len());
    }

    #[test]
    fn test_direction_arrow_needs_two_points() {
        assert!(direction_arrow(&[], Vec3::ZERO).is_none());
        assert!(direction_arrow(&[Vec3::ONE], Vec3::ZERO).is_none());
    }

    #[test]
    fn test_direction_arrow_skips_zero_heading() {
        let still = [Vec3::new(3.0, 4.0, 5.0), Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO];
        assert!(direction_arrow(&still, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_direction_arrow_uses_first_segment() {
        let history = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(9.0, 0.0, 4.0),
        ];
        let arrow = direction_arrow(&history, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(arrow.direction, Vec3::Z);
        assert_eq!(arrow.color, ARROW_COLOR);
        assert_eq!(arrow.tip(), Vec3::new(1.0, 2.0, 3.0 + ARROW_LENGTH));

        let mesh = arrow.mesh();
        assert_eq!(mesh.primitive_topology(), PrimitiveTopology::LineList);
        let verts = positions(&mesh);
        assert_eq!(verts.len(), 10);
        assert_eq!(verts[0], [1.0, 2.0, 3.0]);
        // Every barb starts at the tip and ends behind it
        for barb in verts[2..].chunks(2) {
            assert_eq!(barb[0], arrow.tip().to_array());
            assert!(barb[1][2] < arrow.tip().z);
        }
    }

    #[test]
    fn test_grid_plane_lies_in_plane() {
        let mesh = grid_plane_mesh(GRID_SIZE, 10, GridPlane::XZ);
        let verts = positions(&mesh);
        assert_eq!(verts.len(), 11 * 4);
        assert!(verts.iter().all(|v| v[1] == 0.0));
        assert!(verts
            .iter()
            .all(|v| (0.0..=GRID_SIZE).contains(&v[0]) && (0.0..=GRID_SIZE).contains(&v[2])));
    }

    #[test]
    fn test_axis_mesh_length() {
        let verts = positions(&axis_mesh(Vec3::Z * 3.0, AXIS_LENGTH));
        assert_eq!(verts, vec![[0.0, 0.0, 0.0], [0.0, 0.0, AXIS_LENGTH]]);
    }
}

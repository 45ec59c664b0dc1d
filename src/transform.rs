use lyon::math::{point, vector, Angle, Point};

/// Affine matrix used for accumulated world transforms.
pub type Matrix = lyon::math::Transform;

/// Position, rotation and scale of a scene node relative to its parent.
///
/// Scale and rotation are applied about `anchor`, then the node is moved by
/// `translation`. The local matrix is rebuilt on every mutation, so reading it
/// during traversal is free.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    translation: (f32, f32),
    rotation: f32,
    scale: (f32, f32),
    anchor: (f32, f32),
    matrix: Matrix,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: (0.0, 0.0),
            rotation: 0.0,
            scale: (1.0, 1.0),
            anchor: (0.0, 0.0),
            matrix: Matrix::identity(),
        }
    }

    pub fn from_translation(x: f32, y: f32) -> Self {
        let mut transform = Self::identity();
        transform.set_translation(x, y);
        transform
    }

    pub fn translation(&self) -> (f32, f32) {
        self.translation
    }

    /// Rotation in radians.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn scale(&self) -> (f32, f32) {
        self.scale
    }

    pub fn anchor(&self) -> (f32, f32) {
        self.anchor
    }

    pub fn set_translation(&mut self, x: f32, y: f32) {
        self.translation = (x, y);
        self.rebuild();
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.translation.0 += dx;
        self.translation.1 += dy;
        self.rebuild();
    }

    pub fn set_rotation(&mut self, radians: f32) {
        self.rotation = radians;
        self.rebuild();
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.scale = (x, y);
        self.rebuild();
    }

    pub fn set_anchor(&mut self, x: f32, y: f32) {
        self.anchor = (x, y);
        self.rebuild();
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.set_rotation(radians);
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.set_scale(x, y);
        self
    }

    pub fn with_anchor(mut self, x: f32, y: f32) -> Self {
        self.set_anchor(x, y);
        self
    }

    /// Local matrix (anchor-relative scale and rotation, then translation).
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// World matrix of a node with this local transform under `parent_world`.
    pub fn compose(&self, parent_world: &Matrix) -> Matrix {
        self.matrix.then(parent_world)
    }

    fn rebuild(&mut self) {
        let (anchor_x, anchor_y) = self.anchor;
        self.matrix = Matrix::translation(-anchor_x, -anchor_y)
            .then_scale(self.scale.0, self.scale.1)
            .then_rotate(Angle::radians(self.rotation))
            .then_translate(vector(
                anchor_x + self.translation.0,
                anchor_y + self.translation.1,
            ));
    }
}

pub(crate) fn apply(matrix: &Matrix, position: [f32; 2]) -> [f32; 2] {
    let transformed: Point = matrix.transform_point(point(position[0], position[1]));
    [transformed.x, transformed.y]
}

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Always normalized
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Ray {
        Ray {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray from `eye` through the point at `ndc` (x and y in -1..1, +y up) on the far plane.
    /// Expects a 0..1 depth range, as produced by the camera.
    pub fn from_ndc(ndc: Vec2, inverse_view_projection: Mat4, eye: Vec3) -> Ray {
        let mut far = inverse_view_projection * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        far = far / far.w;

        Ray::new(eye, far.xyz() - eye)
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Möller–Trumbore, hitting both faces. Returns the distance along the ray.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        const EPSILON: f32 = 1e-7;

        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let determinant = edge1.dot(p);

        if determinant.abs() < EPSILON {
            return None;
        }

        let inverse_determinant = 1.0 / determinant;
        let s = self.origin - a;
        let u = s.dot(p) * inverse_determinant;

        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inverse_determinant;

        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let distance = edge2.dot(q) * inverse_determinant;

        (distance > EPSILON).then_some(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_front_and_back_faces() {
        let (a, b, c) = (
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );

        let front = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z);
        let back = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);

        assert!((front.intersect_triangle(a, b, c).unwrap() - 2.0).abs() < 1e-6);
        assert!((back.intersect_triangle(a, b, c).unwrap() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn misses_outside_edges_and_behind_origin() {
        let (a, b, c) = (
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );

        let outside = Ray::new(Vec3::new(2.0, 0.0, 2.0), Vec3::NEG_Z);
        let away = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z);
        let parallel = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::X);

        assert_eq!(outside.intersect_triangle(a, b, c), None);
        assert_eq!(away.intersect_triangle(a, b, c), None);
        assert_eq!(parallel.intersect_triangle(a, b, c), None);
    }

    #[test]
    fn center_of_screen_looks_at_target() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(45f32.to_radians(), 1.5, 0.3, 1000.0);

        let ray = Ray::from_ndc(Vec2::ZERO, (projection * view).inverse(), eye);

        assert_eq!(ray.origin, eye);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn right_edge_of_screen_points_right() {
        let eye = Vec3::ZERO;
        let view = Mat4::look_at_rh(eye, Vec3::NEG_Z, Vec3::Y);
        let projection = Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.1, 100.0);

        let ray = Ray::from_ndc(Vec2::new(1.0, 0.0), (projection * view).inverse(), eye);

        // 90 degree fov: the edge ray is 45 degrees off the view axis
        let expected = Vec3::new(1.0, 0.0, -1.0).normalize();
        assert!((ray.direction - expected).length() < 1e-3);
    }
}

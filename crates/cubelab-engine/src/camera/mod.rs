//! Free-fly camera.

mod projection;

use glam::{Mat4, Vec3};

pub use projection::Projection;

const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT: f32 = 89.0;

/// Yaw/pitch camera moving along its own basis.
///
/// Right-handed with +Y up; `yaw = -90°, pitch = 0°` looks down -Z.
/// Angles are degrees. `speed` is world units per second and `sensitivity`
/// degrees per pixel of cursor motion.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    speed: f32,
    sensitivity: f32,

    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self::with_orientation(position, -90.0, 0.0)
    }

    pub fn with_orientation(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            speed: 2.5,
            sensitivity: 0.1,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
        };
        camera.update_basis();
        camera
    }

    pub fn move_forward(&mut self, dt: f32) {
        self.position += self.front * self.speed * dt;
    }

    pub fn move_backward(&mut self, dt: f32) {
        self.position -= self.front * self.speed * dt;
    }

    pub fn move_right(&mut self, dt: f32) {
        self.position += self.right * self.speed * dt;
    }

    pub fn move_left(&mut self, dt: f32) {
        self.position -= self.right * self.speed * dt;
    }

    pub fn move_up(&mut self, dt: f32) {
        self.position += self.up * self.speed * dt;
    }

    pub fn move_down(&mut self, dt: f32) {
        self.position -= self.up * self.speed * dt;
    }

    /// Applies a cursor delta in pixels. Screen y grows downward, so moving
    /// the cursor down pitches the view down.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_basis();
    }

    /// Negative speeds are taken by magnitude.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.abs();
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    fn update_basis(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl From<&Camera> for Mat4 {
    fn from(camera: &Camera) -> Mat4 {
        camera.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn default_looks_down_negative_z() {
        let c = Camera::default();
        assert_vec3_eq(c.front(), Vec3::NEG_Z);
        assert_vec3_eq(c.right(), Vec3::X);
        assert_vec3_eq(c.up(), Vec3::Y);
    }

    #[test]
    fn forward_one_second_at_speed_ten() {
        let mut c = Camera::new(Vec3::ZERO);
        c.set_speed(10.0);
        c.move_forward(1.0);
        assert_vec3_eq(c.position(), Vec3::new(0.0, 0.0, -10.0));
    }

    #[test]
    fn opposite_moves_cancel() {
        let mut c = Camera::new(Vec3::new(1.0, 2.0, 3.0));
        c.rotate(123.0, -45.0);
        c.move_left(0.3);
        c.move_up(0.7);
        c.move_right(0.3);
        c.move_down(0.7);
        c.move_forward(0.2);
        c.move_backward(0.2);
        assert_vec3_eq(c.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn strafing_follows_the_right_vector() {
        let mut c = Camera::new(Vec3::ZERO);
        c.set_speed(2.0);
        c.move_right(0.5);
        assert_vec3_eq(c.position(), Vec3::X);
    }

    #[test]
    fn rotate_scales_by_sensitivity_and_inverts_y() {
        let mut c = Camera::new(Vec3::ZERO);
        c.set_sensitivity(0.5);
        c.rotate(20.0, 10.0);
        assert_relative_eq!(c.yaw(), -80.0);
        assert_relative_eq!(c.pitch(), -5.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut c = Camera::new(Vec3::ZERO);
        c.rotate(0.0, -10_000.0);
        assert_relative_eq!(c.pitch(), 89.0);
        c.rotate(0.0, 10_000.0);
        assert_relative_eq!(c.pitch(), -89.0);
        assert!(c.front().is_finite());
    }

    #[test]
    fn negative_speed_is_taken_by_magnitude() {
        let mut c = Camera::new(Vec3::ZERO);
        c.set_speed(-4.0);
        assert_relative_eq!(c.speed(), 4.0);
        c.move_forward(1.0);
        assert!(c.position().z < 0.0);
    }

    #[test]
    fn view_matrix_maps_the_target_ahead() {
        let c = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        let view = Mat4::from(&c);
        assert_eq!(view, c.view_matrix());
        assert_vec3_eq(view.transform_point3(Vec3::ZERO), Vec3::new(0.0, 0.0, -5.0));
    }
}

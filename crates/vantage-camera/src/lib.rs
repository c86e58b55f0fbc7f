mod controls;

pub use controls::{ControlSettings, FirstPersonControls};

use glam::{Mat4, Vec3};
use vantage_3d::CameraUniform;
use wgpu::{Buffer, Queue};

pub fn forward_from_yaw_pitch(yaw: f32, pitch: f32) -> Vec3 {
    let cp = pitch.cos();
    let sp = pitch.sin();
    let cy = yaw.cos();
    let sy = yaw.sin();
    Vec3::new(cy * cp, sp, -sy * cp)
}

/// Inverse of [`forward_from_yaw_pitch`] for a non-zero direction.
pub fn yaw_pitch_from_forward(dir: Vec3) -> (f32, f32) {
    let d = dir.normalize_or(Vec3::NEG_Z);
    let pitch = d.y.clamp(-1.0, 1.0).asin();
    let yaw = (-d.z).atan2(d.x);
    (yaw, pitch)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// Point to face at startup; `None` looks down -Z.
    pub look_at: Option<Vec3>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y_deg: 45.0,
            near: 0.01,
            far: 1000.0,
            position: Vec3::new(5.0, 8.0, 30.0),
            look_at: None,
        }
    }
}

pub struct PerspectiveCamera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(settings: &CameraSettings, width: u32, height: u32) -> Self {
        let (yaw, pitch) = match settings.look_at {
            Some(target) => yaw_pitch_from_forward(target - settings.position),
            None => yaw_pitch_from_forward(Vec3::NEG_Z),
        };
        let mut cam = Self {
            eye: settings.position,
            yaw,
            pitch,
            fov_y_deg: settings.fov_y_deg,
            aspect: aspect_ratio(width, height),
            near: settings.near,
            far: settings.far,
            projection: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    /// Recomputes aspect and projection for a new viewport size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn forward(&self) -> Vec3 {
        forward_from_yaw_pitch(self.yaw, self.pitch)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.eye + self.forward(), Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

pub fn update_camera_buffer(queue: &Queue, camera_buf: &Buffer, camera: &PerspectiveCamera) {
    let uniform = CameraUniform {
        view_proj: camera.view_proj().to_cols_array_2d(),
        eye: camera.eye.extend(1.0).to_array(),
    };
    queue.write_buffer(camera_buf, 0, bytemuck::bytes_of(&uniform));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn defaults_match_viewer_setup() {
        let cam = PerspectiveCamera::new(&CameraSettings::default(), 1600, 900);
        assert_eq!(cam.fov_y_deg, 45.0);
        assert_eq!(cam.near, 0.01);
        assert_eq!(cam.far, 1000.0);
        assert_eq!(cam.eye, Vec3::new(5.0, 8.0, 30.0));
        assert!((cam.aspect - 16.0 / 9.0).abs() < 1e-6);
        assert!(close(cam.forward(), Vec3::NEG_Z));
    }

    #[test]
    fn resize_updates_aspect_and_projection() {
        let mut cam = PerspectiveCamera::new(&CameraSettings::default(), 800, 600);
        let before = cam.projection_matrix();
        for (w, h) in [(1920, 1080), (300, 700), (1, 1), (4096, 17)] {
            cam.set_viewport(w, h);
            assert_eq!(cam.aspect, w as f32 / h as f32);
            let expected =
                Mat4::perspective_rh(45f32.to_radians(), w as f32 / h as f32, 0.01, 1000.0);
            assert_eq!(cam.projection_matrix(), expected);
        }
        assert_ne!(cam.projection_matrix(), before);
    }

    #[test]
    fn repeated_resize_is_idempotent() {
        let mut cam = PerspectiveCamera::new(&CameraSettings::default(), 800, 600);
        cam.set_viewport(1024, 768);
        let once = cam.projection_matrix();
        cam.set_viewport(1024, 768);
        assert_eq!(cam.projection_matrix(), once);
    }

    #[test]
    fn zero_sized_viewport_is_clamped() {
        let mut cam = PerspectiveCamera::new(&CameraSettings::default(), 0, 0);
        assert_eq!(cam.aspect, 1.0);
        cam.set_viewport(640, 0);
        assert_eq!(cam.aspect, 640.0);
        assert!(cam.projection_matrix().is_finite());
    }

    #[test]
    fn look_at_faces_target() {
        let settings = CameraSettings {
            look_at: Some(Vec3::ZERO),
            ..Default::default()
        };
        let cam = PerspectiveCamera::new(&settings, 100, 100);
        let expected = (Vec3::ZERO - settings.position).normalize();
        assert!(close(cam.forward(), expected));
    }

    #[test]
    fn yaw_pitch_round_trip_for_axes() {
        let diagonal = Vec3::new(1.0, 1.0, -1.0).normalize();
        for dir in [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z, diagonal] {
            let (yaw, pitch) = yaw_pitch_from_forward(dir);
            assert!(close(forward_from_yaw_pitch(yaw, pitch), dir), "{dir:?}");
        }
    }
}

use crate::{PerspectiveCamera, forward_from_yaw_pitch};
use glam::Vec3;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

const MAX_LAT_DEG: f32 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSettings {
    /// World units per second.
    pub movement_speed: f32,
    /// Degrees per second per pixel of pointer offset from the viewport centre.
    pub look_speed: f32,
    pub look_vertical: bool,
    pub active_look: bool,
    pub auto_forward: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            movement_speed: 8.0,
            look_speed: 0.08,
            look_vertical: true,
            active_look: true,
            auto_forward: false,
        }
    }
}

/// Fly-through controls: keys translate along the camera axes, and the
/// pointer's offset from the viewport centre keeps turning the view.
pub struct FirstPersonControls {
    pub settings: ControlSettings,
    pub enabled: bool,
    move_forward: bool,
    move_back: bool,
    move_left: bool,
    move_right: bool,
    move_up: bool,
    move_down: bool,
    pointer_x: f32,
    pointer_y: f32,
    half_width: f32,
    half_height: f32,
    lat: f32,
    lon: f32,
}

impl FirstPersonControls {
    pub fn new(
        settings: ControlSettings,
        camera: &PerspectiveCamera,
        width: u32,
        height: u32,
    ) -> Self {
        let mut controls = Self {
            settings,
            enabled: true,
            move_forward: false,
            move_back: false,
            move_left: false,
            move_right: false,
            move_up: false,
            move_down: false,
            pointer_x: 0.0,
            pointer_y: 0.0,
            half_width: 0.0,
            half_height: 0.0,
            lat: 0.0,
            lon: 0.0,
        };
        controls.handle_resize(width, height);
        controls.sync_orientation(camera);
        controls
    }

    /// Re-reads latitude/longitude from the camera's current heading.
    pub fn sync_orientation(&mut self, camera: &PerspectiveCamera) {
        self.lat = camera.pitch.to_degrees().clamp(-MAX_LAT_DEG, MAX_LAT_DEG);
        self.lon = camera.yaw.to_degrees() + 90.0;
    }

    pub fn handle_resize(&mut self, width: u32, height: u32) {
        self.half_width = width as f32 / 2.0;
        self.half_height = height as f32 / 2.0;
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if !*repeat {
                    self.set_key(*code, *state == ElementState::Pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.set_pointer(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer_x = 0.0;
                self.pointer_y = 0.0;
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.set_button(*button, *state == ElementState::Pressed);
            }
            WindowEvent::Focused(false) => self.release_all(),
            WindowEvent::Resized(size) => self.handle_resize(size.width, size.height),
            _ => {}
        }
    }

    pub fn set_key(&mut self, code: KeyCode, pressed: bool) {
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => self.move_forward = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.move_back = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.move_left = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.move_right = pressed,
            KeyCode::KeyR => self.move_up = pressed,
            KeyCode::KeyF => self.move_down = pressed,
            _ => {}
        }
    }

    /// Pointer position in surface pixels.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer_x = x - self.half_width;
        self.pointer_y = y - self.half_height;
    }

    pub fn set_button(&mut self, button: MouseButton, pressed: bool) {
        if !self.settings.active_look {
            return;
        }
        match button {
            MouseButton::Left => self.move_forward = pressed,
            MouseButton::Right => self.move_back = pressed,
            _ => {}
        }
    }

    pub fn release_all(&mut self) {
        self.move_forward = false;
        self.move_back = false;
        self.move_left = false;
        self.move_right = false;
        self.move_up = false;
        self.move_down = false;
    }

    pub fn update(&mut self, cam: &mut PerspectiveCamera, dt: f32) {
        if !self.enabled {
            return;
        }

        let forward = forward_from_yaw_pitch(cam.yaw, cam.pitch);
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
        let up = right.cross(forward);

        let step = dt * self.settings.movement_speed;
        if self.move_forward || (self.settings.auto_forward && !self.move_back) {
            cam.eye += forward * step;
        }
        if self.move_back {
            cam.eye -= forward * step;
        }
        if self.move_left {
            cam.eye -= right * step;
        }
        if self.move_right {
            cam.eye += right * step;
        }
        if self.move_up {
            cam.eye += up * step;
        }
        if self.move_down {
            cam.eye -= up * step;
        }

        let look = if self.settings.active_look {
            dt * self.settings.look_speed
        } else {
            0.0
        };
        self.lon -= self.pointer_x * look;
        if self.settings.look_vertical {
            self.lat -= self.pointer_y * look;
        }
        self.lat = self.lat.clamp(-MAX_LAT_DEG, MAX_LAT_DEG);

        cam.pitch = self.lat.to_radians();
        cam.yaw = (self.lon - 90.0).to_radians();
    }

    pub fn lat(&self) -> f32 {
        self.lat
    }

    pub fn lon(&self) -> f32 {
        self.lon
    }
}

use glam::{Mat4, Vec3};
use std::sync::Arc;

/// An sRGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_linear(self) -> Vec3 {
        fn decode(c: f32) -> f32 {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        Vec3::new(decode(self.r), decode(self.g), decode(self.b))
    }
}

pub struct ModelInstance<M> {
    pub model: Arc<M>,
    pub transform: Mat4,
}

/// Root of everything that gets drawn: a background colour, an optional
/// environment used for lighting and reflections, and the attached models.
///
/// Each attached model is one direct child, however many meshes it carries.
pub struct Scene<M, E> {
    background: Color,
    environment: Option<Arc<E>>,
    models: Vec<ModelInstance<M>>,
}

impl<M, E> Scene<M, E> {
    pub fn new(background: Color) -> Self {
        Self {
            background,
            environment: None,
            models: Vec::new(),
        }
    }

    pub fn add_model(&mut self, model: Arc<M>, transform: Mat4) {
        self.models.push(ModelInstance { model, transform });
    }

    pub fn set_environment(&mut self, environment: Arc<E>) {
        self.environment = Some(environment);
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn environment(&self) -> Option<&Arc<E>> {
        self.environment.as_ref()
    }

    pub fn models(&self) -> &[ModelInstance<M>] {
        &self.models
    }

    pub fn child_count(&self) -> usize {
        self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colour_splits_channels() {
        let c = Color::from_hex(0xaaaaaa);
        assert!((c.r - 170.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.r, c.g);
        assert_eq!(c.g, c.b);

        let c = Color::from_hex(0xff8000);
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
    }

    #[test]
    fn linear_conversion_keeps_endpoints() {
        assert_eq!(Color::new(0.0, 0.0, 0.0).to_linear(), Vec3::ZERO);
        let white = Color::new(1.0, 1.0, 1.0).to_linear();
        assert!((white - Vec3::ONE).abs().max_element() < 1e-6);
        // mid grey is darker in linear space
        assert!(Color::from_hex(0xaaaaaa).to_linear().x < 170.0 / 255.0);
    }

    #[test]
    fn scene_starts_empty() {
        let scene: Scene<(), ()> = Scene::new(Color::from_hex(0xaaaaaa));
        assert_eq!(scene.child_count(), 0);
        assert!(scene.environment().is_none());
    }

    #[test]
    fn model_is_added_as_one_child() {
        let mut scene: Scene<Vec<u32>, ()> = Scene::new(Color::from_hex(0));
        let subgraph = Arc::new(vec![1, 2, 3, 4, 5]);
        scene.add_model(subgraph, Mat4::IDENTITY);
        assert_eq!(scene.child_count(), 1);
        assert_eq!(scene.models()[0].model.len(), 5);
    }

    #[test]
    fn environment_can_be_replaced() {
        let mut scene: Scene<(), &str> = Scene::new(Color::from_hex(0));
        scene.set_environment(Arc::new("first"));
        scene.set_environment(Arc::new("second"));
        assert_eq!(scene.environment().map(|e| **e), Some("second"));
        assert_eq!(scene.child_count(), 0);
    }
}

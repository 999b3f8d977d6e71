//! Viewer configuration.
//!
//! [`ViewerConfig::default`] carries the stage the viewer was designed around:
//! a grey studio background with fog, one shadow-casting sun, a soft ambient
//! fill, a wide ground plane and a grid. Any field can be overridden by an
//! optional `viewer.json` next to the model registry.

use serde::Deserialize;

/// Converts a `0xRRGGBB` colour given in sRGB into linear RGB.
///
/// Every colour in the config is authored in sRGB, but lighting and blending
/// happen in linear space, so everything passes through here before it
/// reaches a shader.
pub fn srgb_hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

/// Decodes one sRGB channel in `0..=1`.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear clear colour for a `0xRRGGBB` sRGB hex value.
pub fn clear_colour(hex: u32) -> wgpu::Color {
    let [r, g, b] = srgb_hex_to_linear(hex);
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: 1.0,
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub damping_factor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 50.0, 100.0],
            target: [0.0, 30.0, 0.0],
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            damping_factor: 0.2,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightConfig {
    pub directional_color: u32,
    pub directional_intensity: f32,
    /// Where the sun sits relative to the stage centre; only the direction matters.
    pub directional_position: [f32; 3],
    pub shadow_map_size: u32,
    /// Half width of the square area covered by the shadow map.
    pub shadow_extent: f32,
    pub ambient_color: u32,
    pub ambient_intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            directional_color: 0xffffff,
            directional_intensity: 3.0,
            directional_position: [-1.0, 2.0, 1.0],
            shadow_map_size: 2048,
            shadow_extent: 150.0,
            ambient_color: 0xffffff,
            ambient_intensity: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroundConfig {
    pub size: f32,
    pub color: u32,
    pub grid_divisions: u32,
    pub grid_center_color: u32,
    pub grid_color: u32,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            size: 2000.0,
            color: 0x999999,
            grid_divisions: 50,
            grid_center_color: 0x3333ff,
            grid_color: 0x333333,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub background: u32,
    pub fog_near: f32,
    pub fog_far: f32,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub ground: GroundConfig,
    /// Directory (relative to the asset root) that registry entries point into.
    pub model_dir: String,
    pub registry_file: String,
    /// Step used by keyboard nudging of the vertical offset.
    pub offset_step: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            background: 0xa0a0a0,
            fog_near: 200.0,
            fog_far: 1000.0,
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            ground: GroundConfig::default(),
            model_dir: "model".to_string(),
            registry_file: "modelList.json".to_string(),
            offset_step: 1.0,
        }
    }
}

impl ViewerConfig {
    pub const FILE_NAME: &'static str = "viewer.json";

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

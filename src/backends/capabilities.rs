use crate::resource::texture::TextureFormat;

/// What the graphics context can do, probed once when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Human readable name of the implementation, eg. "OpenGL 3.3".
    pub version: String,
    pub max_texture_size: u32,
    pub max_texture_units: usize,
    pub max_anisotropy: f32,
    /// Textures whose dimensions are not power of two.
    pub npot_textures: bool,
    /// Unclamped floating point texture formats.
    pub float_textures: bool,
    pub depth_textures: bool,
    /// S3TC (DXT) compressed texture formats.
    pub s3tc_textures: bool,
    pub glsl: bool,
    pub vertex_buffers: bool,
    /// Offscreen render surfaces (framebuffer objects).
    pub offscreen_surfaces: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            version: "headless".into(),
            max_texture_size: 4096,
            max_texture_units: 8,
            max_anisotropy: 16.0,
            npot_textures: true,
            float_textures: true,
            depth_textures: true,
            s3tc_textures: true,
            glsl: true,
            vertex_buffers: true,
            offscreen_surfaces: true,
        }
    }
}

impl Capabilities {
    /// Checks if textures of `format` could be created.
    pub fn supports_format(&self, format: TextureFormat) -> bool {
        if format.is_depth() {
            return self.depth_textures;
        }

        if format.is_compressed() {
            return self.s3tc_textures;
        }

        if format.is_float() {
            return self.float_textures;
        }

        true
    }

    /// Checks if a texture with `width` x `height` texels could be created.
    pub fn supports_dimensions(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }

        if width > self.max_texture_size || height > self.max_texture_size {
            return false;
        }

        self.npot_textures || (width.is_power_of_two() && height.is_power_of_two())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats() {
        let mut caps = Capabilities::default();
        assert!(caps.supports_format(TextureFormat::RgbDxt1));

        caps.s3tc_textures = false;
        caps.depth_textures = false;
        assert!(!caps.supports_format(TextureFormat::RgbDxt1));
        assert!(!caps.supports_format(TextureFormat::Depth24));
        assert!(caps.supports_format(TextureFormat::RGBA8));
        assert!(caps.supports_format(TextureFormat::RGBA32F));
    }

    #[test]
    fn dimensions() {
        let mut caps = Capabilities::default();
        caps.max_texture_size = 256;
        assert!(caps.supports_dimensions(256, 100));
        assert!(!caps.supports_dimensions(512, 1));
        assert!(!caps.supports_dimensions(0, 1));

        caps.npot_textures = false;
        assert!(!caps.supports_dimensions(256, 100));
        assert!(caps.supports_dimensions(256, 128));
    }

    #[test]
    fn json() {
        let caps: Capabilities =
            serde_json::from_str(r#"{ "max_texture_size": 1024, "glsl": false }"#).unwrap();
        assert_eq!(caps.max_texture_size, 1024);
        assert!(!caps.glsl);
        assert_eq!(caps.max_texture_units, 8);
    }
}

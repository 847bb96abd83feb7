//! Textures, and the driver that keeps texture objects in sync.

use cgmath::{Vector2, Vector4};
use smallvec::SmallVec;

use super::driver::{ResourceDriver, UpdateError};
use super::{Content, ResourceId, ResourceKind};
use crate::backends::capabilities::Capabilities;
use crate::backends::{ObjectName, TextureParameter};
use crate::context::{Binding, OpenGLContext};
use crate::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    R8,
    RG8,
    RGB8,
    RGBA8,
    RGBA16F,
    RGBA32F,
    Depth16,
    Depth24,
    Depth32F,
    RgbDxt1,
    RgbaDxt5,
}

impl TextureFormat {
    #[inline]
    pub fn is_depth(self) -> bool {
        match self {
            TextureFormat::Depth16 | TextureFormat::Depth24 | TextureFormat::Depth32F => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_compressed(self) -> bool {
        match self {
            TextureFormat::RgbDxt1 | TextureFormat::RgbaDxt5 => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_float(self) -> bool {
        match self {
            TextureFormat::RGBA16F | TextureFormat::RGBA32F | TextureFormat::Depth32F => true,
            _ => false,
        }
    }

    /// Bytes of a texel, or of a 4x4 block with compressed formats.
    pub fn block_size(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::RG8 | TextureFormat::Depth16 => 2,
            TextureFormat::RGB8 => 3,
            TextureFormat::RGBA8 | TextureFormat::Depth24 | TextureFormat::Depth32F => 4,
            TextureFormat::RGBA16F | TextureFormat::RgbDxt1 => 8,
            TextureFormat::RGBA32F | TextureFormat::RgbaDxt5 => 16,
        }
    }

    /// Bytes of an image with `dimensions`, or `None` if it does not fit in memory.
    pub fn checked_size(self, dimensions: Vector2<u32>) -> Option<usize> {
        let (w, h) = (dimensions.x as usize, dimensions.y as usize);
        let (w, h) = if self.is_compressed() {
            (w / 4 + (w % 4 != 0) as usize, h / 4 + (h % 4 != 0) as usize)
        } else {
            (w, h)
        };

        w.checked_mul(h)?.checked_mul(self.block_size())
    }

    /// Bytes of an image with `dimensions`. Saturates at `usize::MAX`.
    #[inline]
    pub fn size(self, dimensions: Vector2<u32>) -> usize {
        self.checked_size(dimensions).unwrap_or(usize::max_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmap,
    LinearMipmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureWrap {
    Repeat,
    Clamp,
    MirroredRepeat,
    ClampToBorder,
}

/// Comparison function of depth textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Never,
    Less,
    LessOrEqual,
    Equal,
    Greater,
    GreaterOrEqual,
    NotEqual,
    Always,
}

/// A rectangular area of a texture, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureRegion {
    pub origin: Vector2<u32>,
    pub size: Vector2<u32>,
}

impl TextureRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        TextureRegion {
            origin: Vector2::new(x, y),
            size: Vector2::new(width, height),
        }
    }

    /// Checks if this region lies inside a texture with `dimensions`.
    pub fn is_inside(&self, dimensions: Vector2<u32>) -> bool {
        self.size.x > 0
            && self.size.y > 0
            && u64::from(self.origin.x) + u64::from(self.size.x) <= u64::from(dimensions.x)
            && u64::from(self.origin.y) + u64::from(self.size.y) <= u64::from(dimensions.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    pub format: TextureFormat,
    pub dimensions: Vector2<u32>,
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
    pub anisotropy: f32,
    pub base_mipmap: u32,
    pub max_mipmap: u32,
    pub depth_compare: Option<Comparison>,
    pub border_color: Vector4<f32>,
}

impl Default for TextureParams {
    fn default() -> Self {
        TextureParams {
            format: TextureFormat::RGBA8,
            dimensions: Vector2::new(1, 1),
            filter: TextureFilter::Linear,
            wrap: TextureWrap::Repeat,
            anisotropy: 1.0,
            base_mipmap: 0,
            max_mipmap: 0,
            depth_compare: None,
            border_color: Vector4::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// What changed since the last successful update.
#[derive(Debug, Clone, Default)]
pub struct TextureDirty {
    pub parameters: bool,
    /// The whole image must be uploaded again.
    pub image: bool,
    pub regions: SmallVec<[TextureRegion; 4]>,
}

pub struct TextureContent {
    params: TextureParams,
    data: Option<Vec<u8>>,
    dirty: TextureDirty,
}

impl TextureContent {
    #[inline]
    pub fn params(&self) -> &TextureParams {
        &self.params
    }

    #[inline]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_ref().map(|v| &v[..])
    }

    #[inline]
    pub fn dirty(&self) -> &TextureDirty {
        &self.dirty
    }
}

impl Content for TextureContent {
    fn is_dirty(&self) -> bool {
        self.dirty.parameters || self.dirty.image || !self.dirty.regions.is_empty()
    }

    fn needs_full_update(&self) -> bool {
        self.dirty.image
    }

    fn clear_dirty(&mut self) {
        self.dirty = TextureDirty::default();
    }

    fn invalidate(&mut self) {
        self.dirty.parameters = true;
        self.dirty.image = true;
    }
}

impl_resource!(Texture, TextureContent, ResourceKind::Texture);

fn validate_data(format: TextureFormat, dimensions: Vector2<u32>, data: &Option<Vec<u8>>) -> Result<()> {
    let expected = format.checked_size(dimensions).ok_or_else(|| {
        Error::Invalid(format!(
            "{:?} image of {}x{} does not fit in memory.",
            format, dimensions.x, dimensions.y
        ))
    })?;

    if let Some(ref bytes) = *data {
        if bytes.len() != expected {
            return Err(Error::Invalid(format!(
                "{:?} image of {}x{} takes {} bytes, but {} are given.",
                format,
                dimensions.x,
                dimensions.y,
                expected,
                bytes.len()
            )));
        }
    }

    Ok(())
}

impl Texture {
    /// Creates a texture. `data` holds the texels of the whole image, row by row. The
    /// texture content is undefined if it is `None`.
    pub fn new(params: TextureParams, data: Option<Vec<u8>>) -> Result<Self> {
        validate_data(params.format, params.dimensions, &data)?;

        Ok(Texture::from_content(TextureContent {
            params,
            data,
            dirty: TextureDirty {
                parameters: true,
                image: true,
                regions: SmallVec::new(),
            },
        }))
    }

    pub fn params(&self) -> TextureParams {
        self.shared.read(|c| c.params)
    }

    pub fn set_filter(&self, filter: TextureFilter) {
        self.configure(|p| p.filter = filter);
    }

    pub fn set_wrap(&self, wrap: TextureWrap) {
        self.configure(|p| p.wrap = wrap);
    }

    pub fn set_anisotropy(&self, anisotropy: f32) {
        self.configure(|p| p.anisotropy = anisotropy);
    }

    pub fn set_mipmap_range(&self, base: u32, max: u32) {
        self.configure(|p| {
            p.base_mipmap = base;
            p.max_mipmap = max;
        });
    }

    pub fn set_depth_compare(&self, comparison: Option<Comparison>) {
        self.configure(|p| p.depth_compare = comparison);
    }

    pub fn set_border_color(&self, color: Vector4<f32>) {
        self.configure(|p| p.border_color = color);
    }

    /// Replaces the whole image, possibly with another format or size.
    pub fn set_data(
        &self,
        format: TextureFormat,
        dimensions: Vector2<u32>,
        data: Option<Vec<u8>>,
    ) -> Result<()> {
        validate_data(format, dimensions, &data)?;

        self.shared.modify(|c| {
            c.params.format = format;
            c.params.dimensions = dimensions;
            c.data = data;
            c.dirty.image = true;
            c.dirty.regions.clear();
            (true, ())
        });

        Ok(())
    }

    /// Replaces the texels inside `region`. `bytes` holds the texels of the region only,
    /// row by row.
    pub fn update_region(&self, region: TextureRegion, bytes: &[u8]) -> Result<()> {
        self.shared.modify(|c| {
            let format = c.params.format;
            let dimensions = c.params.dimensions;

            if format.is_compressed() {
                let err = Error::Invalid("Compressed textures could only be replaced as a whole.".into());
                return (false, Err(err));
            }

            if !region.is_inside(dimensions) {
                let err = Error::Invalid(format!("{:?} is out of the texture bounds.", region));
                return (false, Err(err));
            }

            if bytes.len() != format.size(region.size) {
                let err = Error::Invalid(format!(
                    "Region takes {} bytes, but {} are given.",
                    format.size(region.size),
                    bytes.len()
                ));
                return (false, Err(err));
            }

            let len = match format.checked_size(dimensions) {
                Some(len) => len,
                None => {
                    let err = Error::Invalid(format!("{:?} texture does not fit in memory.", format));
                    return (false, Err(err));
                }
            };

            let bpp = format.block_size();
            let stride = dimensions.x as usize * bpp;
            let row = region.size.x as usize * bpp;
            let image = c.data.get_or_insert_with(|| vec![0; len]);

            for y in 0..region.size.y as usize {
                let dst = (region.origin.y as usize + y) * stride + region.origin.x as usize * bpp;
                image[dst..dst + row].copy_from_slice(&bytes[y * row..(y + 1) * row]);
            }

            if !c.dirty.image {
                c.dirty.regions.push(region);
            }

            (true, Ok(()))
        })
    }

    fn configure<F>(&self, func: F)
    where
        F: FnOnce(&mut TextureParams),
    {
        self.shared.modify(|c| {
            let before = c.params;
            func(&mut c.params);

            let changed = before != c.params;
            c.dirty.parameters |= changed;
            (changed, ())
        })
    }
}

/// Copies the texels of `region` out of a full image.
fn extract(image: &[u8], format: TextureFormat, dimensions: Vector2<u32>, region: TextureRegion) -> Vec<u8> {
    let bpp = format.block_size();
    let stride = dimensions.x as usize * bpp;
    let row = region.size.x as usize * bpp;

    let mut bytes = Vec::with_capacity(row * region.size.y as usize);
    for y in 0..region.size.y as usize {
        let src = (region.origin.y as usize + y) * stride + region.origin.x as usize * bpp;
        bytes.extend_from_slice(&image[src..src + row]);
    }

    bytes
}

/// The texture object of a `Texture`, and the parameters it has been configured with.
pub struct TextureObject {
    resource: ResourceId,
    name: ObjectName,
    format: Option<TextureFormat>,
    dimensions: Vector2<u32>,
    filter: Option<TextureFilter>,
    wrap: Option<TextureWrap>,
    anisotropy: Option<f32>,
    mipmaps: Option<(u32, u32)>,
    depth_compare: Option<Option<Comparison>>,
    border_color: Option<[f32; 4]>,
}

impl TextureObject {
    #[inline]
    pub fn name(&self) -> ObjectName {
        self.name
    }

    #[inline]
    pub fn binding(&self) -> Binding {
        Binding {
            resource: self.resource,
            object: self.name,
        }
    }

    /// Parameters that differ from what the object has been configured with.
    fn changes(&self, params: &TextureParams, anisotropy: f32) -> SmallVec<[TextureParameter; 8]> {
        let mut changes = SmallVec::new();
        let border = params.border_color;

        if self.filter != Some(params.filter) {
            changes.push(TextureParameter::Filter(params.filter));
        }

        if self.wrap != Some(params.wrap) {
            changes.push(TextureParameter::Wrap(params.wrap));
        }

        if self.anisotropy != Some(anisotropy) {
            changes.push(TextureParameter::Anisotropy(anisotropy));
        }

        if self.mipmaps != Some((params.base_mipmap, params.max_mipmap)) {
            changes.push(TextureParameter::MipmapRange(params.base_mipmap, params.max_mipmap));
        }

        if self.depth_compare != Some(params.depth_compare) {
            changes.push(TextureParameter::DepthCompare(params.depth_compare));
        }

        if self.border_color != Some([border.x, border.y, border.z, border.w]) {
            changes.push(TextureParameter::BorderColor([border.x, border.y, border.z, border.w]));
        }

        changes
    }

    fn record(&mut self, param: TextureParameter) {
        match param {
            TextureParameter::Filter(v) => self.filter = Some(v),
            TextureParameter::Wrap(v) => self.wrap = Some(v),
            TextureParameter::Anisotropy(v) => self.anisotropy = Some(v),
            TextureParameter::MipmapRange(base, max) => self.mipmaps = Some((base, max)),
            TextureParameter::DepthCompare(v) => self.depth_compare = Some(v),
            TextureParameter::BorderColor(v) => self.border_color = Some(v),
        }
    }
}

fn validate(caps: &Capabilities, params: &TextureParams) -> ::std::result::Result<(), UpdateError> {
    if !caps.supports_format(params.format) {
        return Err(UpdateError::Unsupported(format!(
            "Texture format {:?} is not supported by {}.",
            params.format, caps.version
        )));
    }

    let (w, h) = (params.dimensions.x, params.dimensions.y);
    if !caps.supports_dimensions(w, h) {
        return Err(UpdateError::Failed(format!(
            "Texture of {}x{} is not supported (max size {}, npot {}).",
            w, h, caps.max_texture_size, caps.npot_textures
        )));
    }

    if params.base_mipmap > params.max_mipmap {
        return Err(UpdateError::Failed(format!(
            "Invalid mipmap range {}..{}.",
            params.base_mipmap, params.max_mipmap
        )));
    }

    Ok(())
}

fn bind_once(ctx: &mut OpenGLContext, bound: &mut bool, binding: Binding) -> Result<()> {
    if !*bound {
        ctx.bind_texture(0, Some(binding))?;
        *bound = true;
    }

    Ok(())
}

pub struct TextureDriver;

impl ResourceDriver for TextureDriver {
    type Content = TextureContent;
    type Handle = TextureObject;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn allocate(
        &self,
        ctx: &mut OpenGLContext,
        id: ResourceId,
        content: &TextureContent,
    ) -> ::std::result::Result<TextureObject, UpdateError> {
        validate(ctx.capabilities(), &content.params)?;

        let name = ctx.visitor().create_texture()?;
        Ok(TextureObject {
            resource: id,
            name,
            format: None,
            dimensions: Vector2::new(0, 0),
            filter: None,
            wrap: None,
            anisotropy: None,
            mipmaps: None,
            depth_compare: None,
            border_color: None,
        })
    }

    fn update(
        &self,
        ctx: &mut OpenGLContext,
        content: &mut TextureContent,
        handle: &mut TextureObject,
        full: bool,
    ) -> ::std::result::Result<String, UpdateError> {
        validate(ctx.capabilities(), &content.params)?;

        let params = content.params;
        let mut message = String::new();
        let mut anisotropy = params.anisotropy.max(1.0);
        let limit = ctx.capabilities().max_anisotropy;
        if anisotropy > limit {
            message = format!("Anisotropy {} is clamped to {}.", anisotropy, limit);
            anisotropy = limit;
        }

        let binding = handle.binding();
        let previous = ctx.state().texture(0);
        let mut bound = false;

        let changes = handle.changes(&params, anisotropy);
        if !changes.is_empty() {
            bind_once(ctx, &mut bound, binding)?;
            for param in changes {
                ctx.visitor().texture_parameter(handle.name, param)?;
                handle.record(param);
            }
        }

        let reshaped = handle.format != Some(params.format) || handle.dimensions != params.dimensions;
        let whole = full || reshaped || content.dirty.image;

        // Depth and compressed formats could not be updated partially.
        let partial = !content.dirty.regions.is_empty();
        if whole || (partial && (params.format.is_depth() || params.format.is_compressed())) {
            bind_once(ctx, &mut bound, binding)?;
            ctx.visitor()
                .texture_image(handle.name, params.format, params.dimensions, content.data())?;
            handle.format = Some(params.format);
            handle.dimensions = params.dimensions;
        } else if partial {
            if let Some(image) = content.data.as_ref() {
                bind_once(ctx, &mut bound, binding)?;
                for &region in &content.dirty.regions {
                    let bytes = extract(image, params.format, params.dimensions, region);
                    ctx.visitor()
                        .texture_sub_image(handle.name, params.format, region, &bytes)?;
                }
            }
        }

        if bound {
            ctx.bind_texture(0, previous)?;
        }

        Ok(message)
    }

    fn destroy_impl(&self, ctx: &mut OpenGLContext, handle: TextureObject) -> Result<()> {
        ctx.unbind(handle.resource)?;
        ctx.visitor().delete_texture(handle.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resource::{Resource, Status};

    #[test]
    fn sizes() {
        let dims = Vector2::new(5, 3);
        assert_eq!(TextureFormat::R8.size(dims), 15);
        assert_eq!(TextureFormat::RGBA8.size(dims), 60);
        assert_eq!(TextureFormat::RGBA32F.size(dims), 240);
        assert_eq!(TextureFormat::RgbDxt1.size(dims), 2 * 1 * 8);
        assert_eq!(TextureFormat::RgbaDxt5.size(Vector2::new(4, 4)), 16);
    }

    #[test]
    fn huge_dimensions() {
        let max = u32::max_value();
        let huge = Vector2::new(max, max);
        assert_eq!(TextureFormat::RGBA32F.checked_size(huge), None);
        assert_eq!(TextureFormat::RGBA32F.size(huge), usize::max_value());
        assert!(TextureFormat::RgbaDxt5.checked_size(Vector2::new(max, max)).is_none());

        let mut params = TextureParams::default();
        params.format = TextureFormat::RGBA32F;
        params.dimensions = huge;

        for data in vec![Some(vec![0; 16]), None] {
            match Texture::new(params, data) {
                Err(Error::Invalid(_)) => {}
                _ => panic!("oversized image must be rejected"),
            }
        }

        let texture = Texture::new(TextureParams::default(), None).unwrap();
        match texture.set_data(TextureFormat::RGBA32F, huge, None) {
            Err(Error::Invalid(_)) => {}
            _ => panic!("oversized image must be rejected"),
        }
        assert_eq!(texture.params().dimensions, TextureParams::default().dimensions);
    }

    #[test]
    fn data_validation() {
        let mut params = TextureParams::default();
        params.dimensions = Vector2::new(2, 2);
        assert!(Texture::new(params, Some(vec![0; 16])).is_ok());
        assert!(Texture::new(params, Some(vec![0; 15])).is_err());
        assert!(Texture::new(params, None).is_ok());
    }

    #[test]
    fn setters_track_changes() {
        let texture = Texture::new(TextureParams::default(), None).unwrap();
        texture.shared.lock().content.clear_dirty();
        texture.shared.lock().status = Status::Ready;

        texture.set_filter(TextureFilter::Linear);
        assert_eq!(texture.status(), Status::Ready);
        assert!(!texture.shared.read(|c| c.is_dirty()));

        texture.set_wrap(TextureWrap::Clamp);
        assert_eq!(texture.status(), Status::Dirty);
        assert!(texture.shared.read(|c| c.dirty.parameters && !c.dirty.image));
    }

    #[test]
    fn regions() {
        let mut params = TextureParams::default();
        params.format = TextureFormat::R8;
        params.dimensions = Vector2::new(4, 4);

        let texture = Texture::new(params, None).unwrap();
        texture.shared.lock().content.clear_dirty();

        let region = TextureRegion::new(1, 2, 2, 2);
        texture.update_region(region, &[1, 2, 3, 4]).unwrap();
        assert!(texture
            .update_region(TextureRegion::new(3, 3, 2, 1), &[0, 0])
            .is_err());
        assert!(texture.update_region(region, &[1, 2, 3]).is_err());

        texture.shared.read(|c| {
            let image = c.data().unwrap();
            assert_eq!(&image[8..12], &[0, 1, 2, 0]);
            assert_eq!(&image[12..16], &[0, 3, 4, 0]);
            assert_eq!(&c.dirty.regions[..], &[region]);
            assert_eq!(extract(image, TextureFormat::R8, params.dimensions, region), vec![1, 2, 3, 4]);
        });
    }

    #[test]
    fn compressed_regions() {
        let mut params = TextureParams::default();
        params.format = TextureFormat::RgbDxt1;
        params.dimensions = Vector2::new(4, 4);

        let texture = Texture::new(params, None).unwrap();
        assert!(texture
            .update_region(TextureRegion::new(0, 0, 4, 4), &[0; 8])
            .is_err());
    }
}

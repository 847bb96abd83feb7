//! Offscreen render surfaces.

use cgmath::Vector2;

use super::driver::{ResourceDriver, UpdateError};
use super::{Content, ResourceId, ResourceKind};
use crate::backends::ObjectName;
use crate::context::OpenGLContext;
use crate::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceParams {
    pub dimensions: Vector2<u32>,
    pub depth_buffer: bool,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        SurfaceParams {
            dimensions: Vector2::new(256, 256),
            depth_buffer: true,
        }
    }
}

pub struct SurfaceContent {
    params: SurfaceParams,
    dirty: bool,
}

impl SurfaceContent {
    #[inline]
    pub fn params(&self) -> &SurfaceParams {
        &self.params
    }
}

impl Content for SurfaceContent {
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn needs_full_update(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn invalidate(&mut self) {
        self.dirty = true;
    }
}

impl_resource!(Surface, SurfaceContent, ResourceKind::Surface);

impl Surface {
    pub fn new(params: SurfaceParams) -> Self {
        Surface::from_content(SurfaceContent {
            params,
            dirty: true,
        })
    }

    pub fn params(&self) -> SurfaceParams {
        self.shared.read(|c| c.params)
    }

    /// Resizes the surface. Its content is lost at the next update.
    pub fn resize(&self, dimensions: Vector2<u32>) {
        self.shared.modify(|c| {
            let changed = c.params.dimensions != dimensions;
            c.params.dimensions = dimensions;
            c.dirty |= changed;
            (changed, ())
        })
    }
}

pub struct SurfaceObject {
    resource: ResourceId,
    name: Option<ObjectName>,
}

impl SurfaceObject {
    /// Name of the surface object, once it has been created.
    #[inline]
    pub fn name(&self) -> Option<ObjectName> {
        self.name
    }
}

pub struct SurfaceDriver;

impl ResourceDriver for SurfaceDriver {
    type Content = SurfaceContent;
    type Handle = SurfaceObject;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Surface
    }

    fn allocate(
        &self,
        ctx: &mut OpenGLContext,
        id: ResourceId,
        _: &SurfaceContent,
    ) -> ::std::result::Result<SurfaceObject, UpdateError> {
        if !ctx.capabilities().offscreen_surfaces {
            return Err(UpdateError::Unsupported(
                "Offscreen surfaces are not supported.".into(),
            ));
        }

        Ok(SurfaceObject {
            resource: id,
            name: None,
        })
    }

    fn update(
        &self,
        ctx: &mut OpenGLContext,
        content: &mut SurfaceContent,
        handle: &mut SurfaceObject,
        full: bool,
    ) -> ::std::result::Result<String, UpdateError> {
        if !full && handle.name.is_some() {
            return Ok(String::new());
        }

        let dimensions = content.params.dimensions;
        let max = ctx.capabilities().max_texture_size;
        if dimensions.x == 0 || dimensions.y == 0 || dimensions.x > max || dimensions.y > max {
            return Err(UpdateError::Failed(format!(
                "Surface of {}x{} is not supported (max size {}).",
                dimensions.x, dimensions.y, max
            )));
        }

        if let Some(old) = handle.name.take() {
            ctx.unbind(handle.resource)?;
            ctx.visitor().delete_surface(old)?;
        }

        let name = ctx
            .visitor()
            .create_surface(dimensions, content.params.depth_buffer)?;
        handle.name = Some(name);
        Ok(String::new())
    }

    fn destroy_impl(&self, ctx: &mut OpenGLContext, handle: SurfaceObject) -> Result<()> {
        if let Some(name) = handle.name {
            ctx.unbind(handle.resource)?;
            ctx.visitor().delete_surface(name)?;
        }

        Ok(())
    }
}

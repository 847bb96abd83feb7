//! The seam between resource drivers and a concrete graphics API.
//!
//! A `Visitor` exposes the small set of bind/allocate/upload/delete primitives that the
//! drivers are written against. Every method of a visitor is only ever invoked on the
//! context thread, while its context is current. The `SurfaceFactory` is the platform
//! side that creates the offscreen context the visitor talks to.

pub mod capabilities;
pub mod headless;

use cgmath::Vector2;

use crate::errors::*;
use crate::resource::buffer::{BufferTarget, BufferUsage};
use crate::resource::shader::UniformValue;
use crate::resource::texture::{Comparison, TextureFilter, TextureFormat, TextureRegion, TextureWrap};

use self::capabilities::Capabilities;

/// Name of an object living inside the graphics context.
pub type ObjectName = u32;

/// A single sampling parameter of a texture object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureParameter {
    Filter(TextureFilter),
    Wrap(TextureWrap),
    Anisotropy(f32),
    MipmapRange(u32, u32),
    DepthCompare(Option<Comparison>),
    BorderColor([f32; 4]),
}

pub trait Visitor: Send {
    fn capabilities(&self) -> Capabilities;

    fn make_current(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
    fn destroy(&mut self) -> Result<()>;

    fn create_texture(&mut self) -> Result<ObjectName>;
    fn bind_texture(&mut self, unit: usize, texture: Option<ObjectName>) -> Result<()>;
    fn texture_parameter(&mut self, texture: ObjectName, param: TextureParameter) -> Result<()>;
    fn texture_image(
        &mut self,
        texture: ObjectName,
        format: TextureFormat,
        dimensions: Vector2<u32>,
        data: Option<&[u8]>,
    ) -> Result<()>;
    fn texture_sub_image(
        &mut self,
        texture: ObjectName,
        format: TextureFormat,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<()>;
    fn delete_texture(&mut self, texture: ObjectName) -> Result<()>;

    fn create_buffer(&mut self) -> Result<ObjectName>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<ObjectName>) -> Result<()>;
    fn buffer_data(&mut self, target: BufferTarget, usage: BufferUsage, data: &[u8]) -> Result<()>;
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> Result<()>;
    fn delete_buffer(&mut self, buffer: ObjectName) -> Result<()>;

    /// Compiles and links a program. Compilation failures are reported with the info
    /// log of the compiler.
    fn create_program(&mut self, vs: &str, fs: &str) -> Result<ObjectName>;
    fn use_program(&mut self, program: Option<ObjectName>) -> Result<()>;
    fn uniform(&mut self, program: ObjectName, name: &str, value: &UniformValue) -> Result<()>;
    fn delete_program(&mut self, program: ObjectName) -> Result<()>;

    fn create_surface(&mut self, dimensions: Vector2<u32>, depth: bool) -> Result<ObjectName>;
    fn bind_surface(&mut self, surface: Option<ObjectName>) -> Result<()>;
    fn delete_surface(&mut self, surface: ObjectName) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// Creates the offscreen context owned by the context thread.
pub trait SurfaceFactory: Send {
    /// Called once, on the context thread, before any task runs.
    fn create_offscreen_context(&mut self) -> Result<Box<dyn Visitor>>;

    /// Called on the context thread after the offscreen context has been destroyed.
    fn destroy(&mut self) {}
}

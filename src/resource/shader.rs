//! Shader programs and their uniform variables.

use std::collections::BTreeMap;

use cgmath::{Matrix4, Vector2, Vector3, Vector4};

use super::driver::{ResourceDriver, UpdateError};
use super::{Content, ResourceId, ResourceKind};
use crate::backends::ObjectName;
use crate::context::{Binding, OpenGLContext};
use crate::errors::*;
use crate::utils::hash::FastHashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    I32(i32),
    F32(f32),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix4(Matrix4<f32>),
}

/// What changed since the last successful update.
#[derive(Debug, Clone, Default)]
pub struct ShaderDirty {
    /// The program must be compiled again.
    pub source: bool,
    pub uniforms: FastHashSet<String>,
}

pub struct ShaderContent {
    vs: String,
    fs: String,
    uniforms: BTreeMap<String, UniformValue>,
    dirty: ShaderDirty,
}

impl ShaderContent {
    #[inline]
    pub fn vertex_source(&self) -> &str {
        &self.vs
    }

    #[inline]
    pub fn fragment_source(&self) -> &str {
        &self.fs
    }

    #[inline]
    pub fn uniforms(&self) -> &BTreeMap<String, UniformValue> {
        &self.uniforms
    }

    #[inline]
    pub fn dirty(&self) -> &ShaderDirty {
        &self.dirty
    }
}

impl Content for ShaderContent {
    fn is_dirty(&self) -> bool {
        self.dirty.source || !self.dirty.uniforms.is_empty()
    }

    fn needs_full_update(&self) -> bool {
        self.dirty.source
    }

    fn clear_dirty(&mut self) {
        self.dirty = ShaderDirty::default();
    }

    fn invalidate(&mut self) {
        self.dirty.source = true;
    }
}

impl_resource!(Shader, ShaderContent, ResourceKind::Shader);

impl Shader {
    pub fn new<T1, T2>(vs: T1, fs: T2) -> Self
    where
        T1: Into<String>,
        T2: Into<String>,
    {
        Shader::from_content(ShaderContent {
            vs: vs.into(),
            fs: fs.into(),
            uniforms: BTreeMap::new(),
            dirty: ShaderDirty {
                source: true,
                uniforms: FastHashSet::default(),
            },
        })
    }

    /// Replaces the sources. The program is compiled again at the next update.
    pub fn set_source<T1, T2>(&self, vs: T1, fs: T2)
    where
        T1: Into<String>,
        T2: Into<String>,
    {
        let (vs, fs) = (vs.into(), fs.into());
        self.shared.modify(|c| {
            let changed = c.vs != vs || c.fs != fs;
            if changed {
                c.vs = vs;
                c.fs = fs;
                c.dirty.source = true;
            }

            (changed, ())
        })
    }

    pub fn set_uniform<T: Into<String>>(&self, name: T, value: UniformValue) {
        let name = name.into();
        self.shared.modify(|c| {
            if c.uniforms.get(&name) == Some(&value) {
                return (false, ());
            }

            c.uniforms.insert(name.clone(), value);
            if !c.dirty.source {
                c.dirty.uniforms.insert(name);
            }

            (true, ())
        })
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.shared.read(|c| c.uniforms.get(name).cloned())
    }
}

pub struct ShaderObject {
    resource: ResourceId,
    program: Option<ObjectName>,
}

impl ShaderObject {
    #[inline]
    pub fn program(&self) -> Option<ObjectName> {
        self.program
    }

    fn binding(&self, program: ObjectName) -> Binding {
        Binding {
            resource: self.resource,
            object: program,
        }
    }
}

pub struct ShaderDriver;

impl ShaderDriver {
    fn push_uniforms<'a, I>(
        ctx: &mut OpenGLContext,
        handle: &ShaderObject,
        program: ObjectName,
        uniforms: I,
    ) -> Result<()>
    where
        I: Iterator<Item = (&'a String, &'a UniformValue)>,
    {
        let mut uniforms = uniforms.peekable();
        if uniforms.peek().is_none() {
            return Ok(());
        }

        let previous = ctx.state().shader();
        ctx.bind_shader(Some(handle.binding(program)))?;
        for (name, value) in uniforms {
            ctx.visitor().uniform(program, name, value)?;
        }

        ctx.bind_shader(previous)
    }
}

impl ResourceDriver for ShaderDriver {
    type Content = ShaderContent;
    type Handle = ShaderObject;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Shader
    }

    fn allocate(
        &self,
        ctx: &mut OpenGLContext,
        id: ResourceId,
        _: &ShaderContent,
    ) -> ::std::result::Result<ShaderObject, UpdateError> {
        if !ctx.capabilities().glsl {
            return Err(UpdateError::Unsupported("GLSL is not supported.".into()));
        }

        Ok(ShaderObject {
            resource: id,
            program: None,
        })
    }

    fn update(
        &self,
        ctx: &mut OpenGLContext,
        content: &mut ShaderContent,
        handle: &mut ShaderObject,
        full: bool,
    ) -> ::std::result::Result<String, UpdateError> {
        if full || handle.program.is_none() {
            if content.vs.trim().is_empty() || content.fs.trim().is_empty() {
                return Err(UpdateError::Failed("Shader source is empty.".into()));
            }

            let program = ctx
                .visitor()
                .create_program(&content.vs, &content.fs)
                .map_err(|err| match err {
                    Error::Backend(log) => UpdateError::Failed(format!("Failed to compile shader:\n{}", log)),
                    err => UpdateError::from(err),
                })?;

            if let Some(old) = handle.program.replace(program) {
                ctx.unbind(handle.resource)?;
                ctx.visitor().delete_program(old)?;
            }

            Self::push_uniforms(ctx, handle, program, content.uniforms.iter())?;
        } else if let Some(program) = handle.program {
            let dirty = &content.dirty.uniforms;
            let changed = content.uniforms.iter().filter(|&(k, _)| dirty.contains(k));
            Self::push_uniforms(ctx, handle, program, changed)?;
        }

        Ok(String::new())
    }

    fn destroy_impl(&self, ctx: &mut OpenGLContext, handle: ShaderObject) -> Result<()> {
        if let Some(program) = handle.program {
            ctx.unbind(handle.resource)?;
            ctx.visitor().delete_program(program)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resource::{Resource, Status};

    #[test]
    fn dirty_uniforms() {
        let shader = Shader::new("vs", "fs");
        shader.shared.lock().content.clear_dirty();
        shader.shared.lock().status = Status::Ready;

        shader.set_uniform("color", UniformValue::F32(1.0));
        shader.set_uniform("scale", UniformValue::I32(2));
        assert_eq!(shader.status(), Status::Dirty);
        assert_eq!(shader.uniform("scale"), Some(UniformValue::I32(2)));
        assert!(shader.shared.read(|c| !c.needs_full_update() && c.dirty().uniforms.len() == 2));

        shader.shared.lock().content.clear_dirty();
        shader.shared.lock().status = Status::Ready;
        shader.set_uniform("scale", UniformValue::I32(2));
        shader.set_source("vs", "fs");
        assert_eq!(shader.status(), Status::Ready);

        shader.set_source("vs", "fs2");
        assert!(shader.shared.read(|c| c.needs_full_update()));
        assert_eq!(shader.shared.read(|c| c.fragment_source().to_owned()), "fs2");
    }
}

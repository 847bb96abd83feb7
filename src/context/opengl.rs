use super::state::{Binding, ContextState};
use crate::backends::capabilities::Capabilities;
use crate::backends::{ObjectName, Visitor};
use crate::errors::*;
use crate::resource::buffer::BufferTarget;
use crate::resource::ResourceId;

/// The offscreen graphics context owned by the context thread.
///
/// The binding helpers keep track of what is bound, and only call into the backend
/// when the binding actually changes.
pub struct OpenGLContext {
    visitor: Box<dyn Visitor>,
    capabilities: Capabilities,
    state: ContextState,
    current: bool,
}

impl OpenGLContext {
    pub fn new(visitor: Box<dyn Visitor>) -> Self {
        let capabilities = visitor.capabilities();
        let state = ContextState::new(capabilities.max_texture_units);

        OpenGLContext {
            visitor,
            capabilities,
            state,
            current: false,
        }
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[inline]
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    #[inline]
    pub fn is_current(&self) -> bool {
        self.current
    }

    /// Raw access to the backend. Bindings must go through the tracked helpers.
    #[inline]
    pub fn visitor(&mut self) -> &mut dyn Visitor {
        &mut *self.visitor
    }

    /// Makes the context current on the calling thread if it is not yet.
    pub(crate) fn make_current(&mut self) -> Result<()> {
        if !self.current {
            self.visitor.make_current()?;
            self.current = true;
        }

        Ok(())
    }

    pub(crate) fn release(&mut self) -> Result<()> {
        if self.current {
            self.visitor.release()?;
            self.current = false;
        }

        Ok(())
    }

    pub(crate) fn destroy(&mut self) -> Result<()> {
        self.release()?;
        self.visitor.destroy()
    }

    pub fn bind_texture(&mut self, unit: usize, binding: Option<Binding>) -> Result<()> {
        if unit >= self.state.texture_units() {
            return Err(Error::Backend(format!(
                "Texture unit {} exceeds the {} available.",
                unit,
                self.state.texture_units()
            )));
        }

        if self.state.texture(unit) != binding {
            self.visitor.bind_texture(unit, object(binding))?;
            self.state.set_texture(unit, binding);
        }

        Ok(())
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, binding: Option<Binding>) -> Result<()> {
        if self.state.buffer(target) != binding {
            self.visitor.bind_buffer(target, object(binding))?;
            self.state.set_buffer(target, binding);
        }

        Ok(())
    }

    pub fn bind_shader(&mut self, binding: Option<Binding>) -> Result<()> {
        if self.state.shader() != binding {
            self.visitor.use_program(object(binding))?;
            self.state.set_shader(binding);
        }

        Ok(())
    }

    pub fn bind_surface(&mut self, binding: Option<Binding>) -> Result<()> {
        if self.state.surface() != binding {
            self.visitor.bind_surface(object(binding))?;
            self.state.set_surface(binding);
        }

        Ok(())
    }

    /// Unbinds `resource` from every binding point it is bound to.
    pub fn unbind(&mut self, resource: ResourceId) -> Result<()> {
        for unit in self.state.texture_units_of(resource) {
            self.bind_texture(unit, None)?;
        }

        for &target in &[BufferTarget::Array, BufferTarget::Element] {
            if bound_to(self.state.buffer(target), resource) {
                self.bind_buffer(target, None)?;
            }
        }

        if bound_to(self.state.shader(), resource) {
            self.bind_shader(None)?;
        }

        if bound_to(self.state.surface(), resource) {
            self.bind_surface(None)?;
        }

        Ok(())
    }

    #[inline]
    pub fn flush(&mut self) -> Result<()> {
        self.visitor.flush()
    }
}

#[inline]
fn object(binding: Option<Binding>) -> Option<ObjectName> {
    binding.map(|v| v.object)
}

#[inline]
fn bound_to(binding: Option<Binding>, resource: ResourceId) -> bool {
    binding.map(|v| v.resource) == Some(resource)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backends::headless::{Call, HeadlessVisitor, Recorder};
    use std::sync::Arc;

    fn context() -> (OpenGLContext, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::new());
        let visitor = HeadlessVisitor::new(Capabilities::default(), recorder.clone());
        (OpenGLContext::new(Box::new(visitor)), recorder)
    }

    #[test]
    fn make_current_once() {
        let (mut ctx, recorder) = context();
        assert!(!ctx.is_current());

        ctx.make_current().unwrap();
        ctx.make_current().unwrap();
        assert!(ctx.is_current());
        assert_eq!(recorder.count(|v| *v == Call::MakeCurrent), 1);

        ctx.destroy().unwrap();
        assert!(!ctx.is_current());
        assert_eq!(recorder.calls(), vec![Call::MakeCurrent, Call::Release, Call::Destroy]);
    }

    #[test]
    fn redundant_binds() {
        let (mut ctx, recorder) = context();
        ctx.make_current().unwrap();

        let binding = Some(Binding {
            resource: ResourceId::new(),
            object: 1,
        });

        ctx.bind_texture(2, binding).unwrap();
        ctx.bind_texture(2, binding).unwrap();
        ctx.bind_shader(binding).unwrap();
        ctx.bind_shader(binding).unwrap();
        assert_eq!(recorder.count(Call::is_resource_call), 2);
        assert!(ctx.bind_texture(64, binding).is_err());

        ctx.unbind(binding.unwrap().resource).unwrap();
        assert_eq!(ctx.state().texture(2), None);
        assert_eq!(ctx.state().shader(), None);
        assert_eq!(recorder.count(Call::is_resource_call), 4);
    }
}

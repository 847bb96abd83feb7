use smallvec::SmallVec;

use crate::backends::ObjectName;
use crate::resource::buffer::BufferTarget;
use crate::resource::ResourceId;

/// A GPU object bound to a binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub resource: ResourceId,
    pub object: ObjectName,
}

/// What is currently bound inside the context. Private to the context thread.
#[derive(Debug, Clone, Default)]
pub struct ContextState {
    textures: SmallVec<[Option<Binding>; 8]>,
    array_buffer: Option<Binding>,
    element_buffer: Option<Binding>,
    shader: Option<Binding>,
    surface: Option<Binding>,
}

impl ContextState {
    pub fn new(texture_units: usize) -> Self {
        let mut state = ContextState::default();
        state.textures.resize(texture_units, None);
        state
    }

    #[inline]
    pub fn texture_units(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn texture(&self, unit: usize) -> Option<Binding> {
        self.textures.get(unit).cloned().and_then(|v| v)
    }

    #[inline]
    pub fn buffer(&self, target: BufferTarget) -> Option<Binding> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::Element => self.element_buffer,
        }
    }

    #[inline]
    pub fn shader(&self) -> Option<Binding> {
        self.shader
    }

    #[inline]
    pub fn surface(&self) -> Option<Binding> {
        self.surface
    }

    /// Units where `resource` is bound.
    pub fn texture_units_of(&self, resource: ResourceId) -> SmallVec<[usize; 8]> {
        self.textures
            .iter()
            .enumerate()
            .filter(|&(_, v)| v.map(|b| b.resource) == Some(resource))
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn set_texture(&mut self, unit: usize, binding: Option<Binding>) {
        if unit < self.textures.len() {
            self.textures[unit] = binding;
        }
    }

    pub(crate) fn set_buffer(&mut self, target: BufferTarget, binding: Option<Binding>) {
        match target {
            BufferTarget::Array => self.array_buffer = binding,
            BufferTarget::Element => self.element_buffer = binding,
        }
    }

    pub(crate) fn set_shader(&mut self, binding: Option<Binding>) {
        self.shader = binding;
    }

    pub(crate) fn set_surface(&mut self, binding: Option<Binding>) {
        self.surface = binding;
    }
}

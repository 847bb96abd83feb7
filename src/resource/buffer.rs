//! Vertex and index buffers.

use std::ops::Range;

use smallvec::SmallVec;

use super::driver::{ResourceDriver, UpdateError};
use super::{Content, ResourceId, ResourceKind};
use crate::backends::ObjectName;
use crate::context::{Binding, OpenGLContext};
use crate::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferTarget {
    /// Vertex attributes.
    Array,
    /// Vertex indices.
    Element,
}

/// Hint of how often the buffer data will be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferParams {
    pub target: BufferTarget,
    pub usage: BufferUsage,
}

impl Default for BufferParams {
    fn default() -> Self {
        BufferParams {
            target: BufferTarget::Array,
            usage: BufferUsage::Static,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BufferDirty {
    pub full: bool,
    pub ranges: SmallVec<[Range<usize>; 4]>,
}

pub struct BufferContent {
    params: BufferParams,
    data: Vec<u8>,
    dirty: BufferDirty,
}

impl BufferContent {
    #[inline]
    pub fn params(&self) -> &BufferParams {
        &self.params
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn dirty(&self) -> &BufferDirty {
        &self.dirty
    }
}

impl Content for BufferContent {
    fn is_dirty(&self) -> bool {
        self.dirty.full || !self.dirty.ranges.is_empty()
    }

    fn needs_full_update(&self) -> bool {
        self.dirty.full
    }

    fn clear_dirty(&mut self) {
        self.dirty = BufferDirty::default();
    }

    fn invalidate(&mut self) {
        self.dirty.full = true;
    }
}

impl_resource!(Buffer, BufferContent, ResourceKind::Buffer);

impl Buffer {
    pub fn new(params: BufferParams, data: Vec<u8>) -> Self {
        Buffer::from_content(BufferContent {
            params,
            data,
            dirty: BufferDirty {
                full: true,
                ranges: SmallVec::new(),
            },
        })
    }

    pub fn params(&self) -> BufferParams {
        self.shared.read(|c| c.params)
    }

    pub fn len(&self) -> usize {
        self.shared.read(|c| c.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole buffer.
    pub fn set_data(&self, data: Vec<u8>) {
        self.shared.modify(|c| {
            c.data = data;
            c.dirty.full = true;
            c.dirty.ranges.clear();
            (true, ())
        })
    }

    /// Overwrites the bytes starting at `offset`. The buffer does not grow.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.shared.modify(|c| {
            let end = match offset.checked_add(bytes.len()) {
                Some(end) if end <= c.data.len() => end,
                _ => {
                    let err = Error::Invalid(format!(
                        "Write of {} bytes at {} exceeds the buffer of {} bytes.",
                        bytes.len(),
                        offset,
                        c.data.len()
                    ));
                    return (false, Err(err));
                }
            };

            if bytes.is_empty() {
                return (false, Ok(()));
            }

            c.data[offset..end].copy_from_slice(bytes);
            if !c.dirty.full {
                c.dirty.ranges.push(offset..end);
            }

            (true, Ok(()))
        })
    }
}

/// Sorts `ranges` and merges the overlapping or adjacent ones.
fn merge(ranges: &[Range<usize>]) -> SmallVec<[Range<usize>; 4]> {
    let mut sorted: SmallVec<[Range<usize>; 4]> = ranges.iter().cloned().collect();
    sorted.sort_by_key(|v| v.start);

    let mut merged: SmallVec<[Range<usize>; 4]> = SmallVec::new();
    for range in sorted {
        if let Some(last) = merged.last_mut() {
            if range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        }

        merged.push(range);
    }

    merged
}

pub struct BufferObject {
    resource: ResourceId,
    name: ObjectName,
    len: Option<usize>,
}

pub struct BufferDriver;

impl ResourceDriver for BufferDriver {
    type Content = BufferContent;
    type Handle = BufferObject;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    fn allocate(
        &self,
        ctx: &mut OpenGLContext,
        id: ResourceId,
        _: &BufferContent,
    ) -> ::std::result::Result<BufferObject, UpdateError> {
        if !ctx.capabilities().vertex_buffers {
            return Err(UpdateError::Unsupported(
                "Vertex buffer objects are not supported.".into(),
            ));
        }

        let name = ctx.visitor().create_buffer()?;
        Ok(BufferObject {
            resource: id,
            name,
            len: None,
        })
    }

    fn update(
        &self,
        ctx: &mut OpenGLContext,
        content: &mut BufferContent,
        handle: &mut BufferObject,
        full: bool,
    ) -> ::std::result::Result<String, UpdateError> {
        if content.data.is_empty() {
            return Err(UpdateError::Failed("Buffer has no data.".into()));
        }

        let whole = full || content.dirty.full || handle.len != Some(content.data.len());
        if !whole && content.dirty.ranges.is_empty() {
            return Ok(String::new());
        }

        let target = content.params.target;
        let previous = ctx.state().buffer(target);
        let binding = Binding {
            resource: handle.resource,
            object: handle.name,
        };

        ctx.bind_buffer(target, Some(binding))?;

        if whole {
            ctx.visitor()
                .buffer_data(target, content.params.usage, &content.data)?;
            handle.len = Some(content.data.len());
        } else {
            for range in merge(&content.dirty.ranges) {
                let offset = range.start;
                ctx.visitor()
                    .buffer_sub_data(target, offset, &content.data[range])?;
            }
        }

        ctx.bind_buffer(target, previous)?;
        Ok(String::new())
    }

    fn destroy_impl(&self, ctx: &mut OpenGLContext, handle: BufferObject) -> Result<()> {
        ctx.unbind(handle.resource)?;
        ctx.visitor().delete_buffer(handle.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merge_ranges() {
        assert!(merge(&[]).is_empty());
        assert_eq!(&merge(&[4..6, 0..2, 1..3, 6..7])[..], &[0..3, 4..7]);
        assert_eq!(&merge(&[0..8, 2..4])[..], &[0..8]);
    }

    #[test]
    fn writes() {
        let buffer = Buffer::new(BufferParams::default(), vec![0; 8]);
        buffer.shared.lock().content.clear_dirty();

        buffer.write(2, &[1, 2]).unwrap();
        assert!(buffer.write(7, &[1, 2]).is_err());
        buffer.write(8, &[]).unwrap();
        assert!(buffer.write(usize::max_value(), &[1]).is_err());
        assert!(buffer.write(9, &[]).is_err());

        buffer.shared.read(|c| {
            assert_eq!(c.data(), &[0, 0, 1, 2, 0, 0, 0, 0]);
            assert_eq!(&c.dirty().ranges[..], &[2..4]);
            assert!(!c.needs_full_update());
        });

        buffer.set_data(vec![1; 4]);
        assert_eq!(buffer.len(), 4);
        assert!(buffer.shared.read(|c| c.dirty().full && c.dirty().ranges.is_empty()));
    }
}

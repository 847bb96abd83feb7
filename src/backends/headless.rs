//! A backend without any graphics API behind it.
//!
//! The headless visitor hands out object names and records every call into a shared
//! `Recorder`, which makes it useful to run the framework in tests and on machines
//! without a display. Faults could be injected through the recorder to simulate
//! transient failures of the underlying implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use cgmath::Vector2;

use super::capabilities::Capabilities;
use super::{ObjectName, SurfaceFactory, TextureParameter, Visitor};
use crate::errors::*;
use crate::resource::buffer::{BufferTarget, BufferUsage};
use crate::resource::shader::UniformValue;
use crate::resource::texture::{TextureFormat, TextureRegion};
use crate::utils::hash::FastHashSet;

/// A call into the headless backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    MakeCurrent,
    Release,
    Destroy,
    CreateTexture(ObjectName),
    BindTexture(usize, Option<ObjectName>),
    TextureParameter(ObjectName, TextureParameter),
    TextureImage(ObjectName, TextureFormat, Vector2<u32>),
    TextureSubImage(ObjectName, TextureRegion),
    DeleteTexture(ObjectName),
    CreateBuffer(ObjectName),
    BindBuffer(BufferTarget, Option<ObjectName>),
    BufferData(BufferTarget, usize),
    BufferSubData(BufferTarget, usize, usize),
    DeleteBuffer(ObjectName),
    CreateProgram(ObjectName),
    UseProgram(Option<ObjectName>),
    Uniform(ObjectName, String),
    DeleteProgram(ObjectName),
    CreateSurface(ObjectName, Vector2<u32>),
    BindSurface(Option<ObjectName>),
    DeleteSurface(ObjectName),
    Flush,
}

impl Call {
    /// Checks if this call changes or uploads anything, as opposed to context handling.
    pub fn is_resource_call(&self) -> bool {
        match *self {
            Call::MakeCurrent | Call::Release | Call::Destroy | Call::Flush => false,
            _ => true,
        }
    }
}

/// The journal shared between a headless backend and its observers.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    live: Mutex<FastHashSet<ObjectName>>,
    owner: Mutex<Option<ThreadId>>,
    foreign_calls: AtomicUsize,
    current: AtomicUsize,
    max_current: AtomicUsize,
    out_of_memory: AtomicBool,
    lost: AtomicBool,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    /// Returns a copy of the recorded calls.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Counts the recorded calls that satisfy `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Call) -> bool,
    {
        self.calls.lock().unwrap().iter().filter(|v| predicate(v)).count()
    }

    /// Forgets the recorded calls.
    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// The number of objects that have been created but not deleted yet.
    pub fn live_objects(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// The number of calls that were made from a thread other than the one which made
    /// the context current.
    pub fn foreign_calls(&self) -> usize {
        self.foreign_calls.load(Ordering::SeqCst)
    }

    /// The highest number of threads that held the context current at the same time.
    pub fn max_current(&self) -> usize {
        self.max_current.load(Ordering::SeqCst)
    }

    /// Makes every following upload fail as if the implementation ran out of memory.
    pub fn set_out_of_memory(&self, oom: bool) {
        self.out_of_memory.store(oom, Ordering::SeqCst);
    }

    /// Simulates a lost device. Querying the capabilities of a context panics the way a
    /// crashing driver would.
    pub fn set_lost(&self, lost: bool) {
        self.lost.store(lost, Ordering::SeqCst);
    }

    fn push(&self, call: Call) {
        let owner = *self.owner.lock().unwrap();
        if owner.is_some() && owner != Some(thread::current().id()) {
            self.foreign_calls.fetch_add(1, Ordering::SeqCst);
        }

        self.calls.lock().unwrap().push(call);
    }

    fn upload(&self) -> Result<()> {
        if self.out_of_memory.load(Ordering::SeqCst) {
            Err(Error::Backend("out of memory".into()))
        } else {
            Ok(())
        }
    }

    fn alive(&self, name: ObjectName) {
        self.live.lock().unwrap().insert(name);
    }

    fn dead(&self, name: ObjectName) -> Result<()> {
        if self.live.lock().unwrap().remove(&name) {
            Ok(())
        } else {
            Err(Error::Backend(format!("object {} does not exist", name)))
        }
    }
}

pub struct HeadlessVisitor {
    capabilities: Capabilities,
    recorder: Arc<Recorder>,
    next: ObjectName,
}

impl HeadlessVisitor {
    pub fn new(capabilities: Capabilities, recorder: Arc<Recorder>) -> Self {
        HeadlessVisitor {
            capabilities,
            recorder,
            next: 0,
        }
    }

    fn create(&mut self) -> ObjectName {
        self.next += 1;
        self.recorder.alive(self.next);
        self.next
    }
}

/// Simulates the compiler: sources containing an `#error` directive fail to compile.
fn compile(source: &str) -> Result<()> {
    for (i, line) in source.lines().enumerate() {
        if let Some(pos) = line.find("#error") {
            let message = line[pos + "#error".len()..].trim();
            return Err(Error::Backend(format!("0:{}: error: {}", i + 1, message)));
        }
    }

    Ok(())
}

impl Visitor for HeadlessVisitor {
    fn capabilities(&self) -> Capabilities {
        if self.recorder.lost.load(Ordering::SeqCst) {
            panic!("device lost");
        }

        self.capabilities.clone()
    }

    fn make_current(&mut self) -> Result<()> {
        *self.recorder.owner.lock().unwrap() = Some(thread::current().id());
        let holders = self.recorder.current.fetch_add(1, Ordering::SeqCst) + 1;
        if holders > self.recorder.max_current.load(Ordering::SeqCst) {
            self.recorder.max_current.store(holders, Ordering::SeqCst);
        }

        self.recorder.push(Call::MakeCurrent);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.recorder.push(Call::Release);
        self.recorder.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.recorder.push(Call::Destroy);
        Ok(())
    }

    fn create_texture(&mut self) -> Result<ObjectName> {
        let name = self.create();
        self.recorder.push(Call::CreateTexture(name));
        Ok(name)
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<ObjectName>) -> Result<()> {
        if unit >= self.capabilities.max_texture_units {
            return Err(Error::Backend(format!("texture unit {} out of range", unit)));
        }

        self.recorder.push(Call::BindTexture(unit, texture));
        Ok(())
    }

    fn texture_parameter(&mut self, texture: ObjectName, param: TextureParameter) -> Result<()> {
        self.recorder.push(Call::TextureParameter(texture, param));
        Ok(())
    }

    fn texture_image(
        &mut self,
        texture: ObjectName,
        format: TextureFormat,
        dimensions: Vector2<u32>,
        data: Option<&[u8]>,
    ) -> Result<()> {
        self.recorder.upload()?;
        if let Some(bytes) = data {
            if bytes.len() != format.size(dimensions) {
                return Err(Error::Backend("invalid texture data length".into()));
            }
        }

        self.recorder
            .push(Call::TextureImage(texture, format, dimensions));
        Ok(())
    }

    fn texture_sub_image(
        &mut self,
        texture: ObjectName,
        format: TextureFormat,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<()> {
        self.recorder.upload()?;
        if data.len() != format.size(region.size) {
            return Err(Error::Backend("invalid texture data length".into()));
        }

        self.recorder.push(Call::TextureSubImage(texture, region));
        Ok(())
    }

    fn delete_texture(&mut self, texture: ObjectName) -> Result<()> {
        self.recorder.dead(texture)?;
        self.recorder.push(Call::DeleteTexture(texture));
        Ok(())
    }

    fn create_buffer(&mut self) -> Result<ObjectName> {
        let name = self.create();
        self.recorder.push(Call::CreateBuffer(name));
        Ok(name)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<ObjectName>) -> Result<()> {
        self.recorder.push(Call::BindBuffer(target, buffer));
        Ok(())
    }

    fn buffer_data(&mut self, target: BufferTarget, _: BufferUsage, data: &[u8]) -> Result<()> {
        self.recorder.upload()?;
        self.recorder.push(Call::BufferData(target, data.len()));
        Ok(())
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) -> Result<()> {
        self.recorder.upload()?;
        self.recorder
            .push(Call::BufferSubData(target, offset, data.len()));
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: ObjectName) -> Result<()> {
        self.recorder.dead(buffer)?;
        self.recorder.push(Call::DeleteBuffer(buffer));
        Ok(())
    }

    fn create_program(&mut self, vs: &str, fs: &str) -> Result<ObjectName> {
        compile(vs)?;
        compile(fs)?;

        let name = self.create();
        self.recorder.push(Call::CreateProgram(name));
        Ok(name)
    }

    fn use_program(&mut self, program: Option<ObjectName>) -> Result<()> {
        self.recorder.push(Call::UseProgram(program));
        Ok(())
    }

    fn uniform(&mut self, program: ObjectName, name: &str, _: &UniformValue) -> Result<()> {
        self.recorder.push(Call::Uniform(program, name.to_owned()));
        Ok(())
    }

    fn delete_program(&mut self, program: ObjectName) -> Result<()> {
        self.recorder.dead(program)?;
        self.recorder.push(Call::DeleteProgram(program));
        Ok(())
    }

    fn create_surface(&mut self, dimensions: Vector2<u32>, _: bool) -> Result<ObjectName> {
        let name = self.create();
        self.recorder.push(Call::CreateSurface(name, dimensions));
        Ok(name)
    }

    fn bind_surface(&mut self, surface: Option<ObjectName>) -> Result<()> {
        self.recorder.push(Call::BindSurface(surface));
        Ok(())
    }

    fn delete_surface(&mut self, surface: ObjectName) -> Result<()> {
        self.recorder.dead(surface)?;
        self.recorder.push(Call::DeleteSurface(surface));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.recorder.push(Call::Flush);
        Ok(())
    }
}

/// Creates `HeadlessVisitor`s sharing one `Recorder`.
pub struct HeadlessFactory {
    capabilities: Capabilities,
    recorder: Arc<Recorder>,
    unavailable: bool,
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        HeadlessFactory::new(Capabilities::default())
    }
}

impl HeadlessFactory {
    pub fn new(capabilities: Capabilities) -> Self {
        HeadlessFactory {
            capabilities,
            recorder: Arc::new(Recorder::new()),
            unavailable: false,
        }
    }

    /// A factory that fails to create any context.
    pub fn unavailable() -> Self {
        let mut factory = HeadlessFactory::default();
        factory.unavailable = true;
        factory
    }

    #[inline]
    pub fn recorder(&self) -> Arc<Recorder> {
        self.recorder.clone()
    }
}

impl SurfaceFactory for HeadlessFactory {
    fn create_offscreen_context(&mut self) -> Result<Box<dyn Visitor>> {
        if self.unavailable {
            return Err(Error::Backend("no offscreen context available".into()));
        }

        let visitor = HeadlessVisitor::new(self.capabilities.clone(), self.recorder.clone());
        Ok(Box::new(visitor))
    }
}

extern crate cgmath;
extern crate env_logger;
extern crate ferox;

use std::sync::Arc;

use cgmath::Vector2;
use ferox::backends::TextureParameter;
use ferox::prelude::*;

fn framework(capabilities: Capabilities) -> (Framework, Arc<Recorder>) {
    let _ = env_logger::try_init();

    let factory = HeadlessFactory::new(capabilities);
    let recorder = factory.recorder();

    let mut params = FrameworkParams::default();
    params.gc_interval = None;

    let framework = Framework::new(params, factory, Drivers::default()).unwrap();
    (framework, recorder)
}

fn texture(format: TextureFormat, width: u32, height: u32) -> Texture {
    let mut params = TextureParams::default();
    params.format = format;
    params.dimensions = Vector2::new(width, height);

    let data = vec![0; format.size(params.dimensions)];
    Texture::new(params, Some(data)).unwrap()
}

#[test]
fn texture_becomes_ready() {
    let (framework, recorder) = framework(Capabilities::default());
    let texture = texture(TextureFormat::RGBA8, 4, 4);
    assert_eq!(framework.status(&texture), Status::Dirty);

    assert_eq!(framework.update(&texture).wait(), Ok(Status::Ready));
    assert_eq!(framework.status(&texture), Status::Ready);
    assert_eq!(framework.status_message(&texture), "");

    let created = recorder.count(|v| match *v {
        Call::CreateTexture(_) => true,
        _ => false,
    });

    let uploaded = recorder.count(|v| match *v {
        Call::TextureImage(_, TextureFormat::RGBA8, _) => true,
        _ => false,
    });

    assert_eq!(created, 1);
    assert_eq!(uploaded, 1);
}

#[test]
fn unsupported_is_never_retried() {
    let mut caps = Capabilities::default();
    caps.s3tc_textures = false;

    let (framework, recorder) = framework(caps);
    let texture = texture(TextureFormat::RgbDxt1, 4, 4);

    assert_eq!(framework.update(&texture).wait(), Ok(Status::Unsupported));
    assert!(!framework.status_message(&texture).is_empty());

    assert_eq!(framework.update(&texture).wait(), Ok(Status::Unsupported));
    texture.set_filter(TextureFilter::Nearest);
    assert_eq!(framework.update(&texture).wait(), Ok(Status::Unsupported));
    assert_eq!(recorder.count(Call::is_resource_call), 0);
}

#[test]
fn clean_updates_make_no_calls() {
    let (framework, recorder) = framework(Capabilities::default());
    let texture = texture(TextureFormat::RGBA8, 8, 8);
    let buffer = Buffer::new(BufferParams::default(), vec![1; 32]);
    let shader = Shader::new("void main() {}", "void main() {}");
    shader.set_uniform("u_Scale", UniformValue::F32(2.0));

    assert_eq!(framework.update(&texture).wait(), Ok(Status::Ready));
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Ready));
    assert_eq!(framework.update(&shader).wait(), Ok(Status::Ready));

    recorder.clear();
    for _ in 0..3 {
        assert_eq!(framework.update(&texture).wait(), Ok(Status::Ready));
        assert_eq!(framework.update(&buffer).wait(), Ok(Status::Ready));
        assert_eq!(framework.update(&shader).wait(), Ok(Status::Ready));
    }

    assert_eq!(recorder.count(Call::is_resource_call), 0);
}

#[test]
fn incremental_parameters() {
    let (framework, recorder) = framework(Capabilities::default());
    let texture = texture(TextureFormat::RGBA8, 8, 8);
    framework.update(&texture).wait().unwrap();

    recorder.clear();
    texture.set_wrap(TextureWrap::Clamp);
    texture.set_wrap(TextureWrap::Clamp);
    assert_eq!(framework.status(&texture), Status::Dirty);
    assert_eq!(framework.update(&texture).wait(), Ok(Status::Ready));

    let calls = recorder.calls();
    let params: Vec<_> = calls
        .iter()
        .filter_map(|v| match *v {
            Call::TextureParameter(_, param) => Some(param),
            _ => None,
        })
        .collect();

    assert_eq!(params, vec![TextureParameter::Wrap(TextureWrap::Clamp)]);
    assert!(!calls.iter().any(|v| match *v {
        Call::TextureImage(..) => true,
        _ => false,
    }));

    // The binding of unit 0 is restored afterwards.
    assert_eq!(calls.last(), Some(&Call::BindTexture(0, None)));
}

#[test]
fn anisotropy_is_clamped() {
    let mut caps = Capabilities::default();
    caps.max_anisotropy = 4.0;

    let (framework, _) = framework(caps);
    let texture = texture(TextureFormat::RGBA8, 2, 2);
    texture.set_anisotropy(8.0);

    assert_eq!(framework.update(&texture).wait(), Ok(Status::Ready));
    assert!(framework.status_message(&texture).contains("clamped"));
}

#[test]
fn partial_uploads() {
    let (framework, recorder) = framework(Capabilities::default());
    let color = texture(TextureFormat::RGBA8, 8, 8);
    let depth = texture(TextureFormat::Depth16, 8, 8);
    framework.update(&color).wait().unwrap();
    framework.update(&depth).wait().unwrap();

    recorder.clear();
    let region = TextureRegion::new(2, 2, 2, 2);
    color.update_region(region, &[7; 16]).unwrap();
    depth.update_region(region, &[7; 8]).unwrap();
    assert_eq!(framework.update(&color).wait(), Ok(Status::Ready));
    assert_eq!(framework.update(&depth).wait(), Ok(Status::Ready));

    let sub = recorder.count(|v| match *v {
        Call::TextureSubImage(_, r) => r == region,
        _ => false,
    });

    let whole = recorder.count(|v| match *v {
        Call::TextureImage(_, TextureFormat::Depth16, _) => true,
        _ => false,
    });

    assert_eq!(sub, 1);
    assert_eq!(whole, 1);
}

#[test]
fn oversized_textures_fail() {
    let mut caps = Capabilities::default();
    caps.max_texture_size = 16;
    caps.npot_textures = false;

    let (framework, _) = framework(caps);
    let large = texture(TextureFormat::R8, 32, 32);
    let npot = texture(TextureFormat::R8, 12, 8);

    assert_eq!(framework.update(&large).wait(), Ok(Status::Error));
    assert_eq!(framework.update(&npot).wait(), Ok(Status::Error));
    assert!(!framework.status_message(&npot).is_empty());

    npot.set_data(TextureFormat::R8, Vector2::new(16, 8), None).unwrap();
    assert_eq!(framework.status(&npot), Status::Dirty);
    assert_eq!(framework.update(&npot).wait(), Ok(Status::Ready));
}

#[test]
fn transient_failures_retry_after_change() {
    let (framework, recorder) = framework(Capabilities::default());
    let buffer = Buffer::new(BufferParams::default(), vec![0; 16]);

    recorder.set_out_of_memory(true);
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Error));
    assert!(framework.status_message(&buffer).contains("out of memory"));

    recorder.set_out_of_memory(false);
    recorder.clear();
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Error));
    assert_eq!(recorder.count(Call::is_resource_call), 0);

    buffer.write(0, &[1, 2, 3]).unwrap();
    assert_eq!(framework.status(&buffer), Status::Dirty);
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Ready));
    assert_eq!(framework.status_message(&buffer), "");
}

#[test]
fn buffer_ranges() {
    let (framework, recorder) = framework(Capabilities::default());
    let mut params = BufferParams::default();
    params.target = BufferTarget::Element;
    params.usage = BufferUsage::Dynamic;

    let buffer = Buffer::new(params, vec![0; 64]);
    framework.update(&buffer).wait().unwrap();

    recorder.clear();
    buffer.write(0, &[1; 8]).unwrap();
    buffer.write(4, &[2; 8]).unwrap();
    buffer.write(32, &[3; 4]).unwrap();
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Ready));

    let ranges: Vec<_> = recorder
        .calls()
        .into_iter()
        .filter_map(|v| match v {
            Call::BufferSubData(BufferTarget::Element, offset, len) => Some((offset, len)),
            _ => None,
        })
        .collect();

    assert_eq!(ranges, vec![(0, 12), (32, 4)]);

    recorder.clear();
    buffer.set_data(vec![0; 128]);
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Ready));
    assert_eq!(
        recorder.count(|v| *v == Call::BufferData(BufferTarget::Element, 128)),
        1
    );

    let empty = Buffer::new(params, Vec::new());
    assert_eq!(framework.update(&empty).wait(), Ok(Status::Error));
}

#[test]
fn shader_compilation() {
    let (framework, recorder) = framework(Capabilities::default());
    let shader = Shader::new("void main() {}", "#error no output\nvoid main() {}");
    shader.set_uniform("u_Color", UniformValue::F32(1.0));

    assert_eq!(framework.update(&shader).wait(), Ok(Status::Error));
    assert!(framework.status_message(&shader).contains("no output"));

    shader.set_source("void main() {}", "void main() {}");
    assert_eq!(framework.update(&shader).wait(), Ok(Status::Ready));
    assert_eq!(recorder.count(|v| *v == Call::Uniform(1, "u_Color".into())), 1);

    recorder.clear();
    shader.set_uniform("u_Color", UniformValue::F32(0.5));
    shader.set_uniform("u_Scale", UniformValue::I32(3));
    assert_eq!(framework.update(&shader).wait(), Ok(Status::Ready));

    let uniforms = recorder.count(|v| match *v {
        Call::Uniform(..) => true,
        _ => false,
    });

    assert_eq!(uniforms, 2);
    assert_eq!(recorder.count(|v| match *v {
        Call::CreateProgram(_) => true,
        _ => false,
    }), 0);
}

#[test]
fn missing_capabilities() {
    let mut caps = Capabilities::default();
    caps.glsl = false;
    caps.vertex_buffers = false;
    caps.offscreen_surfaces = false;

    let (framework, _) = framework(caps);
    let shader = Shader::new("void main() {}", "void main() {}");
    let buffer = Buffer::new(BufferParams::default(), vec![0; 4]);
    let surface = Surface::new(SurfaceParams::default());

    assert_eq!(framework.update(&shader).wait(), Ok(Status::Unsupported));
    assert_eq!(framework.update(&buffer).wait(), Ok(Status::Unsupported));
    assert_eq!(framework.update(&surface).wait(), Ok(Status::Unsupported));
    assert_eq!(
        framework.flush(&surface, "render").wait(),
        Err(Error::SurfaceUnavailable(Status::Unsupported))
    );
}

#[test]
fn flush_surfaces() {
    let (framework, recorder) = framework(Capabilities::default());
    let surface = Surface::new(SurfaceParams::default());

    assert_eq!(framework.flush(&surface, "render").wait(), Ok(()));
    assert_eq!(framework.status(&surface), Status::Ready);

    let calls = recorder.calls();
    let name = calls
        .iter()
        .filter_map(|v| match *v {
            Call::CreateSurface(name, _) => Some(name),
            _ => None,
        })
        .next()
        .unwrap();

    assert!(calls.contains(&Call::BindSurface(Some(name))));
    assert_eq!(calls.last(), Some(&Call::Flush));

    // Resizing recreates the surface object.
    recorder.clear();
    surface.resize(Vector2::new(64, 64));
    assert_eq!(framework.flush(&surface, "render").wait(), Ok(()));
    assert_eq!(recorder.count(|v| *v == Call::DeleteSurface(name)), 1);
    assert_eq!(recorder.count(|v| match *v {
        Call::CreateSurface(_, dims) => dims == Vector2::new(64, 64),
        _ => false,
    }), 1);
}

#[test]
fn updates_inside_tasks() {
    let (framework, _) = framework(Capabilities::default());
    let texture = texture(TextureFormat::RG8, 2, 2);
    let t2 = texture.clone();

    let status = framework
        .queue("render", move |access: &mut HardwareAccess| {
            let status = access.update(&t2)?;
            assert!(access.ensure_context()?.is_current());
            assert_eq!(access.objects(), 1);
            Ok(status)
        })
        .wait();

    assert_eq!(status, Ok(Status::Ready));
    assert_eq!(framework.status(&texture), Status::Ready);
}

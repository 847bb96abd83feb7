extern crate env_logger;
extern crate ferox;
extern crate rand;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use ferox::prelude::*;
use rand::Rng;

fn framework_with(gc_interval: Option<u64>, drivers: Drivers) -> (Framework, Arc<Recorder>) {
    let _ = env_logger::try_init();

    let factory = HeadlessFactory::default();
    let recorder = factory.recorder();

    let mut params = FrameworkParams::default();
    params.gc_interval = gc_interval;

    let framework = Framework::new(params, factory, drivers).unwrap();
    (framework, recorder)
}

fn framework() -> (Framework, Arc<Recorder>) {
    framework_with(None, Drivers::default())
}

fn deleted_textures(recorder: &Recorder) -> usize {
    recorder.count(|v| match *v {
        Call::DeleteTexture(_) => true,
        _ => false,
    })
}

#[test]
fn destroy_at_most_once() {
    let (framework, recorder) = framework();
    let texture = Texture::new(TextureParams::default(), None).unwrap();
    framework.update(&texture).wait().unwrap();

    let n = rand::thread_rng().gen_range(4, 16);
    let barrier = Arc::new(Barrier::new(n));

    let threads: Vec<_> = (0..n)
        .map(|_| {
            let shared = framework.shared();
            let texture = texture.clone();
            let barrier = barrier.clone();

            thread::spawn(move || {
                barrier.wait();
                shared.destroy(&texture).wait()
            })
        })
        .collect();

    for v in threads {
        assert_eq!(v.join().unwrap(), Ok(()));
    }

    assert!(framework.is_destroyed(&texture));
    assert_eq!(deleted_textures(&recorder), 1);
    assert_eq!(recorder.live_objects(), 0);
}

#[test]
fn destroy_twice() {
    let (framework, recorder) = framework();
    let texture = Texture::new(TextureParams::default(), None).unwrap();
    framework.update(&texture).wait().unwrap();

    let first = framework.destroy(&texture);
    let second = framework.destroy(&texture);
    assert!(second.is_done());

    assert_eq!(first.wait(), Ok(()));
    assert_eq!(second.wait(), Ok(()));
    assert!(framework.is_destroyed(&texture));
    assert_eq!(framework.status(&texture), Status::Dirty);
    assert_eq!(framework.status_message(&texture), "");
    assert_eq!(deleted_textures(&recorder), 1);

    assert_eq!(
        framework.update(&texture).wait(),
        Err(Error::Destroyed(texture.id()))
    );
}

#[test]
fn destroy_without_twin() {
    let (framework, recorder) = framework();
    let buffer = Buffer::new(BufferParams::default(), vec![0; 4]);

    assert_eq!(framework.destroy(&buffer).wait(), Ok(()));
    assert!(framework.is_destroyed(&buffer));
    assert_eq!(recorder.count(Call::is_resource_call), 0);
}

#[test]
fn missing_driver() {
    let (framework, _) = framework_with(None, Drivers::default().without(ResourceKind::Shader));
    let shader = Shader::new("void main() {}", "void main() {}");

    assert_eq!(framework.status(&shader), Status::Unsupported);
    assert!(!framework.status_message(&shader).is_empty());
    assert_eq!(framework.update(&shader).wait(), Ok(Status::Unsupported));
    assert_eq!(
        framework.destroy(&shader).wait(),
        Err(Error::NoDriver(ResourceKind::Shader))
    );
    assert!(!framework.is_destroyed(&shader));
}

#[test]
fn concurrent_updates_and_destroys() {
    let (framework, recorder) = framework();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let shared = framework.shared();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let buffer = Buffer::new(BufferParams::default(), vec![0; 32]);

                for _ in 0..16 {
                    let offset = rng.gen_range(0, 28);
                    buffer.write(offset, &[1, 2, 3, 4]).unwrap();
                    assert_eq!(shared.update(&buffer).wait(), Ok(Status::Ready));
                }

                let futures: Vec<_> = (0..4).map(|_| shared.destroy(&buffer)).collect();
                for v in futures {
                    assert_eq!(v.wait(), Ok(()));
                }
            })
        })
        .collect();

    for v in threads {
        v.join().unwrap();
    }

    let deleted = recorder.count(|v| match *v {
        Call::DeleteBuffer(_) => true,
        _ => false,
    });

    assert_eq!(deleted, 8);
    assert_eq!(recorder.live_objects(), 0);
}

#[test]
fn collect_dropped_resources() {
    let (framework, recorder) = framework();
    let texture = Texture::new(TextureParams::default(), None).unwrap();
    let buffer = Buffer::new(BufferParams::default(), vec![0; 8]);

    framework.update(&texture).wait().unwrap();
    framework.update(&buffer).wait().unwrap();
    assert_eq!(framework.tracked(), 2);
    assert_eq!(framework.collect(), 0);

    drop(texture);
    assert_eq!(framework.collect(), 1);
    assert_eq!(framework.collect(), 0);
    framework.sync(RESOURCE_GROUP).unwrap();

    assert_eq!(framework.tracked(), 1);
    assert_eq!(deleted_textures(&recorder), 1);
    assert_eq!(recorder.live_objects(), 1);
}

#[test]
fn sweeper_collects_periodically() {
    let (framework, recorder) = framework_with(Some(5), Drivers::default());

    {
        let texture = Texture::new(TextureParams::default(), None).unwrap();
        framework.update(&texture).wait().unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while recorder.live_objects() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(recorder.live_objects(), 0);
    assert_eq!(framework.tracked(), 0);
}

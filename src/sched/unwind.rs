use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Executes `func` and captures any panic, translating that panic into a `Err` result.
/// The caller is responsible for leaving shared state consistent after a failure.
pub fn halt_unwinding<F, R>(func: F) -> thread::Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(func))
}

/// Extracts the human readable message of a panic payload.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(v) = payload.downcast_ref::<&'static str>() {
        return (*v).to_owned();
    }

    if let Some(v) = payload.downcast_ref::<String>() {
        return v.clone();
    }

    "unknown panic".to_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capture() {
        assert_eq!(halt_unwinding(|| 1).ok(), Some(1));

        let err = halt_unwinding(|| panic!("static")).unwrap_err();
        assert_eq!(payload_message(&*err), "static");

        let err = halt_unwinding(|| panic!("formatted {}", 2)).unwrap_err();
        assert_eq!(payload_message(&*err), "formatted 2");
    }
}

use crate::resource::{ResourceId, ResourceKind, Status};

#[derive(Debug, Clone, PartialEq, Fail)]
pub enum Error {
    #[fail(display = "Framework has been shut down.")]
    Shutdown,
    #[fail(display = "No driver has been registered for {:?} resources.", _0)]
    NoDriver(ResourceKind),
    #[fail(display = "Resource {} has been destroyed.", _0)]
    Destroyed(ResourceId),
    #[fail(display = "Task panicked on the context thread: {}", _0)]
    TaskPanicked(String),
    #[fail(display = "Blocking on a pending task from the context thread would never return.")]
    WouldDeadlock,
    #[fail(display = "{} must be called from the context thread.", _0)]
    NotContextThread(&'static str),
    #[fail(display = "Surface can not be activated while it is {:?}.", _0)]
    SurfaceUnavailable(Status),
    #[fail(display = "{}", _0)]
    Invalid(String),
    #[fail(display = "Backend: {}", _0)]
    Backend(String),
    #[fail(display = "Task failed: {}", _0)]
    Task(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<failure::Error> for Error {
    fn from(err: failure::Error) -> Error {
        Error::Backend(format!("{}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Invalid(format!("{}", err))
    }
}

//! Runtime configuration of a `Framework`.

use std::time::Duration;

use crate::errors::*;

/// Params of the framework and its context thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkParams {
    /// Name of the thread that owns the graphics context.
    pub thread_name: String,
    /// Stack size of the context thread in bytes. Uses the platform default if `None`.
    pub stack_size: Option<usize>,
    /// Milliseconds between two sweeps of unreachable resources. The background sweeper
    /// is disabled when this is `None`, and `FrameworkShared::collect` must be called
    /// manually.
    pub gc_interval: Option<u64>,
}

impl Default for FrameworkParams {
    fn default() -> Self {
        FrameworkParams {
            thread_name: "ferox-context".into(),
            stack_size: None,
            gc_interval: Some(250),
        }
    }
}

impl FrameworkParams {
    /// Parses params from a JSON document. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn gc_interval(&self) -> Option<Duration> {
        self.gc_interval.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn json() {
        let params = FrameworkParams::from_json(r#"{ "thread_name": "gl", "gc_interval": null }"#)
            .unwrap();
        assert_eq!(params.thread_name, "gl");
        assert_eq!(params.stack_size, None);
        assert_eq!(params.gc_interval(), None);

        let params = FrameworkParams::from_json("{}").unwrap();
        assert_eq!(params, FrameworkParams::default());
        assert_eq!(params.gc_interval(), Some(Duration::from_millis(250)));

        assert!(FrameworkParams::from_json("[").is_err());
    }
}

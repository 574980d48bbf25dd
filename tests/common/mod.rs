//! Shared test utilities for the harness integration tests.

#![allow(dead_code)]

use serialdev_harness::backend::LoopbackBackend;
use serialdev_harness::port::LoopbackPipe;
use serialdev_harness::HarnessRunner;
use std::sync::Arc;
use std::time::Duration;

pub const IO1: &str = "serialdev,loop0a,9600";
pub const IO2: &str = "serialdev,loop0b,9600";

/// Short deadline so failure-path tests stay quick.
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(150);

/// Loopback backend on `loop0a`/`loop0b` handing out at most `max_chunk`
/// bytes per read.
pub fn loopback(max_chunk: usize) -> Arc<LoopbackBackend> {
    Arc::new(LoopbackBackend::new(
        LoopbackPipe::new("loop0a", "loop0b").with_max_chunk(max_chunk),
    ))
}

/// A runner over the default loopback backend, plus the backend for inspection.
pub fn loopback_runner() -> (Arc<LoopbackBackend>, HarnessRunner) {
    let backend = Arc::new(LoopbackBackend::default());
    let runner = HarnessRunner::new(backend.clone());
    (backend, runner)
}

/// Assert nothing is left open on the pipe.
pub fn assert_released(backend: &LoopbackBackend) {
    let (a, b) = backend.pipe().paths();
    assert!(!backend.pipe().is_open(a), "{a} still open");
    assert!(!backend.pipe().is_open(b), "{b} still open");
}

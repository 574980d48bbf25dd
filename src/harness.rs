//! Scenario runner.
//!
//! A scenario opens two endpoints, runs one check between them and closes
//! both again on every exit path: success, check failure, I/O fault or a
//! panic inside the check.

use crate::backend::DeviceBackend;
use crate::config::HarnessConfig;
use crate::connection::ConnectionString;
use crate::endpoint::Endpoint;
use crate::error::{HarnessError, HarnessResult};
use crate::verify::{verify_rs485, TransferCheck};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What a scenario checks once both endpoints are open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// `payload` from io1 arrives unchanged at io2.
    Transfer { payload: Vec<u8> },
    /// Same, then back from io2 to io1.
    Exchange { payload: Vec<u8> },
    /// io1's RS-485 state, as seen through io2, formats as `expected`.
    Rs485 { expected: String },
}

/// Two descriptors and a check.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub io1: ConnectionString,
    pub io2: ConnectionString,
    pub check: Check,
}

/// Final state of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of a scenario, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub elapsed_ms: u64,
}

impl ScenarioReport {
    pub fn from_result(name: &str, result: &HarnessResult<()>, elapsed: Duration) -> Self {
        let (status, message) = match result {
            Ok(()) => (Status::Passed, None),
            Err(e) if e.is_skip() => (Status::Skipped, Some(e.to_string())),
            Err(e) => (Status::Failed, Some(e.to_string())),
        };
        Self {
            name: name.to_string(),
            status,
            message,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Runs scenarios against one backend.
#[derive(Debug, Clone)]
pub struct HarnessRunner {
    backend: Arc<dyn DeviceBackend>,
    transfer: TransferCheck,
}

impl HarnessRunner {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self {
            backend,
            transfer: TransferCheck::default(),
        }
    }

    /// Take transfer timing from configuration.
    pub fn with_config(mut self, config: &HarnessConfig) -> Self {
        self.transfer =
            TransferCheck::new(config.read_timeout()).with_poll_interval(config.poll_interval());
        self
    }

    pub fn backend(&self) -> &Arc<dyn DeviceBackend> {
        &self.backend
    }

    pub fn read_timeout(&self) -> Duration {
        self.transfer.timeout
    }

    /// Open both endpoints, run `verify`, close both.
    ///
    /// If the second open fails the first endpoint is closed before the error
    /// is returned. A panic in `verify` is reported as
    /// [`HarnessError::VerifierPanicked`] after both endpoints are closed.
    pub fn run_scenario<F>(&self, io1: &str, io2: &str, verify: F) -> HarnessResult<()>
    where
        F: FnOnce(&mut Endpoint, &mut Endpoint) -> HarnessResult<()>,
    {
        let first = Endpoint::open(self.backend.as_ref(), io1)?;
        self.run_opened(first, |backend| Endpoint::open(backend, io2), verify)
    }

    /// [`HarnessRunner::run_scenario`] with parsed descriptors.
    pub fn run_connections<F>(
        &self,
        io1: &ConnectionString,
        io2: &ConnectionString,
        verify: F,
    ) -> HarnessResult<()>
    where
        F: FnOnce(&mut Endpoint, &mut Endpoint) -> HarnessResult<()>,
    {
        let first = Endpoint::open_with(self.backend.as_ref(), io1.clone())?;
        self.run_opened(
            first,
            |backend| Endpoint::open_with(backend, io2.clone()),
            verify,
        )
    }

    fn run_opened<O, F>(&self, mut first: Endpoint, open_second: O, verify: F) -> HarnessResult<()>
    where
        O: FnOnce(&dyn DeviceBackend) -> HarnessResult<Endpoint>,
        F: FnOnce(&mut Endpoint, &mut Endpoint) -> HarnessResult<()>,
    {
        let mut second = match open_second(self.backend.as_ref()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(endpoint = first.name(), "peer failed to open, releasing");
                first.close();
                return Err(e);
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| verify(&mut first, &mut second)));

        first.close();
        second.close();

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(HarnessError::VerifierPanicked(panic_message(payload.as_ref()))),
        }
    }

    /// Fail with `EnvironmentUnavailable` unless the backend's simulator is present.
    fn require_simulation(&self) -> HarnessResult<()> {
        if self.backend.is_available() {
            return Ok(());
        }
        Err(HarnessError::EnvironmentUnavailable(format!(
            "{} simulation backend is not available",
            self.backend.name()
        )))
    }

    /// Run a prepared scenario.
    ///
    /// An RS-485 check needs the simulator; without it nothing is opened.
    pub fn run(&self, scenario: &Scenario) -> HarnessResult<()> {
        if matches!(scenario.check, Check::Rs485 { .. }) {
            self.require_simulation()?;
        }
        info!(
            scenario = %scenario.name,
            io1 = %scenario.io1,
            io2 = %scenario.io2,
            "running scenario"
        );
        let backend = Arc::clone(&self.backend);
        let transfer = self.transfer;

        self.run_connections(&scenario.io1, &scenario.io2, |io1, io2| {
            match &scenario.check {
                Check::Transfer { payload } => transfer.run(io1, io2, payload),
                Check::Exchange { payload } => {
                    transfer.run(io1, io2, payload)?;
                    transfer.run(io2, io1, payload)
                }
                Check::Rs485 { expected } => verify_rs485(backend.as_ref(), io2, expected),
            }
        })
    }

    /// Run a scenario and summarise the outcome.
    pub fn run_reported(&self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let result = self.run(scenario);
        if let Err(e) = &result {
            error!(scenario = %scenario.name, error = %e, "scenario failed");
        }
        ScenarioReport::from_result(&scenario.name, &result, started.elapsed())
    }

    /// Shorthand for a one-way transfer between two descriptors.
    pub fn transfer(&self, io1: &str, io2: &str, payload: &[u8]) -> HarnessResult<()> {
        let check = self.transfer;
        self.run_scenario(io1, io2, |a, b| check.run(a, b, payload))
    }

    /// Open both descriptors and require io1's RS-485 state, as seen through
    /// io2, to format as `expected`. Nothing is opened without the simulator.
    pub fn rs485(&self, io1: &str, io2: &str, expected: &str) -> HarnessResult<()> {
        self.require_simulation()?;
        let backend = Arc::clone(&self.backend);
        self.run_scenario(io1, io2, |_, peer| {
            verify_rs485(backend.as_ref(), peer, expected)
        })
    }

    /// Shorthand for a two-way transfer between two descriptors.
    pub fn exchange(&self, io1: &str, io2: &str, payload: &[u8]) -> HarnessResult<()> {
        let check = self.transfer;
        self.run_scenario(io1, io2, |a, b| {
            check.run(a, b, payload)?;
            check.run(b, a, payload)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

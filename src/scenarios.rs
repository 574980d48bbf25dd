//! Built-in scenarios.
//!
//! - `serial-pipe-device`: a string crosses the pipe in both directions.
//! - `rs485`: io1 is opened with `rs485=103:495`, and io2 must see it as
//!   `"103 495 enabled"`. Needs the simulation backend.

use crate::connection::{ConnectionString, SerialFormat};
use crate::enumerator::DeviceEnumerator;
use crate::error::HarnessResult;
use crate::harness::{Check, Scenario};
use crate::port::{DataBits, Parity, StopBits};
use crate::rs485::Rs485Config;
use std::fmt;
use std::str::FromStr;

/// RS-485 delays io1 is opened with.
pub const RS485_DELAYS: (u32, u32) = (103, 495);

/// What io2 should see for [`RS485_DELAYS`].
pub const RS485_EXPECTED: &str = "103 495 enabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinScenario {
    SerialPipeDevice,
    Rs485,
}

impl BuiltinScenario {
    pub const ALL: [BuiltinScenario; 2] = [Self::SerialPipeDevice, Self::Rs485];

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::SerialPipeDevice => "serial-pipe-device",
            Self::Rs485 => "rs485",
        }
    }

    /// Heading printed before the scenario runs.
    pub fn title(self) -> &'static str {
        match self {
            Self::SerialPipeDevice => "serial pipe device",
            Self::Rs485 => "RS485",
        }
    }

    pub fn requires_simulation(self) -> bool {
        matches!(self, Self::Rs485)
    }

    /// Resolve devices and build the scenario.
    ///
    /// `payload` is the data the transfer scenario sends. Device discovery
    /// happens here, so an absent simulator fails before anything is opened.
    pub fn build(
        self,
        enumerator: &DeviceEnumerator,
        require_simulation: bool,
        payload: &[u8],
    ) -> HarnessResult<Scenario> {
        let pair =
            enumerator.discover_pipe_pair(require_simulation || self.requires_simulation())?;

        let scenario = match self {
            Self::SerialPipeDevice => Scenario {
                name: self.name().to_string(),
                io1: ConnectionString::new(pair.a, SerialFormat::baud(9600)),
                io2: ConnectionString::new(pair.b, SerialFormat::baud(9600)),
                check: Check::Exchange {
                    payload: payload.to_vec(),
                },
            },
            Self::Rs485 => {
                let n81 = SerialFormat::new(9600, Parity::None, DataBits::Eight, StopBits::One);
                let (pre, post) = RS485_DELAYS;
                Scenario {
                    name: self.name().to_string(),
                    io1: ConnectionString::new(pair.a, n81)
                        .local()
                        .with_rs485(Rs485Config::enabled(pre, post)),
                    io2: ConnectionString::new(pair.b, n81),
                    check: Check::Rs485 {
                        expected: RS485_EXPECTED.to_string(),
                    },
                }
            }
        };
        Ok(scenario)
    }
}

impl FromStr for BuiltinScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown scenario '{s}', expected one of: {}", known.join(", "))
            })
    }
}

impl fmt::Display for BuiltinScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

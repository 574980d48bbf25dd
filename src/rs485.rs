//! RS-485 line configuration.
//!
//! Mirrors the kernel's `struct serial_rs485`: a transmit-enable delay before
//! and after sending plus a handful of flag bits. The harness compares the
//! configuration through its status string, `"<pre> <post> <enabled|disabled>"`.

use crate::connection::ConnectionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `SER_RS485_ENABLED`
pub const SER_RS485_ENABLED: u32 = 1 << 0;
/// `SER_RS485_RTS_ON_SEND`
pub const SER_RS485_RTS_ON_SEND: u32 = 1 << 1;
/// `SER_RS485_RTS_AFTER_SEND`
pub const SER_RS485_RTS_AFTER_SEND: u32 = 1 << 2;
/// `SER_RS485_RX_DURING_TX`
pub const SER_RS485_RX_DURING_TX: u32 = 1 << 4;
/// `SER_RS485_TERMINATE_BUS`
pub const SER_RS485_TERMINATE_BUS: u32 = 1 << 5;

const OPTION_NAMES: [(&str, u32); 4] = [
    ("rts_on_send", SER_RS485_RTS_ON_SEND),
    ("rts_after_send", SER_RS485_RTS_AFTER_SEND),
    ("rx_during_tx", SER_RS485_RX_DURING_TX),
    ("terminate_bus", SER_RS485_TERMINATE_BUS),
];

/// RS-485 configuration of one serial line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rs485Config {
    /// Delay in milliseconds between asserting RTS and sending.
    pub delay_before_send: u32,
    /// Delay in milliseconds between the last byte and releasing RTS.
    pub delay_after_send: u32,
    /// Whether RS-485 mode is on.
    pub enabled: bool,
    /// Option bits other than `SER_RS485_ENABLED`.
    options: u32,
}

impl Rs485Config {
    /// An enabled configuration with the given delays and no extra options.
    pub fn enabled(delay_before_send: u32, delay_after_send: u32) -> Self {
        Self {
            delay_before_send,
            delay_after_send,
            enabled: true,
            options: 0,
        }
    }

    /// RS-485 switched off.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build from the raw kernel representation.
    pub fn from_raw(flags: u32, delay_before_send: u32, delay_after_send: u32) -> Self {
        let known = OPTION_NAMES.iter().fold(0, |acc, (_, bit)| acc | bit);
        Self {
            delay_before_send,
            delay_after_send,
            enabled: flags & SER_RS485_ENABLED != 0,
            options: flags & known,
        }
    }

    /// Raw flag word as the kernel expects it.
    pub fn flags(&self) -> u32 {
        let enabled = if self.enabled { SER_RS485_ENABLED } else { 0 };
        enabled | self.options
    }

    /// Set or clear a single option bit.
    pub fn with_option(mut self, bit: u32, on: bool) -> Self {
        if on {
            self.options |= bit;
        } else {
            self.options &= !bit;
        }
        self
    }

    /// Whether an option bit is set.
    pub fn has_option(&self, bit: u32) -> bool {
        self.options & bit != 0
    }

    /// Parse the value of an `rs485=` connection-string modifier.
    ///
    /// Accepts `off` or `<pre>:<post>[:<option>...]`.
    pub fn parse_modifier(value: &str) -> Result<Self, ConnectionError> {
        let invalid = || ConnectionError::InvalidRs485(value.to_string());

        if value.eq_ignore_ascii_case("off") {
            return Ok(Self::disabled());
        }

        let mut fields = value.split(':');
        let pre = fields
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let post = fields
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(invalid)?;

        let mut config = Self::enabled(pre, post);
        for option in fields {
            let bit = OPTION_NAMES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(option))
                .map(|(_, bit)| *bit)
                .ok_or_else(invalid)?;
            config.options |= bit;
        }
        Ok(config)
    }

    /// The modifier value that [`Rs485Config::parse_modifier`] accepts back.
    pub fn modifier(&self) -> String {
        if !self.enabled {
            return "off".to_string();
        }
        let mut out = format!("{}:{}", self.delay_before_send, self.delay_after_send);
        for (name, bit) in OPTION_NAMES {
            if self.options & bit != 0 {
                out.push(':');
                out.push_str(name);
            }
        }
        out
    }

    /// Status string, e.g. `"103 495 enabled"`.
    pub fn status(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rs485Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.delay_before_send,
            self.delay_after_send,
            if self.enabled { "enabled" } else { "disabled" }
        )
    }
}

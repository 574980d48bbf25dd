//! `serialdev` connection strings.
//!
//! Grammar:
//!
//! ```text
//! serialdev,<device-path>,<baud>[<parity><databits><stopbits>][,<modifier>]...
//! ```
//!
//! Modifiers are `LOCAL`, `RTSCTS`, `XONXOFF` and `rs485=<pre>:<post>[:<option>...]`
//! (or `rs485=off`). A bare baud such as `9600` implies `N81`.

use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use crate::rs485::Rs485Config;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The only device class this harness drives.
pub const DEVICE_CLASS: &str = "serialdev";

static FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<baud>[0-9]+)(?:(?P<parity>[NnEeOo])(?P<data>[5-8])(?P<stop>[12]))?$")
        .expect("format regex is valid")
});

/// Why a connection string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("empty connection string")]
    Empty,

    #[error("unknown device class '{0}', expected '{DEVICE_CLASS}'")]
    UnknownClass(String),

    #[error("missing device path")]
    MissingPath,

    #[error("missing serial format")]
    MissingFormat,

    #[error("invalid serial format '{0}'")]
    InvalidFormat(String),

    #[error("invalid rs485 setting '{0}'")]
    InvalidRs485(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),
}

/// Baud rate and character framing, e.g. `9600N81`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFormat {
    pub baud: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    /// Written as a bare baud rate.
    short: bool,
}

impl SerialFormat {
    /// `baud` with the implied `N81` framing.
    pub fn baud(baud: u32) -> Self {
        Self {
            baud,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            short: true,
        }
    }

    /// Fully spelled-out framing.
    pub fn new(baud: u32, parity: Parity, data_bits: DataBits, stop_bits: StopBits) -> Self {
        Self {
            baud,
            parity,
            data_bits,
            stop_bits,
            short: false,
        }
    }
}

impl FromStr for SerialFormat {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConnectionError::InvalidFormat(s.to_string());
        let caps = FORMAT_RE.captures(s).ok_or_else(invalid)?;

        let baud: u32 = caps["baud"].parse().map_err(|_| invalid())?;
        if baud == 0 {
            return Err(invalid());
        }

        let Some(parity) = caps.name("parity") else {
            return Ok(Self::baud(baud));
        };
        let first = |name: &str| caps[name].chars().next().ok_or_else(invalid);
        let parity = parity
            .as_str()
            .chars()
            .next()
            .and_then(Parity::from_letter)
            .ok_or_else(invalid)?;
        let data_bits = DataBits::from_digit(first("data")?).ok_or_else(invalid)?;
        let stop_bits = StopBits::from_digit(first("stop")?).ok_or_else(invalid)?;
        Ok(Self::new(baud, parity, data_bits, stop_bits))
    }
}

impl fmt::Display for SerialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.baud)?;
        if !self.short {
            write!(
                f,
                "{}{}{}",
                self.parity.letter(),
                self.data_bits.digit(),
                self.stop_bits.digit()
            )?;
        }
        Ok(())
    }
}

/// A parsed, immutable `serialdev` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    path: String,
    format: SerialFormat,
    local: bool,
    flow_control: FlowControl,
    rs485: Option<Rs485Config>,
}

impl ConnectionString {
    /// Descriptor for `path` with no modifiers.
    pub fn new(path: impl Into<String>, format: SerialFormat) -> Self {
        Self {
            path: path.into(),
            format,
            local: false,
            flow_control: FlowControl::None,
            rs485: None,
        }
    }

    /// Add the `LOCAL` modifier.
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Add an `rs485=` modifier.
    pub fn with_rs485(mut self, rs485: Rs485Config) -> Self {
        self.rs485 = Some(rs485);
        self
    }

    /// Add `RTSCTS` or `XONXOFF`.
    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn format(&self) -> SerialFormat {
        self.format
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn flow_control(&self) -> FlowControl {
        self.flow_control
    }

    /// The RS-485 setting requested, if any.
    pub fn rs485(&self) -> Option<Rs485Config> {
        self.rs485
    }

    /// Line settings for opening the channel.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.format.baud,
            data_bits: self.format.data_bits,
            parity: self.format.parity,
            stop_bits: self.format.stop_bits,
            flow_control: self.flow_control,
            local: self.local,
            ..PortConfiguration::default()
        }
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConnectionError::Empty);
        }

        let mut fields = s.split(',');
        let class = fields.next().unwrap_or_default();
        if class != DEVICE_CLASS {
            return Err(ConnectionError::UnknownClass(class.to_string()));
        }

        let path = fields
            .next()
            .filter(|p| !p.is_empty())
            .ok_or(ConnectionError::MissingPath)?;
        let format: SerialFormat = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or(ConnectionError::MissingFormat)?
            .parse()?;

        let mut conn = Self::new(path, format);
        for option in fields {
            if let Some((key, value)) = option.split_once('=') {
                if key.eq_ignore_ascii_case("rs485") {
                    conn.rs485 = Some(Rs485Config::parse_modifier(value)?);
                    continue;
                }
                return Err(ConnectionError::UnknownOption(option.to_string()));
            }

            match option.to_ascii_uppercase().as_str() {
                "LOCAL" => conn.local = true,
                "RTSCTS" => conn.flow_control = FlowControl::Hardware,
                "XONXOFF" => conn.flow_control = FlowControl::Software,
                _ => return Err(ConnectionError::UnknownOption(option.to_string())),
            }
        }
        Ok(conn)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", DEVICE_CLASS, self.path, self.format)?;
        if self.local {
            f.write_str(",LOCAL")?;
        }
        match self.flow_control {
            FlowControl::Hardware => f.write_str(",RTSCTS")?,
            FlowControl::Software => f.write_str(",XONXOFF")?,
            FlowControl::None => {}
        }
        if let Some(rs485) = &self.rs485 {
            write!(f, ",rs485={}", rs485.modifier())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_rs485_descriptor() {
        let conn: ConnectionString = "serialdev,/dev/ttyX,9600N81,LOCAL,rs485=103:495"
            .parse()
            .unwrap();
        assert_eq!(conn.path(), "/dev/ttyX");
        assert_eq!(conn.format().baud, 9600);
        assert!(conn.is_local());
        assert_eq!(conn.rs485(), Some(Rs485Config::enabled(103, 495)));
        assert_eq!(
            conn.to_string(),
            "serialdev,/dev/ttyX,9600N81,LOCAL,rs485=103:495"
        );
    }

    #[test]
    fn test_bare_baud_implies_n81() {
        let conn: ConnectionString = "serialdev,/dev/ttyPipeA0,9600".parse().unwrap();
        let format = conn.format();
        assert_eq!(format.parity, Parity::None);
        assert_eq!(format.data_bits, DataBits::Eight);
        assert_eq!(format.stop_bits, StopBits::One);
        assert_eq!(conn.to_string(), "serialdev,/dev/ttyPipeA0,9600");
        assert!(conn.rs485().is_none());
    }

    #[test]
    fn test_framing_variants() {
        let format: SerialFormat = "19200e72".parse().unwrap();
        assert_eq!(format.parity, Parity::Even);
        assert_eq!(format.data_bits, DataBits::Seven);
        assert_eq!(format.stop_bits, StopBits::Two);
        assert_eq!(format.to_string(), "19200E72");
    }

    #[test]
    fn test_flow_control_modifiers() {
        let conn: ConnectionString = "serialdev,/dev/ttyS0,115200N81,rtscts".parse().unwrap();
        assert_eq!(conn.flow_control(), FlowControl::Hardware);
        assert_eq!(
            conn.port_configuration().flow_control,
            FlowControl::Hardware
        );
        assert_eq!(conn.to_string(), "serialdev,/dev/ttyS0,115200N81,RTSCTS");
    }

    #[test]
    fn test_rejects_malformed() {
        let cases = [
            ("", ConnectionError::Empty),
            (
                "telnet,host,9600",
                ConnectionError::UnknownClass("telnet".into()),
            ),
            ("serialdev", ConnectionError::MissingPath),
            ("serialdev,,9600", ConnectionError::MissingPath),
            ("serialdev,/dev/ttyS0", ConnectionError::MissingFormat),
            (
                "serialdev,/dev/ttyS0,fast",
                ConnectionError::InvalidFormat("fast".into()),
            ),
            (
                "serialdev,/dev/ttyS0,9600N9",
                ConnectionError::InvalidFormat("9600N9".into()),
            ),
            (
                "serialdev,/dev/ttyS0,0",
                ConnectionError::InvalidFormat("0".into()),
            ),
            (
                "serialdev,/dev/ttyS0,9600,BOGUS",
                ConnectionError::UnknownOption("BOGUS".into()),
            ),
            (
                "serialdev,/dev/ttyS0,9600,rs485=1",
                ConnectionError::InvalidRs485("1".into()),
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<ConnectionString>(), Err(expected), "{input:?}");
        }
    }

    #[test]
    fn test_builder_matches_parser() {
        let built = ConnectionString::new(
            "/dev/ttyPipeA0",
            SerialFormat::new(9600, Parity::None, DataBits::Eight, StopBits::One),
        )
        .local()
        .with_rs485(Rs485Config::enabled(103, 495));
        let parsed: ConnectionString = built.to_string().parse().unwrap();
        assert_eq!(built, parsed);
    }
}

//! Core traits for the channel primitive.
//!
//! Defines the `SerialPortAdapter` trait that lets real tty devices and the
//! in-process loopback pipe be driven interchangeably by an endpoint.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Line settings applied when a channel is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Ignore modem control lines (`CLOCAL`).
    pub local: bool,

    /// Read timeout.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            local: false,
            timeout: Duration::from_millis(50),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    /// Parse the digit used in a `9600N81` style format.
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '5' => Some(Self::Five),
            '6' => Some(Self::Six),
            '7' => Some(Self::Seven),
            '8' => Some(Self::Eight),
            _ => None,
        }
    }

    pub fn digit(self) -> char {
        match self {
            Self::Five => '5',
            Self::Six => '6',
            Self::Seven => '7',
            Self::Eight => '8',
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Parity {
    /// Parse the letter used in a `9600N81` style format (case-insensitive).
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Self::None),
            'O' => Some(Self::Odd),
            'E' => Some(Self::Even),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::One),
            '2' => Some(Self::Two),
            _ => None,
        }
    }

    pub fn digit(self) -> char {
        match self {
            Self::One => '1',
            Self::Two => '2',
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// An open, bidirectional byte channel.
///
/// Dropping the adapter releases the channel.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the channel.
    ///
    /// Returns the number of bytes actually written, which may be short.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes into the provided buffer.
    ///
    /// May return fewer bytes than the buffer holds. When nothing arrives
    /// within the configured timeout, returns `Ok(0)` or an error for which
    /// [`PortError::is_timeout`] is true.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the device path of this channel.
    fn name(&self) -> &str;

    /// Opaque identifier a peer can use to query this channel out-of-band.
    fn remote_id(&self) -> String;

    /// Set the read timeout for this channel.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard unread input and unsent output.
    fn clear_buffers(&mut self) -> Result<(), PortError>;

    /// Get the current bytes available to read (if supported).
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }
}

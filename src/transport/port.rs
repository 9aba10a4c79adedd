//! Serial endpoint acquisition.
//!
//! Opens a device path with the firmware's fixed 8N1 framing and splits it
//! into boxed read/write halves. The transport only ever sees the boxed
//! halves, so tests can substitute an in-memory duplex stream for real
//! hardware.

use crate::error::{JoystickLinkError, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

/// Firmware serial monitor baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Receiving half of an endpoint
pub type PortReader = Box<dyn AsyncRead + Send + Unpin>;

/// Transmitting half of an endpoint
pub type PortWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens a serial endpoint exclusively and splits it into halves.
///
/// # Errors
///
/// Returns [`JoystickLinkError::PortUnavailable`] when the device is absent,
/// already held open elsewhere, or permission is denied.
pub fn open_endpoint(path: &str, baud: u32) -> Result<(PortReader, PortWriter)> {
    debug!("Opening serial endpoint {} at {} baud", path, baud);

    let port = tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| JoystickLinkError::PortUnavailable(format!("{}: {}", path, e)))?;

    let (reader, writer) = tokio::io::split(port);
    Ok((Box::new(reader), Box::new(writer)))
}

/// Enumerates candidate endpoint identities known to the OS.
///
/// Discovery heuristics stay out of the core; callers pick one of these (the
/// binary takes the first when the configured port is empty).
pub fn available_endpoints() -> Vec<String> {
    tokio_serial::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_endpoint_invalid_path_is_port_unavailable() {
        let result = open_endpoint("/dev/nonexistent_serial_device_12345", DEFAULT_BAUD_RATE);
        assert!(result.is_err());
        match result.err().unwrap() {
            JoystickLinkError::PortUnavailable(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
            }
            other => panic!("Expected PortUnavailable, got: {:?}", other),
        }
    }

    #[test]
    fn test_default_baud_rate() {
        assert_eq!(DEFAULT_BAUD_RATE, 115_200);
    }
}

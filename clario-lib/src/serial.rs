//! Serial line setup for the reader's FTDI adapter.
//!
//! The adapter needs the `ftdi_sio` module with the reader's device id
//! added; a udev rule usually links it to `/dev/clario`. STX and CR are data
//! bytes here, so the line must be raw and 8-bit clean, which is what the
//! serialport backend sets up on open.

use crate::config::SerialConfig;
use crate::error::ClarioError;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::info;

/// Open and configure the port, discarding anything left in its buffers
pub fn open_port(serial: &SerialConfig) -> Result<SerialStream, ClarioError> {
    info!("Opening {} at {} baud", serial.path, serial.baud_rate);
    let port = tokio_serial::new(&serial.path, serial.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()?;
    port.clear(ClearBuffer::All)?;
    Ok(port)
}

use std::io::{self, Write};

use log::{debug, warn};
use serialport::{available_ports, SerialPortInfo, SerialPortType};

/// A serial device as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub name: String,
    pub description: String,
}

impl From<SerialPortInfo> for PortEntry {
    fn from(info: SerialPortInfo) -> Self {
        let description = describe(&info.port_type);
        Self {
            name: info.port_name,
            description,
        }
    }
}

/// Human-readable label for a port type.
fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let label = usb
                .product
                .as_deref()
                .or(usb.manufacturer.as_deref())
                .unwrap_or("USB Serial Device");
            format!("{} (USB VID:PID={:04X}:{:04X})", label, usb.vid, usb.pid)
        }
        SerialPortType::PciPort => "PCI serial port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

/// Finds and returns all serial ports the platform reports.
///
/// Enumeration failures are logged and reported as an empty list.
///
/// # Returns
/// A vector of port names with human-readable descriptions
pub fn list_ports() -> Vec<PortEntry> {
    let ports = available_ports().unwrap_or_else(|e| {
        warn!("Could not enumerate serial ports: {}", e);
        Vec::new()
    });
    debug!("Found {} serial port(s)", ports.len());
    ports.into_iter().map(PortEntry::from).collect()
}

/// Write the port listing in the operator-facing format.
///
/// # Arguments
/// * `ports` - the entries to list; an empty slice prints `No serial ports found.`
/// * `out` - where the listing goes, usually stdout
pub fn report_ports<W: Write>(ports: &[PortEntry], out: &mut W) -> io::Result<()> {
    if ports.is_empty() {
        return writeln!(out, "No serial ports found.");
    }
    writeln!(out, "Available serial ports:")?;
    for port in ports {
        writeln!(out, "  {} - {}", port.name, port.description)?;
    }
    Ok(())
}

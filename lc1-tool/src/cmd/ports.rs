use anyhow::Context;
use serialport::{available_ports, SerialPortType};
use tracing::info;

/// One line describing a serial port
fn describe(name: &str, port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            match &usb.serial_number {
                Some(serial) => format!(
                    "{} - {} [{:04x}:{:04x} {}]",
                    name, product, usb.vid, usb.pid, serial
                ),
                None => format!("{} - {} [{:04x}:{:04x}]", name, product, usb.vid, usb.pid),
            }
        }
        SerialPortType::PciPort => format!("{} - PCI", name),
        SerialPortType::BluetoothPort => format!("{} - Bluetooth", name),
        SerialPortType::Unknown => name.to_string(),
    }
}

pub fn run() -> anyhow::Result<()> {
    let ports = available_ports().context("failed to enumerate serial ports")?;

    if ports.is_empty() {
        info!("No serial ports found");
        return Ok(());
    }

    for port in &ports {
        println!("{}", describe(&port.port_name, &port.port_type));
    }
    Ok(())
}

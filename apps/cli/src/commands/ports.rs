//! 串口枚举命令

use anyhow::{Context, Result};

/// 列出本机串口
pub fn list_ports() -> Result<()> {
    let ports = thermo_serial::available_ports().context("枚举串口失败")?;
    if ports.is_empty() {
        println!("⚠️  未发现串口");
        return Ok(());
    }
    println!("可用串口:");
    for port in ports {
        println!("  {:<16} {}", port.name, port.description);
    }
    Ok(())
}

//! 命令定义和实现

pub mod config;
pub mod ports;
pub mod session;

pub use config::{CliConfig, ConfigCommand};
pub use ports::list_ports;
pub use session::{MotorCommand, TempCommand};

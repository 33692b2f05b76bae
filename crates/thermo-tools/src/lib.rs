//! # Thermo Tools - 会话后分析
//!
//! **依赖原则**: 不依赖 `thermo-driver`，输入是普通的 `(时间戳, 通道)` 数据
//!
//! ## 包含模块
//!
//! - `statistics` - 逐通道统计（纯函数，可选）
//!
//! ## Feature Flags
//!
//! - `default` - 无默认 features
//! - `full` - 启用所有功能（包含 statistics）
//! - `statistics` - 启用统计模块
//!
//! ## 使用示例
//!
//! ```toml
//! # apps/cli/Cargo.toml - 需要统计
//! [dependencies]
//! thermo-tools = { workspace = true, features = ["full"] }
//! ```

// ⭐ 可选模块（通过 feature flags 控制）
#[cfg(feature = "statistics")]
pub mod statistics;

#[cfg(feature = "statistics")]
pub use statistics::{ChannelStatistics, SeriesSummary};

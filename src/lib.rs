//! # checkind
//!
//! 网关 checkin 服务进程：HTTP API、`/metrics` 和后台状态上报的组装。
//! 业务逻辑在 `checkin` crate，配置与服务注册表在 `checkind-common`。

pub mod server;
pub mod trace;

pub use checkind_common::config::CheckindConfig;
pub use server::{build_app, spawn_http_server, spawn_reporter};

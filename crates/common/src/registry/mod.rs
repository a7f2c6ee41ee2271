//! 服务注册表
//!
//! 维护服务名到网络地址的映射，并为 RPC 客户端建立 tonic `Channel`。
//! 启动时从配置的 `[[registry.services]]` 加载。

mod backoff;
mod error;
mod location;
mod service_registry;

pub use backoff::DialConfig;
pub use error::RegistryError;
pub use location::ServiceLocation;
pub use service_registry::ServiceRegistry;

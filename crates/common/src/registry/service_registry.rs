//! Service registry mapping service names to network locations

use super::{DialConfig, RegistryError, ServiceLocation};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, sleep};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

/// 进程内服务注册表
///
/// 克隆共享同一份映射。写入按服务名覆盖（后写者胜）。
/// `get_connection` 每次都重新拨号，不做连接复用。
#[derive(Clone, Debug, Default)]
pub struct ServiceRegistry {
    inner: Arc<RwLock<HashMap<String, ServiceLocation>>>,
    dial: DialConfig,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with `locations`.
    pub fn with_services(locations: impl IntoIterator<Item = ServiceLocation>) -> Self {
        let map = locations
            .into_iter()
            .map(|location| (location.name.clone(), location))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
            dial: DialConfig::default(),
        }
    }

    pub fn with_dial_config(mut self, dial: DialConfig) -> Self {
        self.dial = dial;
        self
    }

    pub fn dial_config(&self) -> &DialConfig {
        &self.dial
    }

    pub async fn add_service(&self, location: ServiceLocation) {
        debug!(
            "Registering service {} at {}",
            location.name,
            location.address()
        );
        self.inner
            .write()
            .await
            .insert(location.name.clone(), location);
    }

    pub async fn add_services(&self, locations: impl IntoIterator<Item = ServiceLocation>) {
        let mut map = self.inner.write().await;
        for location in locations {
            map.insert(location.name.clone(), location);
        }
    }

    async fn lookup(&self, service: &str) -> Result<ServiceLocation, RegistryError> {
        let location = self
            .inner
            .read()
            .await
            .get(service)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(service.to_string()))?;

        if location.port == 0 {
            return Err(RegistryError::Unavailable(service.to_string()));
        }
        Ok(location)
    }

    /// `host:port` of a registered service.
    pub async fn get_service_address(&self, service: &str) -> Result<String, RegistryError> {
        Ok(self.lookup(service).await?.address())
    }

    pub async fn get_service_port(&self, service: &str) -> Result<u16, RegistryError> {
        Ok(self.lookup(service).await?.port)
    }

    /// 使用默认超时拨号
    pub async fn get_connection(&self, service: &str) -> Result<Channel, RegistryError> {
        self.get_connection_with_timeout(service, self.dial.timeout)
            .await
    }

    /// 拨号直到连接就绪或超时，失败之间按指数退避等待
    pub async fn get_connection_with_timeout(
        &self,
        service: &str,
        timeout: Duration,
    ) -> Result<Channel, RegistryError> {
        let address = self.get_service_address(service).await?;
        let endpoint = Endpoint::from_shared(format!("http://{address}")).map_err(|_| {
            RegistryError::InvalidAddress {
                service: service.to_string(),
                address: address.clone(),
            }
        })?;

        let deadline = Instant::now() + timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RegistryError::connection(
                    service,
                    format!("timed out after {timeout:?} ({} attempt(s))", attempt - 1),
                ));
            }

            let attempt_endpoint = endpoint.clone().connect_timeout(remaining);
            let dial = attempt_endpoint.connect();
            let result = match tokio::time::timeout(remaining, dial).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("timed out after {timeout:?}")),
            };

            match result {
                Ok(channel) => {
                    info!("Connected to service {} at {}", service, address);
                    return Ok(channel);
                }
                Err(reason) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(RegistryError::connection(service, reason));
                    }
                    let delay = self.dial.delay_for_attempt(attempt).min(remaining);
                    warn!(
                        "Dial to {} ({}) failed on attempt {}: {}; retrying in {:?}",
                        service, address, attempt, reason, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// 所有已注册服务名（无序）
    pub async fn list_all_services(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic_health::pb::{HealthCheckRequest, health_client::HealthClient};

    #[tokio::test]
    async fn test_address_and_port() {
        let registry = ServiceRegistry::with_services([ServiceLocation::new(
            "checkin", "localhost", 9999,
        )]);

        assert_eq!(
            registry.get_service_address("checkin").await.unwrap(),
            "localhost:9999"
        );
        assert_eq!(registry.get_service_port("checkin").await.unwrap(), 9999);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        assert!(matches!(
            registry.get_service_address("nope").await,
            Err(RegistryError::NotRegistered(_))
        ));
        assert!(matches!(
            registry.get_connection("nope").await,
            Err(RegistryError::NotRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_port_is_unavailable() {
        let registry = ServiceRegistry::with_services([ServiceLocation::new("svc", "host", 0)]);
        assert!(matches!(
            registry.get_service_port("svc").await,
            Err(RegistryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_last_write_wins() {
        let registry = ServiceRegistry::new();
        let location = ServiceLocation::new("svc", "a", 1);
        registry.add_service(location.clone()).await;
        registry.add_service(location).await;
        assert_eq!(registry.list_all_services().await, vec!["svc"]);

        registry
            .add_services([
                ServiceLocation::new("svc", "b", 2),
                ServiceLocation::new("other", "c", 3),
            ])
            .await;
        assert_eq!(registry.get_service_address("svc").await.unwrap(), "b:2");

        let mut names = registry.list_all_services().await;
        names.sort();
        assert_eq!(names, vec!["other", "svc"]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = ServiceRegistry::new();
        let clone = registry.clone();
        clone.add_service(ServiceLocation::new("svc", "h", 1)).await;
        assert!(registry.get_service_address("svc").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_connection_to_live_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (_reporter, health_service) = tonic_health::server::health_reporter();
        let server = tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(health_service)
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
        });

        let registry =
            ServiceRegistry::with_services([ServiceLocation::new("health", "127.0.0.1", port)]);
        let channel = registry.get_connection("health").await.unwrap();

        let response = HealthClient::new(channel)
            .check(HealthCheckRequest {
                service: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(response.into_inner().status, 1); // SERVING

        server.abort();
    }

    #[tokio::test]
    async fn test_get_connection_times_out_with_service_name() {
        // 绑定后立即释放，得到一个没有监听者的端口
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let registry =
            ServiceRegistry::with_services([ServiceLocation::new("ghost", "127.0.0.1", port)]);
        let started = std::time::Instant::now();
        let err = registry
            .get_connection_with_timeout("ghost", Duration::from_millis(500))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().contains("ghost"));
        match err {
            RegistryError::Connection { service, .. } => assert_eq!(service, "ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let registry =
            ServiceRegistry::with_services([ServiceLocation::new("bad", "not a host", 80)]);
        assert!(matches!(
            registry
                .get_connection_with_timeout("bad", Duration::from_millis(100))
                .await,
            Err(RegistryError::InvalidAddress { .. })
        ));
    }
}

//! checkind 主程序
//!
//! 加载配置，启动网关 checkin HTTP API 和周期性状态上报。

mod cli;
mod error;
mod observability;
mod process;

use anyhow::Context;
use checkind::{build_app, spawn_http_server, spawn_reporter};
use checkind_common::config::{CheckindConfig, fatal_errors};
use checkind_common::metrics::{REGISTERED_SERVICES, register_metrics, set_build_info};
use checkind_common::ServiceRegistry;
use clap::Parser;
use observability::init_observability;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

const SYSTEM_CONFIG_PATH: &str = "/etc/checkind/config.toml";

struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        None => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(ApplicationLauncher::run_application(&config_path))
        }
    }
}

impl ApplicationLauncher {
    /// 显式给出的路径必须存在；默认值 `config.toml` 时依次查找当前目录和系统目录
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            }
            bootstrap_error!("Provided config file not found: {:?}", provided_path);
            return Err(Error::custom(format!(
                "Config file not found: {provided_path:?}"
            )));
        }

        let fallback_paths = [
            PathBuf::from("config.toml"),
            PathBuf::from(SYSTEM_CONFIG_PATH),
        ];

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            }
        }

        bootstrap_error!("No configuration file found! Looked in:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: checkind --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 加载并验证配置；只有警告时视为成功
    fn load_config(config_path: &Path) -> Result<CheckindConfig> {
        let config = CheckindConfig::from_file(config_path).map_err(|e| {
            bootstrap_error!("❌ 配置解析失败: {}", e);
            Error::from(e)
        })?;

        if let Err(errors) = config.validate() {
            bootstrap_error!("配置验证发现问题:");
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                }
            }
            if !fatal_errors(&errors).is_empty() {
                return Err(Error::service_validation("配置验证失败，请修复上述错误"));
            }
        }

        Ok(config)
    }

    /// `checkind test <file>`
    fn test_config_file(config_path: &Path) -> Result<()> {
        Self::load_config(config_path)?;
        bootstrap_info!("✅ 配置验证通过: {:?}", config_path);
        Ok(())
    }

    async fn run_application(config_path: &Path) -> Result<()> {
        bootstrap_info!("📄 加载配置文件: {:?}", config_path);
        let config = Self::load_config(config_path)?;

        let _observability_guard = init_observability(&config)?;

        let _pid_guard = process::PidFileGuard::create(config.pid.as_deref())?;

        Self::run_services(config).await
    }

    async fn run_services(config: CheckindConfig) -> Result<()> {
        info!("🚀 启动 checkind: name={}, env={}", config.name, config.env);

        if let Err(e) = register_metrics() {
            warn!("Prometheus metrics registration warning: {}", e);
        }
        set_build_info(&config.name);

        let registry = ServiceRegistry::with_services(config.registry.services.clone())
            .with_dial_config(config.registry.dial_config());
        let services = registry.list_all_services().await;
        REGISTERED_SERVICES.set(services.len() as i64);
        for name in &services {
            if let Ok(address) = registry.get_service_address(name).await {
                info!("  - service {} at {}", name, address);
            }
        }

        let state = checkin::create_checkin_state(&config.checkin)
            .await
            .context("Failed to initialize checkin state")?;

        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(10);
        setup_ctrl_c_handler(shutdown_tx.clone());

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        if let Some(handle) = spawn_reporter(&state, &config.checkin.reporter, &shutdown_tx)
            .map_err(|e| Error::service_startup(format!("状态上报初始化失败: {e}")))?
        {
            handles.push(handle);
        }

        let bind_addr = config.bind.http.address();
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind to address '{bind_addr}'"))?;
        info!("📡 HTTP server listening on {}", listener.local_addr()?);

        handles.push(spawn_http_server(
            listener,
            build_app(state),
            shutdown_tx.clone(),
        ));

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Service task terminated unexpectedly: {}", e);
                let _ = shutdown_tx.send(());
            }
        }

        info!("🛑 checkind 已安全关闭");
        Ok(())
    }
}

fn setup_ctrl_c_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听Ctrl-C信号: {}", e);
            return;
        }
        info!("收到Ctrl-C信号，开始优雅关闭...");
        let _ = shutdown_tx.send(());
    });
}

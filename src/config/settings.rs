// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::models::session::ConcurrencyConfig;

/// 应用程序配置设置
///
/// 包含服务器、日志、指标、并发上限、编排器、运营商查询、抓取服务与号码格式等配置项
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 日志配置
    pub logging: LoggingSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 默认并发上限
    pub concurrency: ConcurrencySettings,
    /// 编排器配置
    pub orchestrator: OrchestratorSettings,
    /// 运营商查询配置
    pub lookup: LookupSettings,
    /// 抓取服务配置
    pub fetcher: FetcherSettings,
    /// 号码格式配置
    pub phone: PhoneSettings,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 默认过滤规则，`RUST_LOG` 优先
    pub filter: String,
    /// 是否输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,leadrs=debug".to_string(),
            json: false,
        }
    }
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 导出监听地址
    pub address: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "0.0.0.0:9000".to_string(),
        }
    }
}

/// 并发上限配置设置
///
/// 启动请求未携带并发配置时使用
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencySettings {
    pub simultaneous_locations: usize,
    pub simultaneous_categories: usize,
    pub simultaneous_lookups: usize,
    /// 越界值是收敛到允许范围（true）还是直接拒绝（false）
    pub clamp_out_of_range: bool,
}

impl ConcurrencySettings {
    pub fn defaults(&self) -> ConcurrencyConfig {
        ConcurrencyConfig {
            simultaneous_locations: self.simultaneous_locations,
            simultaneous_categories: self.simultaneous_categories,
            simultaneous_lookups: self.simultaneous_lookups,
        }
    }
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        let defaults = ConcurrencyConfig::default();
        Self {
            simultaneous_locations: defaults.simultaneous_locations,
            simultaneous_categories: defaults.simultaneous_categories,
            simultaneous_lookups: defaults.simultaneous_lookups,
            clamp_out_of_range: false,
        }
    }
}

/// 编排器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    /// 单个抓取任务的超时时间（秒）
    pub fetch_timeout_secs: u64,
    /// 状态读取时返回的最近日志条数
    pub log_retention: usize,
    /// 会话进入终止状态后保留的时间（秒）
    pub session_grace_period_secs: u64,
    /// 会话清理扫描间隔（秒）
    pub sweep_interval_secs: u64,
    /// 单个任务的最大重试次数
    pub max_task_retries: u32,
    /// 首次重试前的退避时间（毫秒）
    pub retry_initial_backoff_ms: u64,
}

impl OrchestratorSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.session_grace_period_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 60,
            log_retention: 200,
            session_grace_period_secs: 600,
            sweep_interval_secs: 30,
            max_task_retries: 0,
            retry_initial_backoff_ms: 500,
        }
    }
}

/// 运营商查询配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LookupSettings {
    /// 解析服务地址
    pub resolver_url: String,
    /// 每批次号码数
    pub batch_size: usize,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            resolver_url: "http://127.0.0.1:8081/v1/resolve".to_string(),
            batch_size: 10,
            request_timeout_secs: 30,
        }
    }
}

/// 抓取服务配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherSettings {
    /// 上游抓取服务地址
    pub endpoint: String,
    /// 客户端级别请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/v1/businesses".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// 号码格式配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PhoneSettings {
    /// 国家代码（不含 +）
    pub country_code: String,
    /// 本地号码长度（含前导 0）
    pub national_length: usize,
}

impl Default for PhoneSettings {
    fn default() -> Self {
        Self {
            country_code: "27".to_string(),
            national_length: 10,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `LEADRS__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::default_builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("LEADRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 只包含内置默认值的配置构建器
    pub fn default_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let d = Settings::default();
        Config::builder()
            .set_default("server.host", d.server.host)?
            .set_default("server.port", d.server.port as i64)?
            .set_default("logging.filter", d.logging.filter)?
            .set_default("logging.json", d.logging.json)?
            .set_default("metrics.enabled", d.metrics.enabled)?
            .set_default("metrics.address", d.metrics.address)?
            .set_default(
                "concurrency.simultaneous_locations",
                d.concurrency.simultaneous_locations as i64,
            )?
            .set_default(
                "concurrency.simultaneous_categories",
                d.concurrency.simultaneous_categories as i64,
            )?
            .set_default(
                "concurrency.simultaneous_lookups",
                d.concurrency.simultaneous_lookups as i64,
            )?
            .set_default(
                "concurrency.clamp_out_of_range",
                d.concurrency.clamp_out_of_range,
            )?
            .set_default(
                "orchestrator.fetch_timeout_secs",
                d.orchestrator.fetch_timeout_secs as i64,
            )?
            .set_default(
                "orchestrator.log_retention",
                d.orchestrator.log_retention as i64,
            )?
            .set_default(
                "orchestrator.session_grace_period_secs",
                d.orchestrator.session_grace_period_secs as i64,
            )?
            .set_default(
                "orchestrator.sweep_interval_secs",
                d.orchestrator.sweep_interval_secs as i64,
            )?
            .set_default(
                "orchestrator.max_task_retries",
                d.orchestrator.max_task_retries as i64,
            )?
            .set_default(
                "orchestrator.retry_initial_backoff_ms",
                d.orchestrator.retry_initial_backoff_ms as i64,
            )?
            .set_default("lookup.resolver_url", d.lookup.resolver_url)?
            .set_default("lookup.batch_size", d.lookup.batch_size as i64)?
            .set_default(
                "lookup.request_timeout_secs",
                d.lookup.request_timeout_secs as i64,
            )?
            .set_default("fetcher.endpoint", d.fetcher.endpoint)?
            .set_default(
                "fetcher.request_timeout_secs",
                d.fetcher.request_timeout_secs as i64,
            )?
            .set_default("phone.country_code", d.phone.country_code)?
            .set_default("phone.national_length", d.phone.national_length as i64)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;

/// 注册编排器使用的指标描述
pub fn describe_metrics() {
    describe_counter!(
        "scrape_sessions_started_total",
        "Number of scraping sessions started"
    );
    describe_counter!(
        "scrape_sessions_finished_total",
        "Number of scraping sessions that reached a terminal state"
    );
    describe_counter!(
        "scrape_tasks_completed_total",
        "Number of location/category tasks that succeeded"
    );
    describe_counter!(
        "scrape_tasks_failed_total",
        "Number of location/category tasks that failed"
    );
    describe_counter!(
        "provider_lookup_batches_total",
        "Number of provider lookup batches dispatched"
    );
    describe_counter!(
        "provider_lookup_batches_failed_total",
        "Number of provider lookup batches that failed"
    );
    describe_histogram!(
        "scrape_task_duration_seconds",
        Unit::Seconds,
        "Duration of a single location/category task"
    );
    describe_gauge!("scrape_sessions_active", "Number of sessions currently running or paused");
}

/// 安装 Prometheus 导出器
///
/// 地址无效或端口被占用时只记录警告，不影响服务启动。
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", settings.address, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

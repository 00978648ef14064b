// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含编排引擎依赖的纯业务逻辑：
/// - 号码规范化（phone_normalizer）：将各种格式的电话号码转换为本地格式
/// - 运营商查询（provider_lookup_service）：有界并发的批量运营商解析
/// - 日志聚合（log_aggregator）：会话日志的写入与读取侧截断
/// - 工作规划（work_planner）：地点 × 类别任务展开与二维并发调度
pub mod log_aggregator;
pub mod phone_normalizer;
pub mod provider_lookup_service;
pub mod work_planner;

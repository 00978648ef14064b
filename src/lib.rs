// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 会话控制面与号码查询面的用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 抓取服务与运营商解析服务等外部协作方
pub mod engines;

/// 基础设施模块
///
/// 会话存储实现与指标导出
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 工具模块
///
/// 错误类型、日志初始化与重试策略
pub mod utils;

/// 工作器模块
///
/// 会话编排控制循环与会话清理
pub mod workers;

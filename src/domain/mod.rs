// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：会话、任务、商户与日志等核心实体
/// - 仓库接口（repositories）：会话存储抽象接口
/// - 服务（services）：号码规范化、运营商查询、日志聚合与工作规划
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;

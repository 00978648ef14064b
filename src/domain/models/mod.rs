// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 会话（session）：一次抓取运行的状态、进度与结果
/// - 任务（task）：一个地点与类别组合的工作单元
/// - 商户（business）：抓取产出的结果记录
/// - 日志条目（log_entry）：会话运行日志
pub mod business;
pub mod log_entry;
pub mod session;
pub mod task;

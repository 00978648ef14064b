// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 将领域服务与编排器组合为对外的控制面，负责请求校验与响应组装
pub mod dto;
pub mod use_cases;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 测试主模块
///
/// 编排端到端场景、HTTP 协作方以及会话 API 的集成测试
mod integration;

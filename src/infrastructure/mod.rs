// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 提供领域仓库接口的具体实现以及系统指标的注册与导出。
/// 基础设施层依赖于领域层的抽象接口，领域层不感知具体实现。
pub mod metrics;
pub mod repositories;

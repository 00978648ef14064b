// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 将会话控制面与号码查询面映射到 HTTP 端点
pub mod session_handler;

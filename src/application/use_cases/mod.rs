// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// 会话控制面（start/pause/resume/stop/status）与号码查询面
pub mod scrape_session_use_case;

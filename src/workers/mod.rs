// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供会话编排控制循环、活动会话注册表以及终止会话的后台清理
pub mod orchestrator;
pub mod session_registry;

pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorHandle, StopOutcome};
pub use session_registry::{SessionRegistry, SessionSweeper};

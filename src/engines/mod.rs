// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 外部协作方
///
/// 抓取服务与运营商解析服务的抽象，以及基于 HTTP 的实现
pub mod http_fetcher;
pub mod http_resolver;
pub mod traits;

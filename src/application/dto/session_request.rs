// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::models::session::ConcurrencyConfig;

/// 启动会话请求数据传输对象
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequestDto {
    /// 要抓取的地点列表
    #[validate(length(min = 1, message = "at least one location is required"))]
    pub locations: Vec<String>,
    /// 要抓取的商户类别列表
    #[validate(length(min = 1, message = "at least one category is required"))]
    pub categories: Vec<String>,
    /// 并发上限，缺省时使用服务端默认值
    #[serde(default)]
    pub concurrency: Option<ConcurrencyDto>,
    /// 所有任务结束后是否解析号码运营商
    #[serde(default)]
    pub resolve_providers: bool,
}

/// 并发上限，缺省字段取服务端默认值
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyDto {
    pub simultaneous_locations: Option<usize>,
    pub simultaneous_categories: Option<usize>,
    pub simultaneous_lookups: Option<usize>,
}

impl ConcurrencyDto {
    pub fn merge_into(self, defaults: ConcurrencyConfig) -> ConcurrencyConfig {
        ConcurrencyConfig {
            simultaneous_locations: self
                .simultaneous_locations
                .unwrap_or(defaults.simultaneous_locations),
            simultaneous_categories: self
                .simultaneous_categories
                .unwrap_or(defaults.simultaneous_categories),
            simultaneous_lookups: self
                .simultaneous_lookups
                .unwrap_or(defaults.simultaneous_lookups),
        }
    }
}

/// 单个号码运营商查询请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequestDto {
    #[validate(length(min = 1, message = "phone number is required"))]
    pub phone_number: String,
}

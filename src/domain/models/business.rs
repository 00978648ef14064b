// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 商户记录
///
/// 抓取任务针对某个地点与类别产出的结果，产出后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    /// 商户名称
    pub name: String,
    /// 电话号码（原始格式）
    #[serde(default)]
    pub phone: Option<String>,
    /// 地址
    #[serde(default)]
    pub address: Option<String>,
    /// 商户类别
    #[serde(default)]
    pub category: String,
    /// 所在地点
    #[serde(default)]
    pub location: String,
    /// 备注
    #[serde(default)]
    pub notes: Option<String>,
    /// 可定位引用（例如地图地址），用于导出时生成超链接
    #[serde(default)]
    pub map_url: Option<String>,
}

impl Business {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_map_url(mut self, map_url: impl Into<String>) -> Self {
        self.map_url = Some(map_url.into());
        self
    }
}

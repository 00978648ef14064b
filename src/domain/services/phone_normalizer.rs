// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

/// 电话号码规范化器
///
/// 将多种输入格式统一为解析服务使用的本地格式（以 0 开头的国内号码）。
/// 该函数是全函数：无法识别的格式在去除空白后原样返回，交由解析服务显式拒绝。
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    /// 国家代码（不含 +）
    country_code: String,
    /// 国内号码长度（含前导 0）
    national_length: usize,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new("27", 10)
    }
}

impl PhoneNormalizer {
    pub fn new(country_code: impl Into<String>, national_length: usize) -> Self {
        Self {
            country_code: country_code.into(),
            national_length,
        }
    }

    /// 规范化电话号码
    ///
    /// - `+27 68 612 8512` → `0686128512`
    /// - `27686128512` → `0686128512`（长度超过国内号码长度时）
    /// - `0686128512` → `0686128512`
    pub fn normalize(&self, input: &str) -> String {
        let compact = WHITESPACE.replace_all(input, "").into_owned();

        if let Some(rest) = compact
            .strip_prefix('+')
            .and_then(|s| s.strip_prefix(self.country_code.as_str()))
        {
            return format!("0{}", rest);
        }

        if compact.len() > self.national_length {
            if let Some(rest) = compact.strip_prefix(self.country_code.as_str()) {
                return format!("0{}", rest);
            }
        }

        compact
    }
}

/// 使用默认国家配置规范化电话号码
pub fn normalize_phone(input: &str) -> String {
    PhoneNormalizer::default().normalize(input)
}

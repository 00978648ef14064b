// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::stream::{self, StreamExt};
use metrics::counter;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::models::log_entry::LogEntry;
use crate::domain::services::phone_normalizer::PhoneNormalizer;
use crate::engines::traits::ProviderResolver;
use crate::utils::errors::OrchestratorError;

/// 未能解析的号码对应的运营商名称
pub const UNKNOWN_PROVIDER: &str = "Unknown";

/// 运营商查询配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupConfig {
    /// 同时在途的批次数上限
    pub max_concurrent_batches: usize,
    /// 每批次号码数上限
    pub batch_size: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 5,
            batch_size: 10,
        }
    }
}

/// 一次查询调用的结果
#[derive(Debug, Clone, Default)]
pub struct LookupOutcome {
    /// 规范化号码到运营商名称的映射
    pub providers: BTreeMap<String, String>,
    /// 查询过程产生的日志
    pub logs: Vec<LogEntry>,
    /// 批次总数
    pub batches: usize,
    /// 失败批次数
    pub failed_batches: usize,
    /// 因解析服务不可达而失败的批次数
    pub unreachable_batches: usize,
}

/// 运营商查询服务
///
/// 对号码去重后按 `batch_size` 分批，最多 `max_concurrent_batches` 个批次同时
/// 交给解析服务。失败批次相互隔离，其号码映射为 `Unknown`；只有全部批次都
/// 无法访问解析服务时才返回 `LookupUnavailable`。
#[derive(Clone)]
pub struct ProviderLookupService {
    resolver: Arc<dyn ProviderResolver>,
    normalizer: PhoneNormalizer,
    config: LookupConfig,
}

impl ProviderLookupService {
    pub fn new(
        resolver: Arc<dyn ProviderResolver>,
        normalizer: PhoneNormalizer,
        config: LookupConfig,
    ) -> Self {
        Self {
            resolver,
            normalizer,
            config: LookupConfig {
                max_concurrent_batches: config.max_concurrent_batches.max(1),
                batch_size: config.batch_size.max(1),
            },
        }
    }

    /// 以不同的批次并发上限复制一个服务实例，用于单次运行
    pub fn with_max_concurrent_batches(&self, max_concurrent_batches: usize) -> Self {
        Self::new(
            self.resolver.clone(),
            self.normalizer.clone(),
            LookupConfig {
                max_concurrent_batches,
                batch_size: self.config.batch_size,
            },
        )
    }

    pub fn config(&self) -> LookupConfig {
        self.config
    }

    pub fn normalizer(&self) -> &PhoneNormalizer {
        &self.normalizer
    }

    /// 批量查询运营商
    ///
    /// # 返回值
    ///
    /// * `Ok(HashMap)` - 规范化号码到运营商名称的映射，未解析的号码映射为 `Unknown`
    /// * `Err(OrchestratorError::LookupUnavailable)` - 所有批次都无法访问解析服务
    pub async fn lookup_providers<I, S>(
        &self,
        numbers: I,
    ) -> Result<HashMap<String, String>, OrchestratorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcome = self.resolve(numbers).await?;
        Ok(outcome.providers.into_iter().collect())
    }

    /// 查询单个号码
    ///
    /// # 返回值
    ///
    /// 返回 `(规范化号码, 运营商名称)`
    pub async fn lookup(&self, phone_number: &str) -> Result<(String, String), OrchestratorError> {
        let normalized = self.normalizer.normalize(phone_number);
        let outcome = self.resolve([normalized.as_str()]).await?;
        let provider = outcome
            .providers
            .get(&normalized)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());
        Ok((normalized, provider))
    }

    /// 执行查询并返回完整结果（含日志）
    pub async fn resolve<I, S>(&self, numbers: I) -> Result<LookupOutcome, OrchestratorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_until(numbers, &CancellationToken::new()).await
    }

    /// 执行查询，`cancel` 触发后不再等待剩余批次
    ///
    /// 无论正常结束、失败还是被取消，解析会话都会被 `cleanup` 释放一次。
    pub async fn resolve_until<I, S>(
        &self,
        numbers: I,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, OrchestratorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = numbers
            .into_iter()
            .map(|n| self.normalizer.normalize(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();

        if unique.is_empty() {
            return Ok(LookupOutcome::default());
        }

        let unique: Vec<String> = unique.into_iter().collect();
        let batches: Vec<Vec<String>> = unique
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let mut outcome = LookupOutcome {
            batches: batches.len(),
            ..Default::default()
        };
        outcome.logs.push(LogEntry::info(format!(
            "Resolving providers for {} numbers in {} batches",
            unique.len(),
            batches.len()
        )));

        let session = self
            .resolver
            .acquire()
            .await
            .map_err(|e| OrchestratorError::LookupUnavailable(e.to_string()))?;

        let results = {
            let pending = stream::iter(batches.into_iter().enumerate())
                .map(|(index, batch)| {
                    let session = &session;
                    async move {
                        let result = session.resolve_batch(&batch).await;
                        (index, batch, result)
                    }
                })
                .buffer_unordered(self.config.max_concurrent_batches)
                .collect::<Vec<_>>();

            tokio::select! {
                results = pending => Some(results),
                _ = cancel.cancelled() => None,
            }
        };

        session.cleanup().await;

        let Some(results) = results else {
            return Err(OrchestratorError::LookupUnavailable(
                "lookup cancelled".to_string(),
            ));
        };

        let mut last_error = None;
        for (index, batch, result) in results {
            counter!("provider_lookup_batches_total").increment(1);
            match result {
                Ok(resolved) => {
                    let resolved: HashMap<String, String> = resolved
                        .into_iter()
                        .map(|(phone, provider)| (self.normalizer.normalize(&phone), provider))
                        .collect();
                    for number in batch {
                        let provider = resolved
                            .get(&number)
                            .cloned()
                            .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());
                        outcome.providers.insert(number, provider);
                    }
                }
                Err(e) => {
                    counter!("provider_lookup_batches_failed_total").increment(1);
                    warn!("Provider lookup batch {} failed: {}", index, e);
                    outcome.failed_batches += 1;
                    if e.is_unreachable() {
                        outcome.unreachable_batches += 1;
                        last_error = Some(e.to_string());
                    }
                    outcome.logs.push(LogEntry::error(format!(
                        "Provider lookup batch {} failed ({} numbers): {}",
                        index + 1,
                        batch.len(),
                        e
                    )));
                    for number in batch {
                        outcome
                            .providers
                            .insert(number, UNKNOWN_PROVIDER.to_string());
                    }
                }
            }
        }

        if outcome.unreachable_batches == outcome.batches {
            return Err(OrchestratorError::LookupUnavailable(
                last_error.unwrap_or_else(|| "resolver unreachable".to_string()),
            ));
        }

        let resolved = outcome
            .providers
            .values()
            .filter(|p| p.as_str() != UNKNOWN_PROVIDER)
            .count();
        info!(
            "Resolved {} of {} numbers ({} failed batches)",
            resolved,
            outcome.providers.len(),
            outcome.failed_batches
        );
        outcome.logs.push(LogEntry::success(format!(
            "Resolved providers for {} of {} numbers",
            resolved,
            outcome.providers.len()
        )));

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "provider_lookup_service_test.rs"]
mod tests;

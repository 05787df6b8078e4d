// fallback.rs — 有序回退链
// 依次尝试每个策略，第一个成功的结果胜出；失败会被记录下来，全部失败时一并报告

use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

/// 回退链中的一个策略
#[async_trait]
pub trait Strategy: Send + Sync {
    type Output: Send;

    /// 策略名称，用于日志和错误信息
    fn name(&self) -> String;

    async fn attempt(&self) -> Result<Self::Output>;
}

/// 单个失败的尝试
#[derive(Debug, Clone)]
pub struct Failure {
    pub strategy: String,
    pub reason: String,
}

/// 回退链的成功结果
#[derive(Debug)]
pub struct Resolved<T> {
    pub value: T,
    /// 成功的策略名
    pub strategy: String,
    /// 之前失败的策略
    pub failures: Vec<Failure>,
}

/// 按顺序执行策略，返回第一个成功的结果
///
/// `what` 描述整条链的目的，只出现在错误信息里
pub async fn first_success<'a, T: Send>(
    what: &str,
    strategies: &[Box<dyn Strategy<Output = T> + 'a>],
) -> Result<Resolved<T>> {
    let mut failures = Vec::new();

    for strategy in strategies {
        let name = strategy.name();
        debug!("{what}: trying {name}");
        match strategy.attempt().await {
            Ok(value) => {
                return Ok(Resolved {
                    value,
                    strategy: name,
                    failures,
                });
            }
            Err(e) => {
                warn!("{what}: {name} failed: {e}");
                failures.push(Failure {
                    strategy: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let attempts = if failures.is_empty() {
        "no strategies configured".to_string()
    } else {
        failures
            .iter()
            .map(|f| format!("{}: {}", f.strategy, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    };
    Err(Error::Exhausted {
        what: what.to_string(),
        attempts,
    })
}

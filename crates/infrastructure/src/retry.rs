//! 瞬时错误重试
//!
//! 第 n 次失败后等待 `base_delay * n * (1 + jitter * U(-0.5, 0.5))` 再试，
//! 最多执行 `max_attempts` 次；不可重试的错误立即返回。

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tracing::{error, warn};

use quant_ingest_common::{IngestError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// 抖动系数，取值 [0, 1]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// 不等待，测试用
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 0.0)
    }

    /// 各次重试前的等待时长，共 `max_attempts - 1` 个
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        let jitter = self.jitter.clamp(0.0, 1.0);
        (1..self.max_attempts.max(1)).map(move |attempt| {
            let factor = 1.0 + jitter * (rand::random::<f64>() - 0.5);
            base.mul_f64(attempt as f64 * factor)
        })
    }
}

/// 按自定义判定重试
pub async fn retry_if<T, F, Fut, P>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
    is_retryable: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&IngestError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let attempts = AtomicU32::new(0);

    let action = || {
        attempts.fetch_add(1, Ordering::SeqCst);
        op()
    };
    let condition = |e: &IngestError| {
        let attempt = attempts.load(Ordering::SeqCst);
        let retryable = is_retryable(e);
        if retryable && attempt < max_attempts {
            warn!("{} 第 {}/{} 次尝试失败: {}", op_name, attempt, max_attempts, e);
        }
        retryable
    };

    let result = RetryIf::spawn(policy.delays(), action, condition).await;
    if let Err(e) = &result {
        error!(
            "{} 失败 (共尝试 {} 次): {}",
            op_name,
            attempts.load(Ordering::SeqCst),
            e
        );
    }
    result
}

/// 只重试 [`IngestError::is_transient`] 的错误
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_if(policy, op_name, op, IngestError::is_transient).await
}

use std::future::Future;
use std::time::Instant;

use tracing::info;

/// 执行 future 并记录耗时
pub async fn log_elapsed<F: Future>(name: &str, fut: F) -> F::Output {
    let started = Instant::now();
    let output = fut.await;
    info!("⏱ {} 完成, 耗时={}ms", name, started.elapsed().as_millis());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_elapsed_passes_output_through() {
        let value = log_elapsed("加法", async { 1 + 2 }).await;
        assert_eq!(value, 3);
    }
}

use backon::{ExponentialBuilder, Retryable};
use kangas_launcher_core::{LauncherError, ReadinessConfig, ServiceEndpoint};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Retry strategy derived from the readiness settings. Attempts are capped
/// so that the schedule alone cannot outlast the overall timeout by much.
fn create_retry_strategy(config: &ReadinessConfig) -> ExponentialBuilder {
    let max_attempts = (config.timeout_ms / config.min_delay_ms.max(1)).max(1) as usize;

    let mut retry_builder = ExponentialBuilder::default()
        .with_min_delay(config.min_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(max_attempts);

    if config.use_jitter {
        retry_builder = retry_builder.with_jitter();
    }

    retry_builder
}

/// Wait until the frontend of `endpoint` accepts TCP connections
pub async fn wait_until_ready(
    endpoint: &ServiceEndpoint,
    config: &ReadinessConfig,
) -> Result<(), LauncherError> {
    let address = endpoint.frontend_address();
    let target = address.as_str();
    let started = tokio::time::Instant::now();

    let connect = move || async move { TcpStream::connect(target).await.map(drop) };
    let attempts = connect
        .retry(create_retry_strategy(config))
        .notify(|e: &std::io::Error, delay: Duration| {
            debug!(
                address = %target,
                error = %e,
                delay = ?delay,
                "Frontend not accepting connections yet"
            );
        });

    match tokio::time::timeout(config.timeout(), attempts).await {
        Ok(Ok(())) => {
            info!(address = %address, elapsed = ?started.elapsed(), "Frontend is ready");
            Ok(())
        }
        Ok(Err(_)) | Err(_) => Err(LauncherError::ReadinessTimeout {
            address,
            waited: started.elapsed(),
        }),
    }
}

//! Retry/failover executor for remote generation calls
//!
//! Attempts the primary operation up to `max_retries + 1` times, strictly
//! one after another (the backend is paid and side-effecting), then runs an
//! optional degraded failover once. Exhausting both escalates to
//! [`Error::Unrecoverable`] carrying both causes.

use futures::future::BoxFuture;
use std::future::Future;
use studio_common::{Error, ErrorKind, Result};

/// Recovery bookkeeping reported with every successful execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryMetrics {
    pub failover_used: bool,
    /// Failed primary attempts before the result was obtained
    pub retries: u32,
}

#[derive(Debug)]
pub struct Recovered<T> {
    pub result: T,
    pub metrics: RecoveryMetrics,
}

/// Passed to the progress callback between primary attempts
#[derive(Debug)]
pub struct RetryNotice<'a> {
    pub operation: &'a str,
    /// Attempt that just failed (1-based)
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a Error,
}

#[derive(Debug, Clone, Copy)]
pub struct FailoverExecutor {
    max_retries: u32,
}

impl Default for FailoverExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FailoverExecutor {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `primary` with retries, then `failover` once if supplied
    ///
    /// Credential failures are returned immediately: retrying with a
    /// rejected key only burns quota.
    pub async fn execute<'a, T, P, PFut, N>(
        &self,
        operation: &str,
        mut primary: P,
        failover: Option<BoxFuture<'a, Result<T>>>,
        mut on_retry: N,
    ) -> Result<Recovered<T>>
    where
        P: FnMut() -> PFut,
        PFut: Future<Output = Result<T>>,
        N: FnMut(&RetryNotice<'_>),
    {
        let max_attempts = self.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match primary().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(Recovered {
                        result,
                        metrics: RecoveryMetrics {
                            failover_used: false,
                            retries: attempt - 1,
                        },
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Primary attempt failed"
                    );

                    if err.kind() == ErrorKind::Credential {
                        return Err(err);
                    }

                    if attempt < max_attempts {
                        on_retry(&RetryNotice {
                            operation,
                            attempt,
                            max_attempts,
                            error: &err,
                        });
                    }
                    last_error = Some(err);
                }
            }
        }

        let primary_error = last_error
            .unwrap_or_else(|| Error::Internal(format!("{}: no primary attempt ran", operation)));

        let Some(failover) = failover else {
            tracing::error!(
                operation,
                error = %primary_error,
                "Primary attempts exhausted, no failover available"
            );
            return Err(primary_error);
        };

        tracing::warn!(operation, "Primary attempts exhausted, invoking failover");

        match failover.await {
            Ok(result) => Ok(Recovered {
                result,
                metrics: RecoveryMetrics {
                    failover_used: true,
                    retries: self.max_retries,
                },
            }),
            Err(failover_error) => {
                tracing::error!(
                    operation,
                    primary_error = %primary_error,
                    failover_error = %failover_error,
                    "Failover failed, operation unrecoverable"
                );
                Err(Error::Unrecoverable {
                    operation: operation.to_string(),
                    primary: primary_error.to_string(),
                    failover: failover_error.to_string(),
                })
            }
        }
    }
}

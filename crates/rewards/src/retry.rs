// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};

use crate::errors::DistributionError;

/// Fixed-delay retry settings for a single remote call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one. Zero means try once.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Sleep between attempts.
    #[serde(with = "humantime_serde", default = "default_delay")]
    pub delay: Duration,
}

fn default_retries() -> u32 {
    3
}

fn default_delay() -> Duration {
    Duration::from_secs(2)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: default_retries(), delay: default_delay() }
    }
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy { retries: 0, delay: Duration::ZERO };

    /// Runs `op` until it succeeds, fails with a non-transient error, or the attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, DistributionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DistributionError>>,
    {
        let attempts = self.retries + 1;
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("`{operation}` succeeded on attempt {attempt}/{attempts}");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if self.retries == 0 {
                return Err(err);
            }
            if attempt >= attempts {
                return Err(DistributionError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                    source: Box::new(err),
                });
            }

            tracing::warn!(
                "`{operation}` failed (attempt {attempt}/{attempts}), retrying in {:?}: {err:?}",
                self.delay
            );
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

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

use async_trait::async_trait;
use auto_impl::auto_impl;

/// Delivery of run summaries to operators.
#[async_trait]
#[auto_impl(&, Arc, Box)]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, "{subject}: {body}");
        Ok(())
    }
}

/// Sends to every recipient. Delivery failures are logged and never returned.
pub async fn notify_all(notifier: &dyn Notifier, recipients: &[String], subject: &str, body: &str) {
    for to in recipients {
        if let Err(err) = notifier.send(to, subject, body).await {
            tracing::warn!("Failed to notify {to}: {err:?}");
        }
    }
}

use crate::adapters::audit_log::AuditLog;
use crate::core::filter::{FilterDecision, LinkFilter};
use crate::core::purchase::PurchaseSequencer;
use crate::core::queue::{Delivery, EventReceiver};
use crate::domain::model::PurchaseOutcome;
use crate::utils::error::{BotError, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// worker 結束的原因
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerExit {
    /// 佇列已關閉或收到取消
    Drained,
    /// 完成了一筆購買
    Purchased(PurchaseOutcome),
}

/// worker 共用的處理元件
pub struct WorkerContext {
    pub filter: LinkFilter,
    pub sequencer: PurchaseSequencer,
    pub audit_log: Arc<AuditLog>,
}

impl WorkerContext {
    /// 處理一則事件：作者檢查 → 稽核日誌 → URL 過濾 → 購買
    pub async fn handle(&self, worker_id: usize, delivery: &Delivery) -> Result<Option<PurchaseOutcome>> {
        let event = delivery.event();

        if !self.filter.is_tracked(event) {
            tracing::debug!("[worker {}] We don't care about this user's post", worker_id);
            return Ok(None);
        }

        // 稽核日誌只記錄追蹤帳號，且在過濾結果出來之前寫入
        self.audit_log.append(&event.raw).await?;

        let (product, url) = match self.filter.evaluate(event) {
            FilterDecision::Matched { product, url } => (product, url),
            FilterDecision::NoMatch | FilterDecision::UntrackedAuthor => return Ok(None),
        };

        tracing::info!("[worker {}] Buying {} from {}", worker_id, product.id, url);
        let report = self.sequencer.run(&product).await?;
        match &report.outcome {
            PurchaseOutcome::Completed { .. } => Ok(Some(report.outcome)),
            other => {
                tracing::info!("[worker {}] Attempt for {} ended: {:?}", worker_id, product.id, other);
                Ok(None)
            }
        }
    }
}

pub struct WorkerPool {
    tasks: JoinSet<Result<WorkerExit>>,
}

impl WorkerPool {
    pub fn spawn(
        size: usize,
        receiver: EventReceiver,
        context: Arc<WorkerContext>,
        cancel: CancellationToken,
    ) -> Self {
        let mut tasks = JoinSet::new();
        for worker_id in 0..size {
            let receiver = receiver.clone();
            let context = context.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { run_worker(worker_id, receiver, context, cancel).await });
        }
        tracing::info!("👷 Started {} workers", size);
        Self { tasks }
    }

    /// 等下一個 worker 結束；全部結束後回傳 None
    pub async fn next_exit(&mut self) -> Option<Result<WorkerExit>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.unwrap_or_else(|e| {
            Err(BotError::WorkerError {
                message: e.to_string(),
            })
        }))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn abort_all(&mut self) {
        self.tasks.abort_all();
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: EventReceiver,
    context: Arc<WorkerContext>,
    cancel: CancellationToken,
) -> Result<WorkerExit> {
    tracing::debug!("[worker {}] waiting for posts", worker_id);

    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(WorkerExit::Drained),
            delivery = receiver.recv() => match delivery {
                Some(delivery) => delivery,
                None => return Ok(WorkerExit::Drained),
            },
        };

        match context.handle(worker_id, &delivery).await {
            Ok(Some(outcome)) => return Ok(WorkerExit::Purchased(outcome)),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("❌ [worker {}] failed: {}", worker_id, e);
                return Err(e);
            }
        }
    }
}

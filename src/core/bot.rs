use crate::core::listener::QueueingListener;
use crate::core::queue::EventQueue;
use crate::core::supervisor::StreamSupervisor;
use crate::core::worker::{WorkerContext, WorkerExit, WorkerPool};
use crate::domain::model::PurchaseOutcome;
use crate::utils::error::{BotError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 整個執行的結果
#[derive(Debug, Clone, PartialEq)]
pub enum BotOutcome {
    Purchased(PurchaseOutcome),
    Cancelled,
    StreamStopped,
}

/// 串起串流監聽、佇列與 worker，並在購買成功後協調關閉
pub struct RestockBot {
    supervisor: Arc<StreamSupervisor>,
    context: Arc<WorkerContext>,
    worker_count: usize,
}

impl RestockBot {
    pub fn new(supervisor: StreamSupervisor, context: WorkerContext, worker_count: usize) -> Self {
        Self {
            supervisor: Arc::new(supervisor),
            context: Arc::new(context),
            worker_count,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<BotOutcome> {
        let shutdown = cancel.child_token();
        let (sender, receiver) = EventQueue::new();

        let mut workers = WorkerPool::spawn(
            self.worker_count,
            receiver,
            self.context.clone(),
            shutdown.clone(),
        );

        // 串流任務持有唯一的發送端；串流結束後 worker 會把剩下的事件處理完再退出
        let listener = QueueingListener::new(sender);
        let supervisor = self.supervisor.clone();
        let stream_cancel = shutdown.clone();
        let mut stream = tokio::spawn(async move { supervisor.run(&listener, stream_cancel).await });
        let mut stream_done = false;

        let result = loop {
            tokio::select! {
                exit = workers.next_exit() => match exit {
                    Some(Ok(WorkerExit::Purchased(outcome))) => break Ok(BotOutcome::Purchased(outcome)),
                    Some(Ok(WorkerExit::Drained)) => {
                        if shutdown.is_cancelled() {
                            break Ok(BotOutcome::Cancelled);
                        }
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(BotOutcome::StreamStopped),
                },
                joined = &mut stream, if !stream_done => {
                    stream_done = true;
                    match joined {
                        Ok(Ok(())) if shutdown.is_cancelled() => break Ok(BotOutcome::Cancelled),
                        Ok(Ok(())) => tracing::info!("Stream stopped, draining queued posts"),
                        Ok(Err(e)) => break Err(e),
                        Err(e) => break Err(BotError::WorkerError { message: e.to_string() }),
                    }
                }
                _ = shutdown.cancelled() => break Ok(BotOutcome::Cancelled),
            }
        };

        self.shutdown(shutdown, workers, stream, stream_done).await;
        result
    }

    async fn shutdown(
        &self,
        token: CancellationToken,
        mut workers: WorkerPool,
        stream: tokio::task::JoinHandle<Result<()>>,
        stream_done: bool,
    ) {
        tracing::info!("🛑 Shutting down: stopping stream and workers");
        token.cancel();

        if !stream_done {
            if let Err(e) = stream.await {
                tracing::warn!("⚠️ Stream task ended abnormally: {}", e);
            }
        }

        // 正在購買的 worker 不會被中斷，等它們自己結束
        while let Some(exit) = workers.next_exit().await {
            match exit {
                Ok(WorkerExit::Purchased(outcome)) => {
                    tracing::warn!("⚠️ Worker finished another purchase during shutdown: {:?}", outcome)
                }
                Ok(WorkerExit::Drained) => {}
                Err(e) => tracing::error!("❌ Worker failed during shutdown: {}", e),
            }
        }

        if let Err(e) = self.context.audit_log.flush().await {
            tracing::warn!("⚠️ Failed to flush audit log: {}", e);
        }
        tracing::info!("Shutdown complete");
    }
}

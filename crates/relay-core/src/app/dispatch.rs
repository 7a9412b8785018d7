//! Dispatch - publish 1 回分の fan-out
//!
//! # フロー
//! 1. registry から handler の snapshot を受け取る（空なら no-op）
//! 2. handler ごとに tokio タスクを spawn（兄弟 handler と並行に実行）
//! 3. 各呼び出しを `catch_unwind` で包み、`Err` も panic も隔離する
//! 4. 結果のログ・FailureSink への記録・カウントはタスク自身が行う
//! 5. 全タスクの完了を待つ（join barrier）。キャンセル時の扱いは WaitPolicy による
//!
//! # キャンセル
//! - 開始前にキャンセルされた呼び出しは skip（失敗ではない）
//! - 開始済みの handler は強制終了しない。トークンは助言的に渡すだけ
//! - ReturnOnCancel で先に戻っても、切り離された handler の失敗は記録される

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{BusConfig, WaitPolicy};
use crate::domain::{
    HandlerError, HandlerFailure, InvocationOutcome, MessageType, PublishId, PublishReport,
};
use crate::observability::BusStats;
use crate::ports::FailureSink;
use crate::typed::{HandlerEntry, HandlerSnapshot};

/// publish 1 回分のオプション。未指定の項目は BusConfig の値を使う
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
    wait_policy: Option<WaitPolicy>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 呼び出し元のキャンセルシグナル。handler には子トークンが渡る
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = Some(wait_policy);
        self
    }

    pub fn return_on_cancel(self) -> Self {
        self.with_wait_policy(WaitPolicy::ReturnOnCancel)
    }
}

pub(crate) struct Dispatcher {
    config: BusConfig,
    sink: Arc<dyn FailureSink>,
    stats: Arc<BusStats>,
}

impl Dispatcher {
    pub(crate) fn new(config: BusConfig, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            config,
            sink,
            stats: Arc::new(BusStats::new()),
        }
    }

    pub(crate) fn config(&self) -> &BusConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub(crate) async fn dispatch(
        &self,
        message_type: MessageType,
        snapshot: HandlerSnapshot,
        message: Arc<dyn Any + Send + Sync>,
        options: PublishOptions,
    ) -> PublishReport {
        let publish_id = PublishId::generate();
        let mut report = PublishReport::new(publish_id, message_type.name(), snapshot.len());

        if snapshot.is_empty() {
            debug!(
                publish_id = %publish_id,
                message_type = %message_type,
                "no subscribers; publish is a no-op"
            );
            self.stats.observe_publish(&report);
            return report;
        }

        let scope = Arc::new(InvocationScope {
            publish_id,
            message_type,
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
        });

        // timeout で呼び出し元のトークンまでキャンセルしないよう、子トークンを使う
        let cancel = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();

        if cancel.is_cancelled() {
            info!(
                publish_id = %publish_id,
                message_type = %message_type,
                handlers = snapshot.len(),
                "publish cancelled before dispatch; skipping every handler"
            );
            for entry in snapshot.iter() {
                let outcome = InvocationOutcome::Skipped;
                scope.observe(entry, &outcome);
                report.record(entry.id(), entry.name(), outcome);
            }
            self.stats.observe_publish(&report);
            return report;
        }

        let timeout = options.timeout.or_else(|| self.config.publish_timeout());
        let wait_policy = options.wait_policy.unwrap_or(self.config.wait_policy);
        let permits = self
            .config
            .max_concurrent_handlers
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut gates = Vec::with_capacity(snapshot.len());
        let mut invocations = JoinSet::new();
        for (index, entry) in snapshot.iter().cloned().enumerate() {
            let gate = Arc::new(StartGate::new());
            gates.push((entry.clone(), Arc::clone(&gate)));

            let message = Arc::clone(&message);
            let cancel = cancel.clone();
            let permits = permits.clone();
            let scope = Arc::clone(&scope);
            invocations.spawn(async move {
                let outcome = invoke(&entry, message, cancel, permits, &gate).await;
                scope.observe(&entry, &outcome);
                (index, outcome)
            });
        }
        let mut joined = vec![false; gates.len()];

        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        let mut deadline_passed = false;
        let mut detached = false;

        loop {
            tokio::select! {
                biased;

                result = invocations.join_next() => {
                    let Some(result) = result else { break };
                    match result {
                        Ok((index, outcome)) => {
                            joined[index] = true;
                            let (entry, _) = &gates[index];
                            report.record(entry.id(), entry.name(), outcome);
                        }
                        Err(join_error) => {
                            // panic は invoke 内で捕捉済み。ここに来るのは runtime 停止時だけ
                            error!(
                                publish_id = %publish_id,
                                message_type = %message_type,
                                error = %join_error,
                                "handler task did not finish"
                            );
                        }
                    }
                }

                _ = &mut deadline, if !deadline_passed => {
                    deadline_passed = true;
                    info!(
                        publish_id = %publish_id,
                        message_type = %message_type,
                        "publish timed out; cancelling handlers that have not started"
                    );
                    cancel.cancel();
                }

                _ = cancel.cancelled(), if wait_policy == WaitPolicy::ReturnOnCancel => {
                    invocations.detach_all();
                    detached = true;
                    break;
                }
            }
        }

        // join されなかった呼び出し: 未開始なら skip、開始済みなら pending
        for ((entry, gate), joined) in gates.iter().zip(&joined) {
            if *joined {
                continue;
            }
            if gate.abandon() {
                report.record(entry.id(), entry.name(), InvocationOutcome::Skipped);
            } else {
                report.pending += 1;
            }
        }
        if detached {
            info!(
                publish_id = %publish_id,
                message_type = %message_type,
                pending = report.pending,
                skipped = report.skipped,
                "publish cancelled; running handlers continue detached"
            );
        }

        self.stats.observe_publish(&report);
        report
    }
}

/// 呼び出し 1 件の結果を publish の外側へ届ける観測点
///
/// spawn したタスクが自分で呼ぶので、join されずに切り離されたタスクの
/// 失敗もログ・FailureSink・カウンタに残る。
struct InvocationScope {
    publish_id: PublishId,
    message_type: MessageType,
    sink: Arc<dyn FailureSink>,
    stats: Arc<BusStats>,
}

impl InvocationScope {
    fn observe(&self, entry: &HandlerEntry, outcome: &InvocationOutcome) {
        self.stats.observe_outcome(outcome);
        match outcome {
            InvocationOutcome::Completed => {}
            InvocationOutcome::Skipped => debug!(
                publish_id = %self.publish_id,
                message_type = %self.message_type,
                subscription_id = %entry.id(),
                handler = %entry.name(),
                "handler skipped; cancelled before start"
            ),
            InvocationOutcome::Failed(error) => {
                warn!(
                    publish_id = %self.publish_id,
                    message_type = %self.message_type,
                    subscription_id = %entry.id(),
                    handler = %entry.name(),
                    panicked = error.is_panic(),
                    error = %error,
                    "handler failed; isolated from publisher"
                );
                let failure = HandlerFailure {
                    subscription_id: entry.id(),
                    handler: entry.name().to_string(),
                    error: error.clone(),
                };
                self.sink
                    .record(self.publish_id, &self.message_type, &failure);
            }
        }
    }
}

/// 呼び出しが開始したかどうかを、タスクと dispatcher のどちらか一方だけが決める
///
/// WAITING から RUNNING / SKIPPED / ABANDONED のいずれかへ一度だけ遷移する。
struct StartGate(AtomicU8);

impl StartGate {
    const WAITING: u8 = 0;
    const RUNNING: u8 = 1;
    const SKIPPED: u8 = 2;
    const ABANDONED: u8 = 3;

    fn new() -> Self {
        Self(AtomicU8::new(Self::WAITING))
    }

    /// タスク側: handler を開始してよければ true
    fn start(&self) -> bool {
        self.transition(Self::RUNNING).is_ok()
    }

    /// タスク側: 開始前にキャンセルを観測した
    fn skip(&self) {
        let _ = self.transition(Self::SKIPPED);
    }

    /// dispatcher 側: 結果を待たずに戻る。handler が開始していなければ true
    fn abandon(&self) -> bool {
        match self.transition(Self::ABANDONED) {
            Ok(_) => true,
            Err(state) => state != Self::RUNNING,
        }
    }

    fn transition(&self, to: u8) -> Result<u8, u8> {
        self.0
            .compare_exchange(Self::WAITING, to, Ordering::AcqRel, Ordering::Acquire)
    }
}

/// handler 1 件の安全な呼び出し
async fn invoke(
    entry: &HandlerEntry,
    message: Arc<dyn Any + Send + Sync>,
    cancel: CancellationToken,
    permits: Option<Arc<Semaphore>>,
    gate: &StartGate,
) -> InvocationOutcome {
    // permit 待ちの間は「未開始」扱い
    let _permit = match permits {
        Some(permits) => tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                gate.skip();
                return InvocationOutcome::Skipped;
            }
            permit = permits.acquire_owned() => match permit {
                Ok(permit) => Some(permit),
                Err(_) => {
                    gate.skip();
                    return InvocationOutcome::Skipped;
                }
            },
        },
        None => None,
    };
    if cancel.is_cancelled() || !gate.start() {
        gate.skip();
        return InvocationOutcome::Skipped;
    }

    let handling = entry.handler().handle_dyn(message, cancel);
    match AssertUnwindSafe(handling).catch_unwind().await {
        Ok(Ok(())) => InvocationOutcome::Completed,
        Ok(Err(error)) => InvocationOutcome::Failed(error),
        Err(payload) => InvocationOutcome::Failed(HandlerError::from_panic(payload)),
    }
}

//! 재시도 큐 -- 출력 앞단의 at-least-once 전달 버퍼
//!
//! 출력이 일시적으로 실패해도 이벤트를 잃지 않도록 실패한 항목을 보관했다가
//! `retry_interval`마다 다시 보냅니다. 첫 실패 시 [`Control`]로 입력 일시정지를
//! 요청하고, 재전송이 성공하면 재개를 요청합니다.
//!
//! # 상태 전이
//! ```text
//!            queue() 첫 성공
//! Delivering ───────────────▶ Paused
//!     ▲                         │  tick마다 1건씩 시험 전송
//!     └──── resume() ◀──────────┘  성공 시
//! ```
//!
//! # 동시성
//! - 재시도 목록(`VecDeque`)은 백그라운드 루프 태스크만 소유합니다 (잠금 없음).
//! - `Paused`/`Delivering` 플래그는 원자 변수입니다.
//! - 임의의 생산자 태스크 → 루프 간 전달은 mpsc 채널이 담당합니다.
//!
//! # 유실
//! - `max_queue_size`를 넘는 항목은 버려집니다 (`-1`은 무제한, `0`은 버퍼링 없음).
//! - 종료 시 남은 항목은 버려지며 개수를 경고 로그로 남깁니다.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logship_core::error::{QueueError, Result};
use logship_core::metrics as m;
use logship_core::{BoxFuture, Control, LogEvent, Output};

/// 기본 재시도 간격
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);
/// 기본 최대 보관 항목 수
pub const DEFAULT_MAX_QUEUE_SIZE: i64 = 1000;
/// 기본 내부 채널 용량
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// 큐 항목: 인코딩 전 이벤트 또는 인코딩 후 바이트
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Event(LogEvent),
    Raw(Bytes),
}

/// 재시도 큐가 감싸는 실제 전달 대상
pub trait RetrySink: Send + Sync + 'static {
    /// 출력 타입 이름
    fn name(&self) -> &str;

    /// 항목 하나를 전달합니다. 실패하면 항목은 큐에 남습니다.
    fn deliver<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<()>>;
}

/// 재시도 큐 설정
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 재시도 주기
    pub retry_interval: Duration,
    /// 최대 보관 항목 수 (`-1` 무제한, `0` 버퍼링 없음)
    pub max_queue_size: i64,
    /// 생산자 → 루프 채널 용량
    pub channel_capacity: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// 큐의 전달 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// 정상 전달 중
    Delivering,
    /// 실패로 인해 재시도 대기 중
    Paused,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivering => write!(f, "delivering"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

const DELIVERING: u8 = 0;
const PAUSED: u8 = 1;

#[derive(Debug, Default)]
struct QueueStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    buffered: AtomicU64,
    lost: AtomicU64,
}

struct Shared<S> {
    sink: S,
    state: AtomicU8,
    control: Arc<Control>,
    cancel: CancellationToken,
    stats: QueueStats,
    max_queue_size: i64,
}

impl<S: RetrySink> Shared<S> {
    fn state(&self) -> QueueState {
        match self.state.load(Ordering::Acquire) {
            PAUSED => QueueState::Paused,
            _ => QueueState::Delivering,
        }
    }

    /// `Delivering → Paused` 전환. 실제로 전환했으면 입력 일시정지를 요청합니다.
    fn pause(&self) {
        if self
            .state
            .compare_exchange(DELIVERING, PAUSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(output = self.sink.name(), "output failing, buffering for retry");
            self.control.request_pause();
        }
    }

    /// `Paused → Delivering` 전환. 실제로 전환했으면 입력 재개를 요청합니다.
    fn resume(&self) {
        if self
            .state
            .compare_exchange(PAUSED, DELIVERING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(output = self.sink.name(), "output recovered, resuming delivery");
            self.control.request_resume();
        }
    }
}

/// 재시도 큐 핸들 (복제 가능, 백그라운드 루프와 상태 공유)
pub struct RetryQueue<S> {
    shared: Arc<Shared<S>>,
    tx: mpsc::Sender<QueueItem>,
}

impl<S> Clone for RetryQueue<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tx: self.tx.clone(),
        }
    }
}

impl<S: RetrySink> RetryQueue<S> {
    /// 큐를 만들고 백그라운드 재시도 루프를 시작합니다.
    ///
    /// 루프는 `cancel`이 발화하면 종료합니다.
    pub fn spawn(
        sink: S,
        config: RetryConfig,
        control: Arc<Control>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let shared = Arc::new(Shared {
            sink,
            state: AtomicU8::new(DELIVERING),
            control,
            cancel,
            stats: QueueStats::default(),
            max_queue_size: config.max_queue_size,
        });
        let handle = tokio::spawn(retry_loop(
            Arc::clone(&shared),
            rx,
            config.retry_interval,
        ));
        (Self { shared, tx }, handle)
    }

    /// 감싼 출력
    pub fn sink(&self) -> &S {
        &self.shared.sink
    }

    /// 현재 전달 상태
    pub fn state(&self) -> QueueState {
        self.shared.state()
    }

    /// 항목을 재시도 큐에 넣습니다.
    ///
    /// 내부 채널이 가득 차면 자리가 날 때까지 기다리며, 그 사이 취소되면
    /// [`QueueError::Cancelled`]를 반환합니다. 첫 성공 시 `Paused`로 전환하고
    /// 입력 일시정지를 요청합니다.
    pub async fn queue(&self, item: QueueItem) -> std::result::Result<(), QueueError> {
        if self.shared.max_queue_size == 0 {
            self.shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::QUEUE_DROPPED_TOTAL).increment(1);
            warn!(output = self.shared.sink.name(), "retry queue disabled, dropping item");
            return Ok(());
        }

        match self.tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => return Err(QueueError::Closed),
            Err(TrySendError::Full(item)) => {
                tokio::select! {
                    biased;
                    _ = self.shared.cancel.cancelled() => return Err(QueueError::Cancelled),
                    sent = self.tx.send(item) => sent.map_err(|_| QueueError::Closed)?,
                }
            }
        }

        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::QUEUE_ENQUEUED_TOTAL).increment(1);
        self.shared.pause();
        Ok(())
    }

    /// 이벤트 전달 진입점
    ///
    /// `Paused` 상태면 전달을 시도하지 않고 바로 큐에 넣습니다.
    /// `Delivering` 상태에서 전달이 실패하면 큐에 넣고 성공으로 처리합니다.
    pub async fn output(&self, event: LogEvent) -> Result<()> {
        self.deliver_or_queue(QueueItem::Event(event)).await
    }

    /// 인코딩된 바이트 전달 진입점 (`output`과 같은 규칙)
    pub async fn output_raw(&self, data: Bytes) -> Result<()> {
        self.deliver_or_queue(QueueItem::Raw(data)).await
    }

    async fn deliver_or_queue(&self, item: QueueItem) -> Result<()> {
        if self.state() == QueueState::Paused {
            return Ok(self.queue(item).await?);
        }
        match self.shared.sink.deliver(&item).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(output = self.shared.sink.name(), error = %e, "delivery failed, queueing");
                metrics::counter!(m::OUTPUT_ERRORS_TOTAL, m::LABEL_PLUGIN => self.shared.sink.name().to_owned())
                    .increment(1);
                Ok(self.queue(item).await?)
            }
        }
    }

    /// 출력이 스스로 전달에 성공했을 때 호출합니다. 이미 `Delivering`이면 아무 일도 없습니다.
    pub fn resume(&self) {
        self.shared.resume();
    }

    /// 재시도 목록에 보관 중인 항목 수
    pub fn buffered(&self) -> u64 {
        self.shared.stats.buffered.load(Ordering::Relaxed)
    }

    /// 큐에 들어간 항목 수 (누적)
    pub fn enqueued(&self) -> u64 {
        self.shared.stats.enqueued.load(Ordering::Relaxed)
    }

    /// 용량 초과로 버려진 항목 수 (누적)
    pub fn dropped(&self) -> u64 {
        self.shared.stats.dropped.load(Ordering::Relaxed)
    }

    /// 재전송에 성공한 항목 수 (누적)
    pub fn retried(&self) -> u64 {
        self.shared.stats.retried.load(Ordering::Relaxed)
    }

    /// 종료 시점에 전달하지 못하고 버려진 항목 수
    pub fn lost(&self) -> u64 {
        self.shared.stats.lost.load(Ordering::Relaxed)
    }
}

async fn retry_loop<S: RetrySink>(
    shared: Arc<Shared<S>>,
    mut rx: mpsc::Receiver<QueueItem>,
    interval: Duration,
) {
    let mut pending: VecDeque<QueueItem> = VecDeque::new();
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => push_bounded(&shared, &mut pending, item),
                None => break,
            },
            _ = ticker.tick() => retry_pending(&shared, &mut pending).await,
        }
    }

    while let Ok(item) = rx.try_recv() {
        pending.push_back(item);
    }
    if !pending.is_empty() {
        shared
            .stats
            .lost
            .fetch_add(pending.len() as u64, Ordering::Relaxed);
        warn!(
            output = shared.sink.name(),
            lost = pending.len(),
            "retry queue stopped with undelivered items"
        );
    }
    pending.clear();
    set_buffered(&shared, &pending);
    debug!(output = shared.sink.name(), "retry loop stopped");
}

fn push_bounded<S: RetrySink>(shared: &Shared<S>, pending: &mut VecDeque<QueueItem>, item: QueueItem) {
    let limit = shared.max_queue_size;
    if limit >= 0 && pending.len() as i64 >= limit {
        shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::QUEUE_DROPPED_TOTAL).increment(1);
        debug!(output = shared.sink.name(), limit, "retry queue full, dropping item");
        return;
    }
    pending.push_back(item);
    set_buffered(shared, pending);
}

/// 한 tick의 재시도
///
/// `Paused`면 한 건만 시험 전송하고, 성공하거나 이미 `Delivering`이면 전부 재전송합니다.
async fn retry_pending<S: RetrySink>(shared: &Shared<S>, pending: &mut VecDeque<QueueItem>) {
    if pending.is_empty() {
        return;
    }

    if shared.state() == QueueState::Paused {
        let Some(item) = pending.pop_front() else {
            return;
        };
        match shared.sink.deliver(&item).await {
            Ok(()) => {
                shared.stats.retried.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::QUEUE_RETRIED_TOTAL).increment(1);
                shared.resume();
            }
            Err(e) => {
                debug!(output = shared.sink.name(), error = %e, "retry attempt failed");
                pending.push_front(item);
                set_buffered(shared, pending);
                return;
            }
        }
    }

    while let Some(item) = pending.pop_front() {
        if shared.cancel.is_cancelled() {
            pending.push_front(item);
            break;
        }
        match shared.sink.deliver(&item).await {
            Ok(()) => {
                shared.stats.retried.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::QUEUE_RETRIED_TOTAL).increment(1);
            }
            Err(e) => {
                warn!(output = shared.sink.name(), error = %e, remaining = pending.len() + 1, "retry failed");
                pending.push_front(item);
                shared.pause();
                break;
            }
        }
    }
    set_buffered(shared, pending);
}

fn set_buffered<S>(shared: &Shared<S>, pending: &VecDeque<QueueItem>) {
    shared
        .stats
        .buffered
        .store(pending.len() as u64, Ordering::Relaxed);
    metrics::gauge!(m::QUEUE_BUFFERED).set(pending.len() as f64);
}

// ─── RetryOutput ─────────────────────────────────────────────────────

/// [`RetrySink`]를 재시도 큐로 감싼 [`Output`]
pub struct RetryOutput<S> {
    queue: RetryQueue<S>,
    _handle: JoinHandle<()>,
}

impl<S: RetrySink> RetryOutput<S> {
    pub fn new(
        sink: S,
        config: RetryConfig,
        control: Arc<Control>,
        cancel: CancellationToken,
    ) -> Self {
        let (queue, handle) = RetryQueue::spawn(sink, config, control, cancel);
        Self {
            queue,
            _handle: handle,
        }
    }

    pub fn queue(&self) -> &RetryQueue<S> {
        &self.queue
    }
}

impl<S: RetrySink> Output for RetryOutput<S> {
    fn name(&self) -> &str {
        self.queue.sink().name()
    }

    fn output(&self, event: LogEvent) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.queue.output(event))
    }
}

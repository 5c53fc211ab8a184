//! 백프레셔 제어 -- 출력이 입력에게 일시정지/재개를 알리는 브로드캐스트 신호
//!
//! [`Control`]은 `Normal`/`Paused` 두 상태만 갖습니다. 상태 전환은
//! compare-and-swap으로만 이루어지며, 전환마다 현재 대기 중인 모든 구독자에게
//! 단발성 신호를 보낸 뒤 새 신호로 교체합니다.
//!
//! # 다중 요청자
//! 여러 출력이 동시에 일시정지를 요청할 수 있습니다. 요청 수를 세어
//! 0→1에서만 `Paused`로, 1→0에서만 `Normal`로 전환합니다.
//! 요청이 없는데 재개가 들어오면 에러 로그를 남기고 무시합니다 (카운트는 음수가 되지 않음).
//!
//! # 구독자 루프
//! ```text
//! loop {
//!     (state, pause_signal, resume_signal) = control.watch()
//!     consumer 상태를 state에 맞춤 (PauseFlag로 중복 호출 방지)
//!     select { cancel | pause_signal | resume_signal }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics as m;

const STATE_NORMAL: u8 = 0;
const STATE_PAUSED: u8 = 1;

/// 백프레셔 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// 정상 (입력 진행)
    Normal,
    /// 일시정지 (입력 중지 요청됨)
    Paused,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// 일시정지/재개 알림을 받는 소비자 (입력, 백프레셔 인식 필터 등)
pub trait Pausable: Send + Sync {
    /// 입력 중지
    fn pause(&self);
    /// 입력 재개
    fn resume(&self);
}

struct Signals {
    requests: usize,
    pause: CancellationToken,
    resume: CancellationToken,
}

/// 파이프라인 단위 백프레셔 제어 객체
pub struct Control {
    state: AtomicU8,
    signals: Mutex<Signals>,
}

impl Control {
    /// `Normal` 상태의 제어 객체를 생성합니다.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_NORMAL),
            signals: Mutex::new(Signals {
                requests: 0,
                pause: CancellationToken::new(),
                resume: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Signals> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 현재 상태
    pub fn state(&self) -> ControlState {
        match self.state.load(Ordering::Acquire) {
            STATE_PAUSED => ControlState::Paused,
            _ => ControlState::Normal,
        }
    }

    /// 일시정지 상태인지 확인합니다.
    pub fn is_paused(&self) -> bool {
        self.state() == ControlState::Paused
    }

    /// 미해결 일시정지 요청 수
    pub fn pending_requests(&self) -> usize {
        self.lock().requests
    }

    /// 일시정지를 요청합니다.
    ///
    /// 첫 요청에서만 `Normal → Paused`로 전환하고 구독자에게 알립니다.
    /// 실제로 전환되었으면 `true`를 반환합니다.
    pub fn request_pause(&self) -> bool {
        let mut signals = self.lock();
        signals.requests += 1;
        if signals.requests > 1 {
            debug!(requests = signals.requests, "pause already requested");
            return false;
        }
        if self
            .state
            .compare_exchange(STATE_NORMAL, STATE_PAUSED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        fire(&mut signals.pause);
        metrics::gauge!(m::CONTROL_PAUSED).set(1.0);
        metrics::counter!(m::CONTROL_TRANSITIONS_TOTAL).increment(1);
        info!("backpressure: pausing inputs");
        true
    }

    /// 재개를 요청합니다.
    ///
    /// 마지막 요청이 해제될 때만 `Paused → Normal`로 전환하고 구독자에게 알립니다.
    /// 실제로 전환되었으면 `true`를 반환합니다.
    pub fn request_resume(&self) -> bool {
        let mut signals = self.lock();
        if signals.requests == 0 {
            error!("resume requested without a matching pause, ignoring (please notify developers)");
            return false;
        }
        signals.requests -= 1;
        if signals.requests > 0 {
            debug!(requests = signals.requests, "pause still requested by others");
            return false;
        }
        if self
            .state
            .compare_exchange(STATE_PAUSED, STATE_NORMAL, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        fire(&mut signals.resume);
        metrics::gauge!(m::CONTROL_PAUSED).set(0.0);
        metrics::counter!(m::CONTROL_TRANSITIONS_TOTAL).increment(1);
        info!("backpressure: resuming inputs");
        true
    }

    /// 다음 `Normal → Paused` 전환 시 한 번 발화하는 신호
    pub fn pause_signal(&self) -> CancellationToken {
        self.lock().pause.clone()
    }

    /// 다음 `Paused → Normal` 전환 시 한 번 발화하는 신호
    pub fn resume_signal(&self) -> CancellationToken {
        self.lock().resume.clone()
    }

    /// 현재 상태와 두 신호를 원자적으로 가져옵니다.
    ///
    /// 상태 확인과 구독 사이에 전환을 놓치지 않도록 같은 잠금 아래에서 읽습니다.
    pub fn watch(&self) -> (ControlState, CancellationToken, CancellationToken) {
        let signals = self.lock();
        (self.state(), signals.pause.clone(), signals.resume.clone())
    }

    /// 소비자를 구독시키고 구독 루프 태스크를 시작합니다.
    ///
    /// 루프는 전환마다 소비자 상태를 현재 상태에 맞추며, `cancel`이 발화하면 종료합니다.
    pub fn subscribe(
        self: &Arc<Self>,
        consumer: Arc<dyn Pausable>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let control = Arc::clone(self);
        tokio::spawn(async move {
            let flag = PauseFlag::new();
            loop {
                let (state, pause, resume) = control.watch();
                match state {
                    ControlState::Paused if flag.set_paused() => consumer.pause(),
                    ControlState::Normal if flag.set_resumed() => consumer.resume(),
                    _ => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("control subscriber stopped");
                        return;
                    }
                    _ = pause.cancelled() => {}
                    _ = resume.cancelled() => {}
                }
            }
        })
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("state", &self.state())
            .finish()
    }
}

fn fire(slot: &mut CancellationToken) {
    let fired = std::mem::replace(slot, CancellationToken::new());
    fired.cancel();
}

/// 소비자 측 일시정지 여부 추적기
///
/// 실제로 상태가 바뀐 경우에만 `true`를 반환하여 중복 pause/resume 호출을 막습니다.
#[derive(Debug, Default)]
pub struct PauseFlag(AtomicBool);

impl PauseFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// 일시정지로 표시합니다. 이전에 재개 상태였으면 `true`.
    pub fn set_paused(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// 재개로 표시합니다. 이전에 일시정지 상태였으면 `true`.
    pub fn set_resumed(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

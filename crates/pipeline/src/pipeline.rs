//! 파이프라인 오케스트레이션 -- 입력/필터/출력 단계를 채널로 연결하고 생명주기를 관리합니다.
//!
//! # 내부 아키텍처
//! ```text
//! Input ─┐                                       ┌─▶ mpsc ─▶ Output A
//! Input ─┼─▶ mpsc ─▶ FilterChain × worker ─▶ mpsc ─▶ FanOut ─┼─▶ mpsc ─▶ Output B
//!        │   (chIn)                          (chFilterOut)   └─▶ mpsc ─▶ debug (debugch)
//!   test_input_event
//! ```
//!
//! - 모든 채널은 `chsize` 용량의 bounded 채널이며, 가득 차면 생산자가 대기합니다.
//! - 출력마다 별도 태스크와 채널을 두어 느리거나 실패하는 출력이 다른 출력을 막지 않습니다.
//! - 단일 루트 [`CancellationToken`]이 모든 단계를 종료시킵니다.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logship_core::error::{PipelineError, Result};
use logship_core::metrics as m;
use logship_core::plugin::apply_chain;
use logship_core::{
    Control, Filter, Input, LogEvent, LogshipError, Output, PipelineConfig, PluginContext,
    PluginRegistry,
};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// 생성됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 모든 단계가 정상 종료됨
    Stopped,
    /// 초기화 또는 단계 실행 실패
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
            PipelineState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type StageResult = (String, Result<()>);

/// 입력 → 필터 → 출력 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use logship_core::{Control, PipelineConfig};
/// use logship_pipeline::{Pipeline, builtin_registry};
///
/// let config = PipelineConfig::load("logship.yml").await?;
/// let registry = Arc::new(builtin_registry()?);
/// let mut pipeline = Pipeline::new(config, registry, Arc::new(Control::new()));
///
/// pipeline.start(CancellationToken::new())?;
/// pipeline.wait().await?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<PluginRegistry>,
    control: Arc<Control>,
    state: PipelineState,
    cancel: CancellationToken,
    tasks: JoinSet<StageResult>,
    /// 테스트 주입용 입력 채널 송신측 (debugch)
    debug_in: Option<mpsc::Sender<LogEvent>>,
    /// 테스트 관찰용 출력 채널 수신측 (debugch)
    debug_out: Option<mpsc::Receiver<LogEvent>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: Arc<PluginRegistry>, control: Arc<Control>) -> Self {
        Self {
            config,
            registry,
            control,
            state: PipelineState::Initialized,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            debug_in: None,
            debug_out: None,
        }
    }

    /// 현재 상태
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 파이프라인 종료 토큰. 취소하면 모든 단계가 종료됩니다.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 백프레셔 제어 객체
    pub fn control(&self) -> &Arc<Control> {
        &self.control
    }

    /// 모든 플러그인을 생성하고 단계 태스크를 시작합니다.
    ///
    /// 플러그인 하나라도 생성에 실패하면 아무 단계도 시작하지 않고 `Failed` 상태가 됩니다.
    pub fn start(&mut self, cancel: CancellationToken) -> Result<()> {
        if self.state != PipelineState::Initialized {
            return Err(PipelineError::AlreadyStarted.into());
        }

        self.cancel = cancel.child_token();
        let ctx = PluginContext::new(
            Arc::clone(&self.control),
            Arc::clone(&self.registry),
            self.cancel.clone(),
        );

        let plugins = match self.build_plugins(&ctx) {
            Ok(plugins) => plugins,
            Err(e) => {
                error!(error = %e, "pipeline initialization failed");
                self.cancel.cancel();
                self.state = PipelineState::Failed;
                return Err(e);
            }
        };
        let (inputs, filters, outputs) = plugins;

        info!(
            inputs = inputs.len(),
            filters = filters.len(),
            outputs = outputs.len(),
            workers = self.config.worker,
            chsize = self.config.chsize,
            "starting pipeline"
        );

        let chsize = self.config.chsize.max(1);
        let (in_tx, in_rx) = mpsc::channel(chsize);
        let (filtered_tx, filtered_rx) = mpsc::channel(chsize);

        // 1. 입력
        for input in inputs {
            let name = format!("input:{}", input.name());
            let run = input.run(self.cancel.clone(), in_tx.clone());
            self.tasks.spawn(async move { (name, run.await) });
        }
        if self.config.debugch {
            self.debug_in = Some(in_tx);
        } else {
            drop(in_tx);
        }

        // 2. 필터 체인
        let filters: Arc<Vec<Box<dyn Filter>>> = Arc::new(filters);
        let in_rx = Arc::new(Mutex::new(in_rx));
        for worker in 0..self.config.worker.max(1) {
            let run = filter_worker(
                worker,
                Arc::clone(&filters),
                Arc::clone(&in_rx),
                filtered_tx.clone(),
                self.cancel.clone(),
            );
            self.tasks
                .spawn(async move { (format!("filter:{worker}"), run.await) });
        }
        drop(filtered_tx);

        // 3. 출력
        let mut output_txs = Vec::with_capacity(outputs.len() + 1);
        for output in outputs {
            let (tx, rx) = mpsc::channel(chsize);
            output_txs.push(tx);
            let name = format!("output:{}", output.name());
            let run = output_worker(output, rx, self.cancel.clone());
            self.tasks.spawn(async move { (name, run.await) });
        }
        if self.config.debugch {
            let (tx, rx) = mpsc::channel(chsize);
            output_txs.push(tx);
            self.debug_out = Some(rx);
        }

        let run = fan_out(filtered_rx, output_txs, self.cancel.clone());
        self.tasks
            .spawn(async move { ("fanout".to_owned(), run.await) });

        self.state = PipelineState::Running;
        info!("pipeline started");
        Ok(())
    }

    fn build_plugins(
        &self,
        ctx: &PluginContext,
    ) -> Result<(Vec<Box<dyn Input>>, Vec<Box<dyn Filter>>, Vec<Box<dyn Output>>)> {
        self.config.validate()?;

        let inputs = self
            .config
            .input
            .iter()
            .map(|raw| self.registry.build_input(ctx, raw))
            .collect::<Result<Vec<_>>>()?;
        let filters = self.registry.filter_chain(ctx, &self.config.filter)?;
        let outputs = self
            .config
            .output
            .iter()
            .map(|raw| self.registry.build_output(ctx, raw))
            .collect::<Result<Vec<_>>>()?;

        if inputs.is_empty() && !self.config.debugch {
            warn!("pipeline has no inputs");
        }
        Ok((inputs, filters, outputs))
    }

    /// 모든 단계가 끝날 때까지 기다립니다.
    ///
    /// 첫 번째 단계 실패 시 나머지 단계를 취소하고, 모두 종료된 뒤 그 에러를 반환합니다.
    pub async fn wait(&mut self) -> Result<()> {
        let never_started = match self.state {
            PipelineState::Initialized => true,
            PipelineState::Failed => self.tasks.is_empty(),
            PipelineState::Running | PipelineState::Stopped => false,
        };
        if never_started {
            return Err(PipelineError::NotStarted.into());
        }

        let mut first_error: Option<LogshipError> = None;
        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok((stage, Ok(()))) => {
                    debug!(stage = %stage, "stage finished");
                    None
                }
                Ok((_, Err(e))) if e.is_cancelled() => None,
                Ok((stage, Err(e))) => {
                    error!(stage = %stage, error = %e, "stage failed");
                    Some(e)
                }
                Err(join_err) => {
                    error!(error = %join_err, "stage task panicked");
                    Some(
                        PipelineError::StageFailed {
                            stage: "unknown".to_owned(),
                            reason: join_err.to_string(),
                        }
                        .into(),
                    )
                }
            };

            if let Some(e) = failure {
                self.cancel.cancel();
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        // 구독 루프와 재시도 큐 등 백그라운드 태스크 정리
        self.cancel.cancel();
        self.debug_in = None;
        match first_error {
            Some(e) => {
                self.state = PipelineState::Failed;
                Err(e)
            }
            None => {
                self.state = PipelineState::Stopped;
                info!("pipeline stopped");
                Ok(())
            }
        }
    }

    /// 입력 단계를 건너뛰고 필터 단계에 이벤트를 주입합니다 (`debugch` 필요).
    pub async fn test_input_event(&self, event: LogEvent) -> Result<()> {
        let tx = self
            .debug_in
            .as_ref()
            .ok_or_else(|| PipelineError::ChannelClosed("debug input disabled".to_owned()))?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PipelineError::ChannelClosed("pipeline cancelled".to_owned()).into()),
            sent = tx.send(event) => sent.map_err(|e| PipelineError::ChannelSend(e.to_string()).into()),
        }
    }

    /// 출력 단계에 도달한 이벤트를 하나 꺼냅니다 (`debugch` 필요).
    ///
    /// 파이프라인이 취소되거나 채널이 닫히면 `None`입니다.
    pub async fn test_get_output_event(&mut self) -> Option<LogEvent> {
        let rx = self.debug_out.as_mut()?;
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            event = rx.recv() => event,
        }
    }

    /// 테스트 입력 채널을 닫습니다. 입력 플러그인도 모두 끝나면 파이프라인이 배수 후 종료됩니다.
    pub fn close_test_input(&mut self) {
        self.debug_in = None;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("inputs", &self.config.input.len())
            .field("filters", &self.config.filter.len())
            .field("outputs", &self.config.output.len())
            .field("debugch", &self.config.debugch)
            .finish()
    }
}

// ─── Stage tasks ─────────────────────────────────────────────────────

async fn filter_worker(
    worker: usize,
    filters: Arc<Vec<Box<dyn Filter>>>,
    rx: Arc<Mutex<mpsc::Receiver<LogEvent>>>,
    tx: mpsc::Sender<LogEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                event = rx.recv() => event,
            }
        };
        let Some(event) = next else {
            break;
        };

        metrics::counter!(m::PIPELINE_EVENTS_RECEIVED_TOTAL).increment(1);
        let Some(event) = apply_chain(&filters, event) else {
            metrics::counter!(m::PIPELINE_EVENTS_FILTERED_TOTAL).increment(1);
            continue;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(event) => {
                if sent.is_err() {
                    return Err(PipelineError::ChannelClosed("filter output".to_owned()).into());
                }
            }
        }
    }

    debug!(worker, "filter worker stopped");
    Ok(())
}

async fn fan_out(
    mut rx: mpsc::Receiver<LogEvent>,
    txs: Vec<mpsc::Sender<LogEvent>>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        metrics::counter!(m::PIPELINE_EVENTS_EMITTED_TOTAL).increment(1);

        let Some((last, rest)) = txs.split_last() else {
            continue;
        };
        for tx in rest {
            if !forward(tx, event.clone(), &cancel).await {
                return Ok(());
            }
        }
        if !forward(last, event, &cancel).await {
            return Ok(());
        }
    }
    Ok(())
}

/// 출력 채널 하나에 이벤트를 보냅니다. 취소되면 `false`.
///
/// 이미 종료된 출력 채널은 건너뜁니다.
async fn forward(tx: &mpsc::Sender<LogEvent>, event: LogEvent, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => {
            if sent.is_err() {
                debug!("output channel closed, skipping");
            }
            true
        }
    }
}

async fn output_worker(
    output: Box<dyn Output>,
    mut rx: mpsc::Receiver<LogEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let name = output.name().to_owned();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match output.output(event).await {
            Ok(()) => {
                metrics::counter!(m::OUTPUT_EVENTS_DELIVERED_TOTAL, m::LABEL_PLUGIN => name.clone())
                    .increment(1);
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                error!(output = %name, error = %e, "output failed");
                metrics::counter!(m::OUTPUT_ERRORS_TOTAL, m::LABEL_PLUGIN => name.clone())
                    .increment(1);
            }
        }
    }

    debug!(output = %name, "output worker stopped");
    Ok(())
}

//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logship_`
//! - 영역: `pipeline_`, `output_`, `codec_`, `queue_`, `control_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use logship_core::metrics;
//! use metrics::counter;
//!
//! counter!(logship_core::metrics::PIPELINE_EVENTS_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 플러그인 타입 레이블 키 (stdout, file, ...)
pub const LABEL_PLUGIN: &str = "plugin";

/// 코덱 레이블 키 (default, json)
pub const LABEL_CODEC: &str = "codec";

// ─── Pipeline 메트릭 ────────────────────────────────────────────────

/// Pipeline: 필터 단계로 들어온 이벤트 수 (counter)
pub const PIPELINE_EVENTS_RECEIVED_TOTAL: &str = "logship_pipeline_events_received_total";

/// Pipeline: 필터가 버린 이벤트 수 (counter)
pub const PIPELINE_EVENTS_FILTERED_TOTAL: &str = "logship_pipeline_events_filtered_total";

/// Pipeline: 출력 단계로 전달된 이벤트 수 (counter)
pub const PIPELINE_EVENTS_EMITTED_TOTAL: &str = "logship_pipeline_events_emitted_total";

// ─── Output 메트릭 ──────────────────────────────────────────────────

/// Output: 전달 성공 수 (counter, label: plugin)
pub const OUTPUT_EVENTS_DELIVERED_TOTAL: &str = "logship_output_events_delivered_total";

/// Output: 전달 실패 수 (counter, label: plugin)
pub const OUTPUT_ERRORS_TOTAL: &str = "logship_output_errors_total";

// ─── Codec 메트릭 ───────────────────────────────────────────────────

/// Codec: 디코딩 실패 수 (counter, label: codec)
pub const CODEC_DECODE_ERRORS_TOTAL: &str = "logship_codec_decode_errors_total";

// ─── Retry Queue 메트릭 ─────────────────────────────────────────────

/// Queue: 재시도 목록에 들어간 항목 수 (counter)
pub const QUEUE_ENQUEUED_TOTAL: &str = "logship_queue_enqueued_total";

/// Queue: 용량 초과로 버려진 항목 수 (counter)
pub const QUEUE_DROPPED_TOTAL: &str = "logship_queue_dropped_total";

/// Queue: 재전송 성공 항목 수 (counter)
pub const QUEUE_RETRIED_TOTAL: &str = "logship_queue_retried_total";

/// Queue: 현재 버퍼된 항목 수 (gauge)
pub const QUEUE_BUFFERED: &str = "logship_queue_buffered";

// ─── Control 메트릭 ─────────────────────────────────────────────────

/// Control: 일시정지 여부 (gauge, 0 또는 1)
pub const CONTROL_PAUSED: &str = "logship_control_paused";

/// Control: 상태 전환 수 (counter)
pub const CONTROL_TRANSITIONS_TOTAL: &str = "logship_control_transitions_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logship_daemon_build_info";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 전역 recorder 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        PIPELINE_EVENTS_RECEIVED_TOTAL,
        "Total events read by the filter stage"
    );
    describe_counter!(
        PIPELINE_EVENTS_FILTERED_TOTAL,
        "Total events dropped by filters"
    );
    describe_counter!(
        PIPELINE_EVENTS_EMITTED_TOTAL,
        "Total events forwarded to the output stage"
    );
    describe_counter!(
        OUTPUT_EVENTS_DELIVERED_TOTAL,
        "Total events delivered by outputs"
    );
    describe_counter!(OUTPUT_ERRORS_TOTAL, "Total output delivery failures");
    describe_counter!(CODEC_DECODE_ERRORS_TOTAL, "Total codec decode failures");
    describe_counter!(QUEUE_ENQUEUED_TOTAL, "Total items placed in retry queues");
    describe_counter!(
        QUEUE_DROPPED_TOTAL,
        "Total items dropped because a retry queue was full"
    );
    describe_counter!(QUEUE_RETRIED_TOTAL, "Total items redelivered from retry queues");
    describe_gauge!(QUEUE_BUFFERED, "Items currently buffered in retry queues");
    describe_gauge!(CONTROL_PAUSED, "Whether inputs are paused by backpressure");
    describe_counter!(
        CONTROL_TRANSITIONS_TOTAL,
        "Total backpressure state transitions"
    );
    describe_gauge!(DAEMON_BUILD_INFO, "Build information");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_have_prefix() {
        let names = [
            PIPELINE_EVENTS_RECEIVED_TOTAL,
            PIPELINE_EVENTS_FILTERED_TOTAL,
            PIPELINE_EVENTS_EMITTED_TOTAL,
            OUTPUT_EVENTS_DELIVERED_TOTAL,
            OUTPUT_ERRORS_TOTAL,
            CODEC_DECODE_ERRORS_TOTAL,
            QUEUE_ENQUEUED_TOTAL,
            QUEUE_DROPPED_TOTAL,
            QUEUE_RETRIED_TOTAL,
            QUEUE_BUFFERED,
            CONTROL_PAUSED,
            CONTROL_TRANSITIONS_TOTAL,
            DAEMON_BUILD_INFO,
        ];
        for name in names {
            assert!(name.starts_with("logship_"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}

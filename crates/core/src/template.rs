//! 문자열 템플릿 -- `%{...}` 자리표시자 치환
//!
//! | 형식 | 의미 |
//! |---|---|
//! | `%{+@<fmt>}` | 이벤트 타임스탬프를 strftime 형식으로 |
//! | `%{+<fmt>}` | 현재 시각을 strftime 형식으로 |
//! | `%{field}` | 이벤트 필드 (`@timestamp`, `message`, 중첩 경로) |
//! | `%{NAME}` | 환경변수 (`HOSTNAME`은 OS 호스트명으로 대체 가능) |
//!
//! 각 단계는 자신이 인식하는 자리표시자만 치환하며, 해석되지 않은 것은
//! 원문 그대로 남겨 다음 단계로 넘깁니다.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::event::{LogEvent, value_to_string};

const OPEN: &str = "%{";
const CLOSE: char = '}';

/// 이벤트 기준으로 템플릿 전체를 치환합니다.
pub fn format_event(event: &LogEvent, template: &str) -> String {
    if !template.contains(OPEN) {
        return template.to_owned();
    }

    let out = replace_placeholders(template, |inner| {
        let fmt = inner.strip_prefix("+@")?;
        format_time(&event.timestamp, fmt)
    });

    let now = Utc::now();
    let out = replace_placeholders(&out, |inner| {
        if inner.starts_with("+@") {
            return None;
        }
        let fmt = inner.strip_prefix('+')?;
        format_time(&now, fmt)
    });

    let out = replace_placeholders(&out, |inner| {
        if inner.starts_with('+') {
            return None;
        }
        event.get(inner).map(|v| value_to_string(&v))
    });

    format_env(&out)
}

/// 환경변수 자리표시자 `%{NAME}`를 치환합니다.
///
/// `HOSTNAME`이 환경에 없으면 OS 호스트명을 사용합니다.
pub fn format_env(template: &str) -> String {
    if !template.contains(OPEN) {
        return template.to_owned();
    }
    replace_placeholders(template, |name| {
        if name.is_empty() || name.starts_with('+') {
            return None;
        }
        match std::env::var(name) {
            Ok(value) => Some(value),
            Err(_) if name == "HOSTNAME" => hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok()),
            Err(_) => None,
        }
    })
}

/// 시각을 strftime 형식으로 변환합니다. 잘못된 형식은 `None`입니다.
pub fn format_time(time: &DateTime<Utc>, fmt: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", time.format_with_items(items.into_iter())).ok()?;
    Some(out)
}

/// `%{...}`를 찾아 `resolve` 결과로 치환합니다.
///
/// `resolve`가 `None`을 반환하거나 닫는 괄호가 없으면 원문을 유지합니다.
fn replace_placeholders<F>(template: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let inner = &after[..end];
        match resolve(inner) {
            Some(value) => out.push_str(&value),
            None => {
                out.push_str(OPEN);
                out.push_str(inner);
                out.push(CLOSE);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

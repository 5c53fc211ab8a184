//! 중첩 필드 경로 -- `a.b[0].c` 형식의 경로 파싱과 조회/설정/삭제
//!
//! 경로는 `.`으로 구분된 키와 `[n]` 인덱스로 구성됩니다.
//! 음수 인덱스는 시퀀스의 끝에서부터 셉니다 (`[-1]`은 마지막 원소).
//! `[name]`처럼 숫자가 아닌 대괄호 세그먼트는 키로 취급합니다.

use serde_json::{Map, Value};

/// 경로 세그먼트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// 매핑 키
    Key(String),
    /// 시퀀스 인덱스 (음수는 끝에서부터)
    Index(i64),
}

/// 필드 경로 문자열을 세그먼트 목록으로 파싱합니다.
///
/// 빈 키는 무시합니다. 닫히지 않은 대괄호는 나머지 전체를 키로 취급합니다.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush_key(&mut key, &mut segments),
            '[' => {
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    key.push('[');
                    key.push_str(&inner);
                    continue;
                }
                flush_key(&mut key, &mut segments);
                match inner.trim().parse::<i64>() {
                    Ok(idx) => segments.push(Segment::Index(idx)),
                    Err(_) if !inner.is_empty() => segments.push(Segment::Key(inner)),
                    Err(_) => {}
                }
            }
            _ => key.push(c),
        }
    }
    flush_key(&mut key, &mut segments);
    segments
}

fn flush_key(key: &mut String, segments: &mut Vec<Segment>) {
    if !key.is_empty() {
        segments.push(Segment::Key(std::mem::take(key)));
    }
}

/// 음수 인덱스를 포함한 인덱스를 실제 위치로 변환합니다.
fn resolve_index(len: usize, idx: i64) -> Option<usize> {
    if idx >= 0 {
        let idx = usize::try_from(idx).ok()?;
        (idx < len).then_some(idx)
    } else {
        let back = usize::try_from(idx.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(k)) => map.get(k),
        (Value::Array(arr), Segment::Index(i)) => arr.get(resolve_index(arr.len(), *i)?),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(k)) => map.get_mut(k),
        (Value::Array(arr), Segment::Index(i)) => {
            let idx = resolve_index(arr.len(), *i)?;
            arr.get_mut(idx)
        }
        _ => None,
    }
}

/// 경로의 값을 조회합니다. 중간 세그먼트의 형태가 맞지 않으면 `None`입니다.
pub fn get<'a>(root: &'a Map<String, Value>, segments: &[Segment]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let Segment::Key(k) = first else {
        return None;
    };
    let mut current = root.get(k)?;
    for segment in rest {
        current = step(current, segment)?;
    }
    Some(current)
}

/// 경로에 값을 설정합니다.
///
/// 없는 중간 매핑은 자동으로 생성합니다. 중간 세그먼트가 이미 존재하지만
/// 매핑(또는 인덱스 세그먼트의 경우 시퀀스)이 아니면 덮어쓰지 않고 `false`를 반환합니다.
/// 실패하면 `root`는 바뀌지 않습니다.
pub fn set(root: &mut Map<String, Value>, segments: &[Segment], value: Value) -> bool {
    let Some((Segment::Key(first), rest)) = segments.split_first() else {
        return false;
    };
    if !settable(root.get(first), rest) {
        return false;
    }
    if rest.is_empty() {
        root.insert(first.clone(), value);
        return true;
    }
    let child = root
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    set_in(child, rest, value)
}

/// 중간 매핑을 만들기 전에 경로 전체가 설정 가능한지 확인합니다.
///
/// 없는 값 아래에는 새 매핑만 만들 수 있으므로 남은 세그먼트가 모두 키여야 합니다.
fn settable(current: Option<&Value>, segments: &[Segment]) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return true;
    };
    match (current, segment) {
        (None, _) => segments.iter().all(|s| matches!(s, Segment::Key(_))),
        (Some(Value::Object(map)), Segment::Key(k)) => settable(map.get(k), rest),
        (Some(Value::Array(arr)), Segment::Index(i)) => match resolve_index(arr.len(), *i) {
            Some(idx) => settable(arr.get(idx), rest),
            None => false,
        },
        _ => false,
    }
}

fn set_in(current: &mut Value, segments: &[Segment], value: Value) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return false;
    };
    match (current, segment) {
        (Value::Object(map), Segment::Key(k)) => {
            if rest.is_empty() {
                map.insert(k.clone(), value);
                return true;
            }
            let child = map
                .entry(k.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            set_in(child, rest, value)
        }
        (Value::Array(arr), Segment::Index(i)) => {
            let Some(idx) = resolve_index(arr.len(), *i) else {
                return false;
            };
            if rest.is_empty() {
                arr[idx] = value;
                return true;
            }
            set_in(&mut arr[idx], rest, value)
        }
        _ => false,
    }
}

/// 경로의 값을 제거하고 반환합니다.
pub fn remove(root: &mut Map<String, Value>, segments: &[Segment]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    if parents.is_empty() {
        let Segment::Key(k) = last else {
            return None;
        };
        return root.remove(k);
    }

    let (Segment::Key(first), middle) = parents.split_first()? else {
        return None;
    };
    let mut current = root.get_mut(first)?;
    for segment in middle {
        current = step_mut(current, segment)?;
    }
    match (current, last) {
        (Value::Object(map), Segment::Key(k)) => map.remove(k),
        (Value::Array(arr), Segment::Index(i)) => {
            let idx = resolve_index(arr.len(), *i)?;
            Some(arr.remove(idx))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn parse_mixed_path() {
        assert_eq!(
            parse("a.b[0].c"),
            vec![
                Segment::Key("a".to_owned()),
                Segment::Key("b".to_owned()),
                Segment::Index(0),
                Segment::Key("c".to_owned()),
            ]
        );
        assert_eq!(parse("list[-1]"), vec![Segment::Key("list".to_owned()), Segment::Index(-1)]);
        assert_eq!(
            parse("[nginx][status]"),
            vec![Segment::Key("nginx".to_owned()), Segment::Key("status".to_owned())]
        );
        assert!(parse("").is_empty());
    }

    #[test]
    fn parse_unclosed_bracket_is_key() {
        assert_eq!(parse("a[0"), vec![Segment::Key("a[0".to_owned())]);
    }

    #[test]
    fn get_nested_and_negative_index() {
        let root = obj(json!({"a": {"b": [{"c": 1}, {"c": 2}]}}));
        assert_eq!(get(&root, &parse("a.b[0].c")), Some(&json!(1)));
        assert_eq!(get(&root, &parse("a.b[-1].c")), Some(&json!(2)));
        assert_eq!(get(&root, &parse("a.b[2].c")), None);
        assert_eq!(get(&root, &parse("a.b[-3]")), None);
    }

    #[test]
    fn get_fails_on_shape_mismatch() {
        let root = obj(json!({"a": "scalar"}));
        assert_eq!(get(&root, &parse("a.b")), None);
        assert_eq!(get(&root, &parse("a[0]")), None);
    }

    #[test]
    fn set_creates_intermediate_maps() {
        let mut root = Map::new();
        assert!(set(&mut root, &parse("a.b.c"), json!("v")));
        assert_eq!(Value::Object(root), json!({"a": {"b": {"c": "v"}}}));
    }

    #[test]
    fn set_refuses_to_overwrite_scalar_intermediate() {
        let mut root = obj(json!({"a": 5}));
        assert!(!set(&mut root, &parse("a.b"), json!(1)));
        assert_eq!(root.get("a"), Some(&json!(5)));
    }

    #[test]
    fn set_into_existing_array() {
        let mut root = obj(json!({"list": [1, 2, 3]}));
        assert!(set(&mut root, &parse("list[-1]"), json!(30)));
        assert!(!set(&mut root, &parse("list[5]"), json!(0)));
        assert_eq!(root.get("list"), Some(&json!([1, 2, 30])));
    }

    #[test]
    fn failed_set_leaves_root_unchanged() {
        let mut root = obj(json!({"keep": 1, "list": [{"x": 1}]}));
        let before = root.clone();

        assert!(!set(&mut root, &parse("a[0]"), json!(1)));
        assert!(!set(&mut root, &parse("x.y[0].z"), json!(1)));
        assert!(!set(&mut root, &parse("list[3].x"), json!(1)));
        assert!(!set(&mut root, &parse("list[0].x.deep"), json!(1)));
        assert_eq!(root, before);

        assert!(set(&mut root, &parse("list[0].y.z"), json!(2)));
        assert_eq!(root.get("list"), Some(&json!([{"x": 1, "y": {"z": 2}}])));
    }

    #[test]
    fn remove_nested() {
        let mut root = obj(json!({"a": {"b": 1, "c": 2}, "list": [1, 2]}));
        assert_eq!(remove(&mut root, &parse("a.b")), Some(json!(1)));
        assert_eq!(remove(&mut root, &parse("list[0]")), Some(json!(1)));
        assert_eq!(remove(&mut root, &parse("missing.x")), None);
        assert_eq!(Value::Object(root), json!({"a": {"c": 2}, "list": [2]}));
    }
}

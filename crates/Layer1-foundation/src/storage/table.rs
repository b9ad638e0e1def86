//! Tabular storage contract
//!
//! 호스팅된 관계형 백엔드를 대신하는 비동기 테이블 저장소 인터페이스.
//! 호스트 앱과 플러그인이 공유하며, 구현체는 `MemoryStorage`/`SqliteStorage`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use thiserror::Error;

use crate::Result;

/// 테이블의 한 행 (JSON 객체)
pub type Row = Map<String, Value>;

/// 기본 키 컬럼 이름
pub const ID_COLUMN: &str = "id";

// ============================================================================
// StorageError
// ============================================================================

/// 저장소 에러 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorCode {
    NotFound,
}

/// 구조화된 저장소 에러
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StorageError {
    pub message: String,
    pub code: Option<StorageErrorCode>,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(StorageErrorCode::NotFound),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Some(StorageErrorCode::NotFound)
    }
}

// ============================================================================
// Query
// ============================================================================

/// 필터 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `%` 와일드카드, 대소문자 무시
    Like,
    /// 값이 배열 안에 포함
    In,
}

/// 컬럼 필터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// 행이 필터를 통과하는지 확인
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(&self.column).unwrap_or(&Value::Null);

        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Neq => actual != &self.value,
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Like => match (actual.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => like_match(text, pattern),
                _ => false,
            },
            FilterOp::In => self
                .value
                .as_array()
                .map(|candidates| candidates.contains(actual))
                .unwrap_or(false),
        }
    }
}

/// 정렬 조건
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// select 질의
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// 모든 필터를 통과하는지 확인
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// 필터 → 정렬 → offset/limit 순으로 적용
    pub fn apply<I>(&self, rows: I) -> Vec<Row>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut selected: Vec<Row> = rows.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = match (left.is_null(), right.is_null()) {
                    // null은 항상 뒤로
                    (true, true) => Ordering::Equal,
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
                };
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        selected.into_iter().skip(offset).take(limit).collect()
    }
}

/// 같은 타입끼리만 비교 (숫자, 문자열, 불리언)
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn like_match(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();

    if parts.len() == 1 {
        return text == pattern;
    }

    let mut rest = text.as_str();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

// ============================================================================
// TableStorage
// ============================================================================

/// 비동기 테이블 저장소
///
/// 모든 메서드는 구조화된 [`StorageError`]로 실패할 수 있습니다.
#[async_trait]
pub trait TableStorage: Send + Sync {
    /// 백엔드 이름 (로그용)
    fn backend(&self) -> &'static str;

    /// 행 삽입. `id`/`createdAt`이 없으면 채워서 반환
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// 질의에 맞는 행 조회
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>>;

    /// 행 부분 갱신 (얕은 병합)
    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row>;

    /// 행 삭제
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

/// 삽입 전 공통 필드 채우기
///
/// 숫자 `id`는 문자열로 바꾸고, 문자열/숫자가 아닌 `id`는 거부합니다.
pub(crate) fn prepare_insert(mut row: Row) -> Result<Row> {
    let id = match row.get(ID_COLUMN) {
        None | Some(Value::Null) => uuid::Uuid::new_v4().to_string(),
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(StorageError::new(format!(
                "Column '{}' must be a string or number, got {}",
                ID_COLUMN, other
            ))
            .into())
        }
    };
    row.insert(ID_COLUMN.to_string(), Value::String(id));
    if !row.contains_key("createdAt") {
        row.insert(
            "createdAt".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    Ok(row)
}

/// 갱신 패치 병합 (id는 변경 불가)
pub(crate) fn apply_patch(row: &mut Row, patch: Row) {
    for (key, value) in patch {
        if key == ID_COLUMN {
            continue;
        }
        row.insert(key, value);
    }
    row.insert(
        "updatedAt".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
}

pub(crate) fn row_id(row: &Row) -> Option<&str> {
    row.get(ID_COLUMN).and_then(|v| v.as_str())
}

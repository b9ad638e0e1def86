//! Event Bus - 이벤트 브로드캐스트 시스템
//!
//! 비동기 이벤트 발행/구독 시스템을 제공합니다.
//! 전역 인스턴스는 없으며, 소유자가 `Arc<EventBus>`로 공유합니다.

use super::types::{AppEvent, EventCategory, EventSeverity};
use crate::config::EventsConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

// ============================================================================
// EventListener Trait
// ============================================================================

/// 이벤트 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 이벤트 리스너 trait
#[async_trait]
pub trait EventListener: Send + Sync {
    /// 리스너 이름 (디버깅용)
    fn name(&self) -> &str;

    /// 관심 있는 이벤트 카테고리 (None이면 모든 이벤트)
    fn categories(&self) -> Option<Vec<EventCategory>> {
        None
    }

    /// 이벤트 처리
    async fn on_event(&self, event: &AppEvent);
}

// ============================================================================
// EventFilter
// ============================================================================

/// 이벤트 필터
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// 카테고리 필터
    pub categories: Option<Vec<EventCategory>>,

    /// 정확히 일치하는 이벤트 이름
    pub event_types: Option<Vec<String>>,

    /// 이벤트 이름 prefix
    pub prefixes: Option<Vec<String>>,

    /// 소스 필터
    pub sources: Option<Vec<String>>,

    /// 최소 심각도
    pub min_severity: Option<EventSeverity>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(mut self, categories: Vec<EventCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_event_types(mut self, types: Vec<String>) -> Self {
        self.event_types = Some(types);
        self
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = Some(prefixes);
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_min_severity(mut self, severity: EventSeverity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    /// 이벤트가 필터를 통과하는지 확인
    pub fn matches(&self, event: &AppEvent) -> bool {
        if let Some(ref cats) = self.categories {
            if !cats.contains(&event.category) {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == &event.event_type) {
                return false;
            }
        }

        if let Some(ref prefixes) = self.prefixes {
            if !prefixes.iter().any(|p| event.event_type.starts_with(p)) {
                return false;
            }
        }

        if let Some(ref sources) = self.sources {
            if !sources.contains(&event.source) {
                return false;
            }
        }

        if let Some(min_sev) = self.min_severity {
            if event.severity < min_sev {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,

    /// 디버그 모드 (모든 이벤트 로깅)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_size: 100,
            debug_mode: false,
        }
    }
}

impl From<&EventsConfig> for EventBusConfig {
    fn from(config: &EventsConfig) -> Self {
        Self {
            channel_capacity: config.channel_capacity.max(1),
            history_size: config.history_size,
            debug_mode: false,
        }
    }
}

/// 등록된 리스너 정보
#[derive(Clone)]
struct RegisteredListener {
    listener: Arc<dyn EventListener>,
    filter: Option<EventFilter>,
}

impl RegisteredListener {
    fn accepts(&self, event: &AppEvent) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(event),
            None => match self.listener.categories() {
                Some(cats) => cats.contains(&event.category),
                None => true,
            },
        }
    }
}

/// 이벤트 버스
///
/// 관찰자 목록 + 브로드캐스트 채널 + 최근 히스토리.
///
/// ```ignore
/// let bus = EventBus::new();
/// let id = bus.subscribe(my_listener).await;
/// bus.publish(AppEvent::new("plugin:enabled", EventCategory::Plugin)).await;
/// bus.unsubscribe(id).await;
/// ```
pub struct EventBus {
    config: EventBusConfig,

    sender: broadcast::Sender<AppEvent>,

    /// 전달 시 ID 순(등록 순)으로 정렬
    listeners: RwLock<HashMap<ListenerId, RegisteredListener>>,

    listener_counter: AtomicU64,

    history: RwLock<Vec<AppEvent>>,

    event_count: AtomicU64,
}

impl EventBus {
    /// 기본 설정으로 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 이벤트 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            sender,
            listeners: RwLock::new(HashMap::new()),
            listener_counter: AtomicU64::new(0),
            history: RwLock::new(Vec::new()),
            event_count: AtomicU64::new(0),
        }
    }

    /// 리스너 등록
    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.subscribe_with_filter(listener, None).await
    }

    /// 필터와 함께 리스너 등록
    pub async fn subscribe_with_filter(
        &self,
        listener: Arc<dyn EventListener>,
        filter: Option<EventFilter>,
    ) -> ListenerId {
        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering event listener"
        );

        let mut listeners = self.listeners.write().await;
        listeners.insert(id, RegisteredListener { listener, filter });

        id
    }

    /// 리스너 해제
    pub async fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let removed = listeners.remove(&id).is_some();

        if removed {
            debug!(listener_id = %id, "Unregistered event listener");
        }

        removed
    }

    /// 이벤트 발행
    ///
    /// 리스너는 등록 순서대로 하나씩 호출됩니다. 호출 중에는 리스너 목록 락을
    /// 잡지 않으므로 리스너 안에서 구독/해제가 가능합니다.
    pub async fn publish(&self, event: AppEvent) {
        let event_count = self.event_count.fetch_add(1, Ordering::SeqCst);

        if self.config.debug_mode {
            trace!(
                event_id = %event.id,
                event_type = %event.event_type,
                category = ?event.category,
                "Publishing event #{}", event_count + 1
            );
        }

        {
            let mut history = self.history.write().await;
            history.push(event.clone());

            if history.len() > self.config.history_size {
                history.remove(0);
            }
        }

        // 구독자가 없어도 OK
        let _ = self.sender.send(event.clone());

        let targets: Vec<(ListenerId, RegisteredListener)> = {
            let listeners = self.listeners.read().await;
            let mut targets: Vec<_> = listeners
                .iter()
                .filter(|(_, registered)| registered.accepts(&event))
                .map(|(id, registered)| (*id, registered.clone()))
                .collect();
            targets.sort_by_key(|(id, _)| id.0);
            targets
        };

        for (id, registered) in targets {
            trace!(
                listener_id = %id,
                listener_name = registered.listener.name(),
                event_type = %event.event_type,
                "Delivering event to listener"
            );

            registered.listener.on_event(&event).await;
        }
    }

    /// 브로드캐스트 수신자 생성 (스트림 방식)
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// 최근 이벤트 히스토리 조회 (최신순)
    pub async fn history(&self, limit: Option<usize>) -> Vec<AppEvent> {
        let history = self.history.read().await;
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// 필터로 히스토리 검색 (발행순)
    pub async fn search_history(&self, filter: &EventFilter) -> Vec<AppEvent> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// 등록된 리스너 수
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }

    /// 히스토리 클리어
    pub async fn clear_history(&self) {
        let mut history = self.history.write().await;
        history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct TestListener {
        name: String,
        count: AtomicUsize,
    }

    impl TestListener {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                count: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventListener for TestListener {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_event(&self, _event: &AppEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct OrderListener {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl EventListener for OrderListener {
        fn name(&self) -> &str {
            self.tag
        }

        async fn on_event(&self, _event: &AppEvent) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new();

        let listener = Arc::new(TestListener::new("test"));
        let id = bus.subscribe(listener.clone()).await;

        assert_eq!(bus.listener_count().await, 1);

        bus.publish(AppEvent::new("test:event", EventCategory::System))
            .await;
        assert_eq!(listener.call_count(), 1);
        assert_eq!(bus.event_count(), 1);

        assert!(bus.unsubscribe(id).await);
        assert!(!bus.unsubscribe(id).await);
        assert_eq!(bus.listener_count().await, 0);
    }

    #[tokio::test]
    async fn test_exact_name_filter() {
        let bus = EventBus::new();
        let listener = Arc::new(TestListener::new("enabled-only"));
        let filter = EventFilter::new().with_event_types(vec!["plugin:enabled".to_string()]);
        bus.subscribe_with_filter(listener.clone(), Some(filter)).await;

        bus.publish(AppEvent::new("plugin:enabling", EventCategory::Plugin))
            .await;
        bus.publish(AppEvent::new("plugin:enabled", EventCategory::Plugin))
            .await;

        assert_eq!(listener.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prefix_and_category_filter() {
        let filter = EventFilter::new()
            .with_categories(vec![EventCategory::Plugin])
            .with_prefixes(vec!["plugin:".to_string()]);

        let plugin_event = AppEvent::new("plugin:installed", EventCategory::Plugin);
        let system_event = AppEvent::new("system:started", EventCategory::System);

        assert!(filter.matches(&plugin_event));
        assert!(!filter.matches(&system_event));
    }

    #[tokio::test]
    async fn test_delivery_follows_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            bus.subscribe(Arc::new(OrderListener {
                tag,
                log: log.clone(),
            }))
            .await;
        }

        bus.publish(AppEvent::new("x", EventCategory::Custom)).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_event_history() {
        let config = EventBusConfig {
            history_size: 5,
            ..Default::default()
        };
        let bus = EventBus::with_config(config);

        for i in 0..10 {
            bus.publish(AppEvent::new(format!("test:event:{}", i), EventCategory::System))
                .await;
        }

        let history = bus.history(None).await;
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].event_type, "test:event:9");
    }

    #[tokio::test]
    async fn test_broadcast_receiver() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        bus.publish(AppEvent::new("plugin:installed", EventCategory::Plugin))
            .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type, "plugin:installed");
    }
}

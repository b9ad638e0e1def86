//! Event System - 이벤트 발행/구독 시스템
//!
//! 호스트 애플리케이션과 플러그인 레지스트리에서 발생하는 이벤트를 관리합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                              │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  publish(event) ──────────────────────────────────┐ │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         │                                                   │
//! │         ▼                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │  Listener 1  │  │  Listener 2  │  │  Listener N  │      │
//! │  │  (Audit)     │  │  (Host UI)   │  │  (Plugin)    │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use smartx_foundation::event::{AppEvent, EventBus, EventCategory, EventListener};
//!
//! struct MyListener;
//!
//! #[async_trait]
//! impl EventListener for MyListener {
//!     fn name(&self) -> &str { "my_listener" }
//!
//!     async fn on_event(&self, event: &AppEvent) {
//!         println!("Received: {}", event.event_type);
//!     }
//! }
//!
//! let bus = Arc::new(EventBus::new());
//! bus.subscribe(Arc::new(MyListener)).await;
//! bus.publish(AppEvent::new("system:started", EventCategory::System)).await;
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusConfig, EventFilter, EventListener, ListenerId};

pub use types::{system, AppEvent, EventCategory, EventId, EventSeverity};

//! Event Processing Module
//!
//! Domain events raised by repositories after a successful write.
//! They are NOT stored - processed synchronously and discarded.
//!
//! Flow: Event -> Find matching Subscribers -> Run each one
//!
//! The built-in subscriber keeps the "faq" content section in step with the
//! structured FAQ items.

use crate::models::FaqItem;
use crate::repos::{faq_transcript, ContentRepo, FAQ_PLACEHOLDER, FAQ_SECTION, FAQ_SECTION_TITLE};

/// Result type for event processing
pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug)]
pub enum EventError {
    Store(String),
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for EventError {}

#[derive(Debug, Clone)]
pub enum SiteEvent {
    /// The FAQ collection changed; carries the full list after the write.
    FaqChanged { items: Vec<FaqItem> },
}

impl SiteEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SiteEvent::FaqChanged { .. } => "faq.changed",
        }
    }
}

pub trait Subscriber: Send + Sync {
    fn name(&self) -> &str;
    fn handles(&self, event_type: &str) -> bool;
    fn handle(&self, event: &SiteEvent) -> EventResult<()>;
}

/// Event processor routes events to every interested subscriber
#[derive(Default)]
pub struct EventProcessor {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor with the site's standard subscribers registered.
    pub fn with_defaults(content: ContentRepo) -> Self {
        let mut processor = Self::new();
        processor.subscribe(Box::new(FaqSummarySync::new(content)));
        processor
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Process an event: run every matching subscriber, recording failures
    /// without stopping the rest.
    pub fn process(&self, event: &SiteEvent) -> EventResult<ProcessResult> {
        let mut result = ProcessResult::default();
        let event_type = event.event_type();

        for sub in self.subscribers.iter().filter(|s| s.handles(event_type)) {
            result.subscriptions_matched += 1;
            match sub.handle(event) {
                Ok(()) => {
                    result.actions_succeeded += 1;
                    result.action_results.push(ActionResult {
                        subscriber: sub.name().to_string(),
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    log::error!("Subscriber '{}' failed on {}: {}", sub.name(), event_type, e);
                    result.action_results.push(ActionResult {
                        subscriber: sub.name().to_string(),
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(result)
    }
}

#[derive(Debug, Default)]
pub struct ProcessResult {
    pub subscriptions_matched: usize,
    pub actions_succeeded: usize,
    pub action_results: Vec<ActionResult>,
}

#[derive(Debug)]
pub struct ActionResult {
    pub subscriber: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Rewrites the "faq" content section from the FAQ items.
pub struct FaqSummarySync {
    content: ContentRepo,
}

impl FaqSummarySync {
    pub fn new(content: ContentRepo) -> Self {
        Self { content }
    }
}

impl Subscriber for FaqSummarySync {
    fn name(&self) -> &str {
        "faq_summary_sync"
    }

    fn handles(&self, event_type: &str) -> bool {
        event_type == "faq.changed"
    }

    fn handle(&self, event: &SiteEvent) -> EventResult<()> {
        let SiteEvent::FaqChanged { items } = event;
        let transcript = faq_transcript(items);
        let body = if transcript.is_empty() {
            FAQ_PLACEHOLDER.to_string()
        } else {
            transcript
        };

        self.content
            .upsert(FAQ_SECTION, FAQ_SECTION_TITLE, &body)
            .map(|_| ())
            .map_err(|e| EventError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn item(id: i64, question: &str, active: bool) -> FaqItem {
        FaqItem {
            id,
            question: question.to_string(),
            answer: "yes".to_string(),
            order: id,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            custom_tab_key: None,
        }
    }

    struct Failing;

    impl Subscriber for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn handles(&self, _: &str) -> bool {
            true
        }
        fn handle(&self, _: &SiteEvent) -> EventResult<()> {
            Err(EventError::Store("disk full".to_string()))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Subscriber for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn handles(&self, event_type: &str) -> bool {
            event_type == "faq.changed"
        }
        fn handle(&self, _: &SiteEvent) -> EventResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_event_type() {
        let event = SiteEvent::FaqChanged { items: vec![] };
        assert_eq!(event.event_type(), "faq.changed");
    }

    #[test]
    fn test_summary_sync_writes_transcript() {
        let content = ContentRepo::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let processor = EventProcessor::with_defaults(content.clone());

        let event = SiteEvent::FaqChanged {
            items: vec![item(1, "Hire?", true), item(2, "Old?", false)],
        };
        let result = processor.process(&event).unwrap();

        assert_eq!(result.subscriptions_matched, 1);
        assert_eq!(result.actions_succeeded, 1);
        assert_eq!(content.get("faq").unwrap().unwrap().body, "Q: Hire?\nA: yes");
    }

    #[test]
    fn test_empty_faq_uses_placeholder() {
        let content = ContentRepo::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let processor = EventProcessor::with_defaults(content.clone());

        processor.process(&SiteEvent::FaqChanged { items: vec![] }).unwrap();
        assert_eq!(content.get("faq").unwrap().unwrap().body, FAQ_PLACEHOLDER);
    }

    #[test]
    fn test_failure_does_not_stop_other_subscribers() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut processor = EventProcessor::new();
        processor.subscribe(Box::new(Failing));
        processor.subscribe(Box::new(Counting(count.clone())));

        let result = processor.process(&SiteEvent::FaqChanged { items: vec![] }).unwrap();

        assert_eq!(result.subscriptions_matched, 2);
        assert_eq!(result.actions_succeeded, 1);
        assert!(!result.action_results[0].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

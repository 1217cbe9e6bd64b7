use crate::models::ListingSummary;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// Markers the site uses for updates within the last hours / minutes
const RECENT_MARKERS: [&str; 2] = ["小時", "分鐘"];

/// True when a freshness string like "3小時內更新" or "5 分鐘前" is hour- or minute-based
pub fn is_recent(freshness: &str) -> bool {
    RECENT_MARKERS.iter().any(|marker| freshness.contains(marker))
}

/// Message handed to a [`NotificationSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub image_url: Option<String>,
}

impl Notification {
    pub fn from_listing(listing: &ListingSummary, detail_base: &str) -> Self {
        let message = format!(
            "\n💡 {}\n📌 {}\n💰 {}\n⏰ {}\n\n{}",
            listing.title,
            listing.location,
            listing.price,
            listing.freshness,
            listing.detail_url(detail_base)
        );
        Self {
            message,
            image_url: listing.first_photo().map(str::to_string),
        }
    }
}

/// Destination for listing notifications (chat bot, push service, ...)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;

    fn sink_name(&self) -> &'static str;
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            image = notification.image_url.as_deref().unwrap_or("-"),
            "{}", notification.message
        );
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "log"
    }
}

/// Outcome of [`notify_recent`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    /// Not recent enough to forward
    pub skipped: usize,
    pub failed: usize,
}

/// Forward every recent listing to `sink`, carrying on past failed sends
pub async fn notify_recent(
    listings: &[ListingSummary],
    sink: &dyn NotificationSink,
    detail_base: &str,
) -> NotifyReport {
    let mut report = NotifyReport::default();

    for listing in listings {
        if !is_recent(&listing.freshness) {
            report.skipped += 1;
            continue;
        }

        let notification = Notification::from_listing(listing, detail_base);
        match sink.send(&notification).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!("{} sink failed for listing {}: {:#}", sink.sink_name(), listing.id, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Notified {} listing(s) via {} ({} skipped, {} failed)",
        report.sent,
        sink.sink_name(),
        report.skipped,
        report.failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Mutex;

    fn listing(id: &str, freshness: &str) -> ListingSummary {
        ListingSummary {
            id: id.to_string(),
            title: format!("Listing {id}"),
            price: "15,000".to_string(),
            location: "Zhongshan".to_string(),
            photos: vec![format!("https://img.591.com.tw/{id}.jpg")],
            freshness: freshness.to_string(),
            extra: Map::new(),
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Notification>>,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, notification: &Notification) -> Result<()> {
            if let Some(id) = self.fail_for {
                if notification.message.ends_with(id) {
                    anyhow::bail!("sink unavailable");
                }
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn recency_markers() {
        assert!(is_recent("3 小時前"));
        assert!(is_recent("5 分鐘前"));
        assert!(is_recent("12小時內更新"));
        assert!(!is_recent("2024-01-01"));
        assert!(!is_recent("2天前更新"));
        assert!(!is_recent(""));
    }

    #[test]
    fn message_contains_listing_fields() {
        let n = Notification::from_listing(&listing("42", "1小時內更新"), "https://rent.591.com.tw/home/");
        assert!(n.message.contains("Listing 42"));
        assert!(n.message.contains("Zhongshan"));
        assert!(n.message.contains("15,000"));
        assert!(n.message.ends_with("https://rent.591.com.tw/home/42"));
        assert_eq!(n.image_url.as_deref(), Some("https://img.591.com.tw/42.jpg"));
    }

    #[tokio::test]
    async fn only_recent_listings_are_sent() {
        let sink = RecordingSink::default();
        let listings = vec![
            listing("1", "10分鐘內更新"),
            listing("2", "3天前更新"),
            listing("3", "2小時內更新"),
        ];

        let report = notify_recent(&listings, &sink, "https://rent.591.com.tw/home/").await;

        assert_eq!(report, NotifyReport { sent: 2, skipped: 1, failed: 0 });
        let sent = sink.sent.lock().unwrap();
        assert!(sent[0].message.ends_with("/home/1"));
        assert!(sent[1].message.ends_with("/home/3"));
    }

    #[tokio::test]
    async fn failed_send_does_not_stop_the_loop() {
        let sink = RecordingSink {
            fail_for: Some("/home/1"),
            ..Default::default()
        };
        let listings = vec![listing("1", "1小時內更新"), listing("2", "1小時內更新")];

        let report = notify_recent(&listings, &sink, "https://rent.591.com.tw/home/").await;

        assert_eq!(report, NotifyReport { sent: 1, skipped: 0, failed: 1 });
    }

    #[tokio::test]
    async fn log_sink_accepts_everything() {
        let n = Notification::from_listing(&listing("5", "1分鐘內更新"), "https://rent.591.com.tw/home/");
        assert!(LogSink.send(&n).await.is_ok());
    }
}

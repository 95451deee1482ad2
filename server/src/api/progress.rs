//! SSE Progress Stream
//!
//! Long-lived `text/event-stream` responses that sample the progress
//! tracker and push one `event: progress` frame per observed change.
//! Every subscriber samples independently; late joiners always receive
//! the current state first.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;

use crate::api::error::{parse_id, AppError};
use crate::api::AppState;
use crate::scoring::{ProgressRecord, ProgressStatus, ProgressTracker};

/// How often the tracker is resampled per subscriber.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// One frame on the progress stream.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProgressFrame {
    /// Current step label.
    pub step: String,
    /// Human-readable message.
    pub message: String,
    /// Completion percentage.
    pub percent: u8,
    /// "Connected", "Queued", "InProgress", "Success" or "Error".
    pub status: String,
    /// Terminal error description, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Composite score on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    /// Milliseconds since epoch of the last tracker update.
    pub last_updated: i64,
}

impl ProgressFrame {
    /// Synthesized frame for subscribers with no tracked run yet.
    fn connected() -> Self {
        Self {
            step: "Connected".to_string(),
            message: "Connected to progress stream".to_string(),
            percent: 0,
            status: "Connected".to_string(),
            error_message: None,
            final_score: None,
            last_updated: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl From<&ProgressRecord> for ProgressFrame {
    fn from(record: &ProgressRecord) -> Self {
        let status = match record.status {
            ProgressStatus::Queued => "Queued",
            ProgressStatus::InProgress => "InProgress",
            ProgressStatus::Success => "Success",
            ProgressStatus::Error => "Error",
        };
        Self {
            step: record.step.clone(),
            message: record.message.clone(),
            percent: record.percent,
            status: status.to_string(),
            error_message: record.error_message.clone(),
            final_score: record.final_score,
            last_updated: record.last_updated.timestamp_millis(),
        }
    }
}

struct SamplerState {
    tracker: Arc<ProgressTracker>,
    article_id: i64,
    last: Option<ProgressRecord>,
    interval: tokio::time::Interval,
    deadline: tokio::time::Instant,
    sent_first: bool,
    done: bool,
}

/// Stream of progress frames for one article.
///
/// Emits the current state immediately (synthesizing a `Connected` frame
/// when no run is tracked), then one frame per observed change. Ends after
/// delivering a terminal status or when `max_duration` elapses; dropping
/// the stream on client disconnect cancels the sampler.
pub fn frame_stream(
    tracker: Arc<ProgressTracker>,
    article_id: i64,
    sample_interval: Duration,
    max_duration: Duration,
) -> impl Stream<Item = ProgressFrame> {
    let mut interval = tokio::time::interval(sample_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so ticks mean "one period later".
    interval.reset();

    let state = SamplerState {
        tracker,
        article_id,
        last: None,
        interval,
        deadline: tokio::time::Instant::now() + max_duration,
        sent_first: false,
        done: false,
    };

    futures::stream::unfold(state, |mut s| async move {
        if s.done {
            return None;
        }

        if !s.sent_first {
            s.sent_first = true;
            let record = s.tracker.get(s.article_id);
            let frame = match &record {
                Some(r) => {
                    if r.status.is_terminal() {
                        s.done = true;
                    }
                    ProgressFrame::from(r)
                }
                None => ProgressFrame::connected(),
            };
            s.last = record;
            return Some((frame, s));
        }

        loop {
            tokio::select! {
                () = tokio::time::sleep_until(s.deadline) => return None,
                _ = s.interval.tick() => {}
            }

            let Some(record) = s.tracker.get(s.article_id) else {
                continue;
            };

            let changed = s.last.as_ref().is_none_or(|prev| record.changed_since(prev));
            if changed {
                if record.status.is_terminal() {
                    s.done = true;
                }
                let frame = ProgressFrame::from(&record);
                s.last = Some(record);
                return Some((frame, s));
            }
            s.last = Some(record);
        }
    })
}

/// SSE endpoint streaming scoring progress for one article.
///
/// GET /api/llm/score-progress/{id}
#[utoipa::path(
    get,
    path = "/api/llm/score-progress/{id}",
    tag = "llm",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "text/event-stream of progress frames", body = ProgressFrame),
        (status = 400, description = "Invalid ID"),
    ),
)]
pub async fn score_progress(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let article_id = parse_id(&raw_id)?;

    let frames = frame_stream(
        Arc::clone(&state.tracker),
        article_id,
        SAMPLE_INTERVAL,
        Duration::from_secs(state.config.sse_max_duration_secs),
    );

    let events = frames.map(|frame| {
        Ok::<Event, Infallible>(
            Event::default()
                .event("progress")
                .json_data(&frame)
                .unwrap_or_else(|_| Event::default().event("progress").data("{}")),
        )
    });

    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        sse,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn tracker() -> Arc<ProgressTracker> {
        Arc::new(ProgressTracker::new(Duration::from_secs(300)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_frame_is_synthesized_without_a_run() {
        let tracker = tracker();
        let mut stream = Box::pin(frame_stream(
            Arc::clone(&tracker),
            1,
            Duration::from_millis(200),
            Duration::from_secs(5),
        ));

        let frame = stream.next().await.unwrap();
        assert_eq!(frame.status, "Connected");
        assert_eq!(frame.percent, 0);

        // No run ever appears: the stream ends at the max duration.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_is_delivered_then_stream_ends() {
        let tracker = tracker();
        tracker.set(ProgressRecord::success(1, 0.42));

        let mut stream = Box::pin(frame_stream(
            Arc::clone(&tracker),
            1,
            Duration::from_millis(200),
            Duration::from_secs(60),
        ));

        let frame = stream.next().await.unwrap();
        assert_eq!(frame.status, "Success");
        assert_eq!(frame.percent, 100);
        assert_eq!(frame.final_score, Some(0.42));

        assert!(stream.next().await.is_none(), "terminal frame must be last");
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_are_emitted_in_order() {
        let tracker = tracker();
        tracker.set(ProgressRecord::queued(1));

        let mut stream = Box::pin(frame_stream(
            Arc::clone(&tracker),
            1,
            Duration::from_millis(200),
            Duration::from_secs(60),
        ));

        let first = stream.next().await.unwrap();
        assert_eq!(first.status, "Queued");

        tracker.set(ProgressRecord::step(1, "Scoring with m", "Scoring with m", 40));
        let second = stream.next().await.unwrap();
        assert_eq!(second.status, "InProgress");
        assert_eq!(second.percent, 40);

        tracker.set(ProgressRecord::error(1, "All LLM models failed", 40));
        let third = stream.next().await.unwrap();
        assert_eq!(third.status, "Error");
        assert_eq!(third.error_message.as_deref(), Some("All LLM models failed"));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_percent_never_decreases_for_a_subscriber() {
        let tracker = tracker();
        tracker.set(ProgressRecord::queued(1));

        let mut stream = Box::pin(frame_stream(
            Arc::clone(&tracker),
            1,
            Duration::from_millis(200),
            Duration::from_secs(60),
        ));

        let mut last_percent = 0;
        for percent in [5u8, 31, 58, 90] {
            tracker.set(ProgressRecord::step(1, "Scoring", "Scoring", percent));
            let frame = stream.next().await.unwrap();
            assert!(frame.percent >= last_percent);
            last_percent = frame.percent;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_subscribers_each_get_the_terminal_frame() {
        let tracker = tracker();
        tracker.set(ProgressRecord::success(9, 0.1));

        for _ in 0..5 {
            let mut stream = Box::pin(frame_stream(
                Arc::clone(&tracker),
                9,
                Duration::from_millis(200),
                Duration::from_secs(1),
            ));
            let frame = stream.next().await.unwrap();
            assert_eq!(frame.status, "Success");
            assert!(stream.next().await.is_none());
        }
    }
}

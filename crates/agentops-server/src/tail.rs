//! Live, filtered replay of the log for a single run.
//!
//! Every tail starts at genesis and walks the whole log, so a late observer
//! still sees a run's history. That is O(log size) per observer; the log is
//! expected to stay small.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::time::Instant;
use tracing::{debug, trace};

use agentops_core::{LogEntry, LogPosition, RunId};
use agentops_log::{EventLog, LogError};

/// Tail polling parameters.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Maximum entries per read.
    pub batch_size: usize,
    /// How long a read blocks; also the heartbeat interval.
    pub block_timeout: Duration,
    /// Pause after a non-empty batch before reading again.
    pub poll_interval: Duration,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            block_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Something the tail hands to its observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailItem {
    /// An event of the tailed run.
    Event(LogEntry),
    /// Still waiting; nothing for this run arrived recently.
    Heartbeat,
}

#[derive(Debug)]
enum TailState {
    AwaitingEvents,
    Emitting(VecDeque<LogEntry>),
    Terminated,
}

/// Tail of one run.
pub struct RunTail {
    log: Arc<dyn EventLog>,
    run_id: RunId,
    config: TailConfig,
    cursor: LogPosition,
    state: TailState,
    /// Sleep `poll_interval` before the next read.
    throttle: bool,
    /// When the observer last received something.
    last_yield: Instant,
}

impl RunTail {
    pub fn new(log: Arc<dyn EventLog>, run_id: RunId, config: TailConfig) -> Self {
        Self {
            log,
            run_id,
            config,
            cursor: LogPosition::GENESIS,
            state: TailState::AwaitingEvents,
            throttle: false,
            last_yield: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Last log position consumed.
    pub fn cursor(&self) -> LogPosition {
        self.cursor
    }

    /// Advance the tail. `None` once the run's terminal event was yielded or
    /// a read failed.
    pub async fn next_item(&mut self) -> Option<Result<TailItem, LogError>> {
        loop {
            match std::mem::replace(&mut self.state, TailState::Terminated) {
                TailState::Terminated => return None,
                TailState::Emitting(mut queue) => {
                    let Some(entry) = queue.pop_front() else {
                        self.state = TailState::AwaitingEvents;
                        continue;
                    };

                    self.state = if entry.event.is_terminal() {
                        debug!(run_id = %self.run_id, position = %entry.position, "Tail reached terminal event");
                        TailState::Terminated
                    } else if queue.is_empty() {
                        TailState::AwaitingEvents
                    } else {
                        TailState::Emitting(queue)
                    };
                    self.last_yield = Instant::now();
                    return Some(Ok(TailItem::Event(entry)));
                }
                TailState::AwaitingEvents => {
                    if self.throttle {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }

                    // A failed read leaves the state Terminated.
                    let batch = match self
                        .log
                        .read_from(self.cursor, self.config.batch_size, self.config.block_timeout)
                        .await
                    {
                        Ok(batch) => batch,
                        Err(e) => return Some(Err(e)),
                    };

                    self.throttle = !batch.is_empty();
                    if let Some(last) = batch.last() {
                        self.cursor = last.position;
                    }

                    let matching: VecDeque<LogEntry> = batch
                        .into_iter()
                        .filter(|entry| entry.event.run_id == self.run_id)
                        .collect();

                    if !matching.is_empty() {
                        self.state = TailState::Emitting(matching);
                        continue;
                    }

                    self.state = TailState::AwaitingEvents;
                    if !self.throttle || self.last_yield.elapsed() >= self.config.block_timeout {
                        trace!(run_id = %self.run_id, cursor = %self.cursor, "Tail heartbeat");
                        self.last_yield = Instant::now();
                        return Some(Ok(TailItem::Heartbeat));
                    }
                }
            }
        }
    }

    /// Turn the tail into a stream. Dropping the stream stops polling.
    pub fn into_stream(self) -> impl Stream<Item = Result<TailItem, LogError>> + Send {
        stream::unfold(self, |mut tail| async move {
            let item = tail.next_item().await?;
            Some((item, tail))
        })
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use agentops_core::{EventType, RunEvent};
    use agentops_log::MemoryEventLog;
    use agentops_worker::{StepSchedule, WorkerConfig, WorkerPool};

    use crate::producer::Producer;

    fn fast_config() -> TailConfig {
        TailConfig {
            batch_size: 50,
            block_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1),
        }
    }

    async fn collect(tail: RunTail) -> Vec<TailItem> {
        tail.into_stream().map(|item| item.unwrap()).collect().await
    }

    fn events(items: &[TailItem]) -> Vec<&LogEntry> {
        items
            .iter()
            .filter_map(|item| match item {
                TailItem::Event(entry) => Some(entry),
                TailItem::Heartbeat => None,
            })
            .collect()
    }

    async fn completed_run(log: &Arc<dyn EventLog>, goal: &str) -> RunId {
        let run_id = RunId::generate();
        let steps = [
            EventType::RunStarted,
            EventType::Step,
            EventType::FinalOutput,
            EventType::RunCompleted,
        ];
        for event_type in steps {
            let message = if event_type == EventType::RunStarted { goal } else { "x" };
            log.append(RunEvent::new(run_id.clone(), event_type, message))
                .await
                .unwrap();
        }
        run_id
    }

    #[tokio::test]
    async fn test_tail_filters_and_terminates() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let other = completed_run(&log, "other").await;
        let run_id = completed_run(&log, "mine").await;
        // Events past the terminal one are never forwarded.
        log.append(RunEvent::run_completed(run_id.clone())).await.unwrap();

        let items = collect(RunTail::new(log.clone(), run_id.clone(), fast_config())).await;
        let matched = events(&items);

        assert_eq!(matched.len(), 4);
        assert!(matched.iter().all(|e| e.event.run_id == run_id));
        assert!(matched.iter().all(|e| e.event.run_id != other));
        assert_eq!(matched[3].event.event_type, EventType::RunCompleted);
        assert!(matches!(items.last(), Some(TailItem::Event(_))));
    }

    #[tokio::test]
    async fn test_replay_is_repeatable() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        completed_run(&log, "a").await;
        let run_id = completed_run(&log, "b").await;

        let first = collect(RunTail::new(log.clone(), run_id.clone(), fast_config())).await;
        let second = collect(RunTail::new(log.clone(), run_id.clone(), fast_config())).await;

        assert_eq!(events(&first), events(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_before_first_event() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let run_id = RunId::generate();
        let mut tail = RunTail::new(log.clone(), run_id.clone(), fast_config());

        let first = tail.next_item().await.unwrap().unwrap();
        assert_eq!(first, TailItem::Heartbeat);

        log.append(RunEvent::run_started(run_id.clone(), "hello"))
            .await
            .unwrap();
        let second = tail.next_item().await.unwrap().unwrap();
        assert!(matches!(second, TailItem::Event(ref e) if e.event.event_type == EventType::RunStarted));
        assert_eq!(tail.cursor(), LogPosition::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_through_unrelated_traffic() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let config = fast_config();
        let mut tail = RunTail::new(log.clone(), RunId::generate(), config.clone());

        let writer = {
            let log = log.clone();
            tokio::spawn(async move {
                loop {
                    log.append(RunEvent::run_started(RunId::generate(), "noise"))
                        .await
                        .unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let item = tokio::time::timeout(config.block_timeout * 3, tail.next_item())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(item, TailItem::Heartbeat);
        assert!(tail.cursor() > LogPosition::GENESIS);
        writer.abort();
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_tail() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let mut stream = Box::pin(
            RunTail::new(log.clone(), RunId::generate(), fast_config()).into_stream(),
        );

        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item, TailItem::Heartbeat);
        drop(stream);

        // The log is untouched by the tail going away.
        assert_eq!(log.entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submitted_runs_stream_to_completion() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let config = WorkerConfig {
            block_timeout: Duration::from_millis(50),
            step_delay: Duration::from_millis(1),
            ..WorkerConfig::default()
        };
        let schedule = StepSchedule::standard(config.step_delay);
        let pool = WorkerPool::spawn(log.clone(), config, schedule, 2);
        let producer = Producer::new(log.clone());

        let cases = [
            ("refund my order", "Refund Approved"),
            ("order is late, apologize with 10% off", "SORRY10"),
            ("hello", "\n\nhello\n\n"),
        ];

        for (goal, expected) in cases {
            let run_id = producer.submit(goal).await.unwrap();
            let tail = RunTail::new(log.clone(), run_id.clone(), fast_config());
            let items = tokio::time::timeout(Duration::from_secs(10), collect(tail))
                .await
                .unwrap();
            let matched = events(&items);

            let types: Vec<EventType> = matched.iter().map(|e| e.event.event_type).collect();
            assert_eq!(
                types,
                vec![
                    EventType::RunStarted,
                    EventType::Step,
                    EventType::ToolCalled,
                    EventType::Step,
                    EventType::FinalOutput,
                    EventType::RunCompleted,
                ],
                "goal: {goal}"
            );
            assert!(matched[4].event.message.contains(expected), "goal: {goal}");
            assert!(matched.windows(2).all(|w| w[0].position < w[1].position));
        }

        pool.shutdown().await;
    }
}

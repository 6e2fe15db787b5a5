//! Tests for `ProgressChannel` and `ProgressReporter`.

use futures::StreamExt;

use crate::reporter::ProgressChannel;
use crate::types::{LogEntry, OutcomeKind, Severity};

#[test]
fn begin_resets_previous_run() {
  let channel = ProgressChannel::new();
  let mut r = channel.reporter();
  r.begin("initializing");
  r.set_total(2);
  r.advance();
  r.record(OutcomeKind::Fail, LogEntry::error("row 1: boom"));
  r.finish("done", false);

  let mut r = channel.reporter();
  r.begin("again");
  let s = channel.current();
  assert!(s.running);
  assert_eq!(s.status_message, "again");
  assert!(s.log.is_empty());
  assert_eq!(s.fail_count, 0);
}

#[test]
fn advance_never_passes_total() {
  let channel = ProgressChannel::new();
  let mut r = channel.reporter();
  r.begin("x");
  r.set_total(1);
  assert_eq!(r.advance(), 1);
  assert_eq!(r.advance(), 1);
  assert!(r.state().is_consistent());
}

#[test]
fn finish_clears_running_and_keeps_counts() {
  let channel = ProgressChannel::new();
  let mut r = channel.reporter();
  r.begin("x");
  r.set_total(2);
  r.advance();
  r.record(OutcomeKind::Success, LogEntry::success("row 1"));
  r.advance();
  r.record(OutcomeKind::Skip, LogEntry::info("row 2"));
  let summary = r.finish("completed", false);
  assert_eq!(summary.success_count, 1);
  assert_eq!(summary.skip_count, 1);
  assert!(!summary.cancelled);

  let s = channel.current();
  assert!(!s.running);
  assert_eq!(s.current_index, s.total);
  assert_eq!(s.status_message, "completed");
  assert_eq!(s.log.len(), 2);
  assert_eq!(s.log.newest_first().next().unwrap().severity, Severity::Info);
}

#[test]
fn subscribers_see_latest_snapshot() {
  let channel = ProgressChannel::new();
  let rx = channel.subscribe();
  let mut r = channel.reporter();
  r.begin("x");
  r.set_total(5);
  r.advance();
  r.set_status("processing");
  let seen = rx.borrow().clone();
  assert_eq!(seen.current_index, 1);
  assert_eq!(seen.total, 5);
  assert_eq!(seen.status_message, "processing");
}

#[tokio::test]
async fn stream_yields_current_state_first() {
  let channel = ProgressChannel::new();
  let mut r = channel.reporter();
  r.begin("streaming");
  let mut stream = channel.stream();
  let first = stream.next().await.unwrap();
  assert_eq!(first.status_message, "streaming");
}

#[test]
fn log_is_bounded() {
  let channel = ProgressChannel::new();
  let mut r = channel.reporter();
  r.begin("x");
  for i in 0..120 {
    r.append_log(LogEntry::info(format!("line {}", i)));
  }
  assert_eq!(channel.current().log.len(), 50);
}

#[test]
fn receivers_are_woken_on_publish() {
  let channel = ProgressChannel::new();
  let mut rx = channel.subscribe();
  let mut changed = tokio_test::task::spawn(async move { rx.changed().await });
  tokio_test::assert_pending!(changed.poll());

  let mut r = channel.reporter();
  r.begin("woken");
  assert!(changed.is_woken());
  tokio_test::assert_ready_ok!(changed.poll());
}

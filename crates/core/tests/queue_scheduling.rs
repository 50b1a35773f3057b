//! Scheduler behavior tests, driven through scripted tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use transonic_core::queue::{QueueConfig, TaskQueue};
use transonic_core::testing::{ScriptedHandle, ScriptedTask};
use transonic_core::Task;

async fn queue_of(
    count: usize,
    max_jobs: usize,
) -> (TaskQueue<ScriptedTask>, Vec<ScriptedHandle>) {
    let mut queue = TaskQueue::new(QueueConfig { max_jobs });
    let mut handles = Vec::new();
    for _ in 0..count {
        let (task, handle) = ScriptedTask::new();
        queue.add(task).await;
        handles.push(handle);
    }
    (queue, handles)
}

#[tokio::test]
async fn run_fills_exactly_min_of_limit_and_count() {
    for (count, max_jobs) in [(5usize, 2usize), (2, 5), (3, 3), (1, 1), (8, 4)] {
        let (mut queue, _handles) = queue_of(count, max_jobs).await;
        queue.run().await;

        assert_eq!(queue.running_len(), count.min(max_jobs));
        assert_eq!(queue.pending_len(), count - count.min(max_jobs));
        assert_eq!(queue.done_len(), 0);
    }
}

#[tokio::test]
async fn tasks_are_never_lost_or_duplicated() {
    let (mut queue, handles) = queue_of(3, 2).await;
    queue.run().await;

    // Interleave adds with a running queue.
    let (task, h4) = ScriptedTask::new();
    queue.add(task).await;
    let (task, h5) = ScriptedTask::new();
    queue.add(task).await;

    assert_eq!(queue.total(), 5);
    assert_eq!(
        queue.pending_len() + queue.running_len() + queue.done_len(),
        5
    );

    // Finish in start order; each completion starts the next pending task.
    for handle in handles.iter().chain([&h4, &h5]) {
        handle.finish();
        queue.step().await;
    }

    assert_eq!(queue.done_len(), 5);
    assert_eq!(queue.total(), 5);
    assert!(queue.is_finished());
}

#[tokio::test]
async fn five_tasks_two_slots_end_to_end() {
    let (mut queue, handles) = queue_of(5, 2).await;
    let finished_calls = Arc::new(AtomicUsize::new(0));
    {
        let finished_calls = Arc::clone(&finished_calls);
        queue.on_finished(move || {
            finished_calls.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.run().await;
    assert_eq!(queue.running_len(), 2);
    assert_eq!(queue.pending_len(), 3);

    // As the first two complete, the next two start.
    handles[0].finish();
    queue.step().await;
    handles[1].finish();
    queue.step().await;
    assert_eq!(queue.done_len(), 2);
    assert_eq!(queue.running_len(), 2);
    assert_eq!(queue.pending_len(), 1);

    handles[2].finish();
    queue.step().await;
    handles[3].finish();
    queue.step().await;
    handles[4].finish();
    queue.step().await;

    assert!(queue.is_finished());
    assert_eq!(queue.done_len(), 5);
    assert_eq!(finished_calls.load(Ordering::SeqCst), 1);

    // No further completion fires on extra steps.
    assert!(queue.step().await);
    assert_eq!(finished_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn done_list_is_completion_order() {
    let mut queue = TaskQueue::new(QueueConfig { max_jobs: 2 });
    let (first, h0) = ScriptedTask::with_weight(10.0);
    let (second, h1) = ScriptedTask::with_weight(20.0);
    queue.add(first).await;
    queue.add(second).await;
    queue.run().await;

    // The second task finishes first.
    h1.finish();
    queue.step().await;
    h0.finish();
    queue.step().await;

    let weights: Vec<Option<f64>> = queue.done_tasks().map(|t| t.progress().weight).collect();
    assert_eq!(weights, vec![Some(20.0), Some(10.0)]);
}

#[tokio::test]
async fn pause_freezes_progress_and_resume_unfreezes() {
    let (mut queue, handles) = queue_of(2, 2).await;
    queue.run().await;

    handles[0].set_progress(0.25);
    handles[1].set_progress(0.5);
    queue.step().await;
    queue.step().await;

    queue.pause().await;
    assert!(queue.is_paused());
    assert_eq!(handles[0].pauses(), 1);
    assert_eq!(handles[1].pauses(), 1);

    // No events flow while paused: two samples separated by time are equal.
    let before = queue.get_progress();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let after = queue.get_progress();
    assert_eq!(before, after);
    assert!((before - 0.375).abs() < 1e-9);

    queue.resume().await;
    assert!(!queue.is_paused());
    assert_eq!(handles[0].resumes(), 1);

    handles[0].set_progress(0.75);
    queue.step().await;
    assert!(queue.get_progress() > before);
}

#[tokio::test]
async fn cancel_returns_running_tasks_to_pending() {
    let (mut queue, handles) = queue_of(3, 2).await;
    queue.run().await;

    handles[0].set_progress(0.8);
    queue.step().await;

    queue.cancel().await;
    assert_eq!(queue.running_len(), 0);
    assert_eq!(queue.pending_len(), 3);
    assert_eq!(handles[0].cancels(), 1);
    assert_eq!(handles[1].cancels(), 1);
    assert!(!queue.is_finished());

    // Nothing restarts until run() is called again.
    assert_eq!(handles[0].runs(), 1);

    queue.run().await;
    assert_eq!(queue.running_len(), 2);
    // Restarted from scratch, not from a checkpoint.
    assert_eq!(queue.get_progress(), 0.0);
    let restarted = handles.iter().filter(|h| h.runs() == 2).count();
    assert_eq!(restarted, 2);
}

#[tokio::test]
async fn cancelled_pipeline_events_are_dropped() {
    let (mut queue, handles) = queue_of(1, 1).await;
    queue.run().await;

    // The old run cycle's sink is gone after cancel; a late finish from it
    // must not complete the re-queued task.
    handles[0].set_progress(0.5);
    queue.cancel().await;
    assert!(!handles[0].is_running());

    queue.run().await;
    assert_eq!(queue.running_len(), 1);
    assert_eq!(queue.done_len(), 0);

    handles[0].finish();
    // The stale event is dropped first, then the live finish lands.
    queue.drive().await;
    assert!(queue.is_finished());
    assert_eq!(queue.done_len(), 1);
}

#[tokio::test]
async fn failed_task_does_not_stop_siblings() {
    let (mut queue, handles) = queue_of(3, 2).await;
    queue.run().await;

    handles[0].fail("decoder blew up");
    queue.step().await;
    assert_eq!(queue.done_len(), 1);
    assert_eq!(queue.error_count(), 1);
    assert_eq!(queue.running_len(), 2);

    handles[1].finish();
    handles[2].finish();
    queue.drive().await;

    assert!(queue.is_finished());
    assert_eq!(queue.done_len(), 3);
    assert_eq!(queue.error_count(), 1);
}

#[tokio::test]
async fn progress_counts_done_and_running_fractions() {
    let (mut queue, handles) = queue_of(4, 2).await;
    queue.run().await;

    handles[0].finish();
    queue.step().await;
    handles[2].set_progress(0.5);
    queue.step().await;

    // 1 done + 0.5 running + 0 running, out of 4.
    assert!((queue.get_progress() - 1.5 / 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn weighted_progress_follows_durations_not_counts() {
    let mut queue = TaskQueue::new(QueueConfig { max_jobs: 2 });
    let (short, h_short) = ScriptedTask::with_weight(100.0);
    let (long, _h_long) = ScriptedTask::with_weight(300.0);
    queue.add(short).await;
    queue.add(long).await;
    queue.run().await;

    h_short.finish();
    queue.step().await;

    // Half the tasks are done, but only a quarter of the audio.
    assert!((queue.get_progress() - 0.5).abs() < 1e-9);
    assert!((queue.weighted_progress() - 0.25).abs() < 1e-9);
    assert!(queue.eta().is_some());
}

#[tokio::test]
async fn empty_queue_has_defined_progress() {
    let queue: TaskQueue<ScriptedTask> = TaskQueue::new(QueueConfig::default());
    assert_eq!(queue.get_progress(), 0.0);
}

// Bounded thumbnail worker pool
//
// Fans a batch of independent jobs out over a small fixed number of worker
// threads and fans results back in over a channel. Results arrive in
// completion order; callers re-sort their catalog entries afterwards, so
// completion order never leaks into the document. One job's failure never
// cancels its siblings.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Mutex;

use log::debug;

use crate::thumbs::{ThumbOutcome, ThumbStatus, ThumbnailGenerator, VideoSource};

/// One unit of work for the pool.
#[derive(Debug, Clone)]
pub struct ThumbJob {
    pub id: String,
    pub source: VideoSource,
}

/// Run a batch with at most `workers` threads. Jobs whose asset already
/// exists are resolved up front without occupying a worker. Blocks until
/// every job has an outcome.
pub fn run_batch(
    generator: &ThumbnailGenerator,
    jobs: Vec<ThumbJob>,
    workers: usize,
) -> Vec<ThumbOutcome> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    let mut pending = VecDeque::new();

    for job in jobs {
        if generator.asset_exists(&job.id) {
            outcomes.push(ThumbOutcome {
                path: generator.asset_path(&job.id),
                id: job.id,
                status: ThumbStatus::AlreadyExists,
            });
        } else {
            pending.push_back(job);
        }
    }

    if pending.is_empty() {
        return outcomes;
    }

    let worker_count = workers.max(1).min(pending.len());
    let expected = pending.len();
    let queue = Mutex::new(pending);
    let (tx, rx) = mpsc::channel::<ThumbOutcome>();

    std::thread::scope(|scope| {
        for n in 0..worker_count {
            let tx = tx.clone();
            let queue = &queue;
            std::thread::Builder::new()
                .name(format!("thumb-worker-{}", n))
                .spawn_scoped(scope, move || loop {
                    let job = {
                        let mut q = queue.lock().unwrap();
                        q.pop_front()
                    };
                    let job = match job {
                        Some(j) => j,
                        None => break,
                    };
                    let outcome = generator.generate(&job.source, &job.id);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                })
                .expect("failed to spawn thumbnail worker");
        }
        drop(tx);

        // Collect in completion order
        for outcome in rx.iter().take(expected) {
            outcomes.push(outcome);
        }
    });

    debug!(
        "Thumbnail batch done: {} outcomes ({} workers)",
        outcomes.len(),
        worker_count
    );
    outcomes
}

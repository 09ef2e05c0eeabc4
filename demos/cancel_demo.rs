//! Queue a handful of prioritized jobs, cancel one before it runs and one
//! while it runs, then shut down.
//!
//! Run with `RUST_LOG=prio_worker=trace cargo run --example cancel_demo`.

use prio_worker::prelude::*;
use std::thread;
use std::time::Duration;

fn job(name: &'static str, priority: Priority, steps: u32) -> TaskRef {
    FnTask::new(move |ctx| {
        for step in 0..steps {
            if ctx.is_exit_pending() {
                println!("{name}: stopping early at step {step}");
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        println!("{name}: done");
    })
    .with_priority(priority)
    .named(name)
    .into_ref()
}

fn main() -> prio_worker::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let worker = WorkerThread::spawn(WorkerConfig::builder().thread_name("demo-worker").build()?)?;

    let long = job("long-running", Priority::REALTIME, 50);
    let low = job("low", Priority::LOW, 2);
    let high = job("high", Priority::HIGH, 2);
    let doomed = job("doomed", Priority::NORMAL, 2);

    let long_id = long.id();
    let doomed_id = doomed.id();

    for task in [long, low, high, doomed] {
        worker.add_task(task);
    }
    println!("queue size: {}", worker.queue_size());

    worker.cancel_task(doomed_id);
    thread::sleep(Duration::from_millis(100));
    worker.cancel_task(long_id);

    thread::sleep(Duration::from_millis(200));
    let stats = worker.stats();
    println!(
        "executed={} cancelled={} skipped={}",
        stats.tasks_executed, stats.tasks_cancelled, stats.tasks_skipped
    );

    worker.shutdown()
}

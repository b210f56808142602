use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};

use crate::engine::state::Trigger;

/// Sending side of the single-slot pass queue.
///
/// At most one pass waits behind the running one; extra triggers fold into it.
#[derive(Clone, Debug)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Trigger>,
}

impl TriggerHandle {
    /// Queue a pass. Returns false when one is already queued or the queue is gone.
    pub fn request(&self, trigger: Trigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(
                    "scheduler: {} trigger coalesced with queued pass",
                    trigger.label()
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side; the pass loop pulls one trigger at a time.
#[derive(Debug)]
pub struct Scheduler {
    rx: mpsc::Receiver<Trigger>,
}

impl Scheduler {
    pub fn channel() -> (TriggerHandle, Scheduler) {
        let (tx, rx) = mpsc::channel(1);
        (TriggerHandle { tx }, Scheduler { rx })
    }

    pub async fn next(&mut self) -> Option<Trigger> {
        self.rx.recv().await
    }
}

/// Fire a startup pass after `startup_delay`, then one every `period`.
pub fn spawn_timer(handle: TriggerHandle, startup_delay: Duration, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(startup_delay).await;
        handle.request(Trigger::Startup);

        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !handle.is_closed() {
            ticks.tick().await;
            handle.request(Trigger::Timer);
        }
    })
}

/// Treat every line typed on stdin as a manual "check now".
pub fn spawn_stdin_trigger(handle: TriggerHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if handle.is_closed() {
                break;
            }
            if handle.request(Trigger::Manual) {
                info!("scheduler: manual check requested");
            }
        }
    })
}

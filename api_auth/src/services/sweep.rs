use std::{sync::Arc, time::Duration};

use common::clock::Clock;
use db::store::UserStore;
use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};

/// Periodically clears reset tokens whose expiry has passed.
pub struct ResetTokenSweeper {
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

/// Running sweep task. Dropping the handle also ends the loop.
pub struct SweepHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ResetTokenSweeper {
    pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        ResetTokenSweeper {
            users,
            clock,
            interval,
        }
    }

    /// One sweep. Failures are logged and reported as zero cleared rows.
    pub async fn run_once(&self) -> u64 {
        match self.users.clear_expired_reset_tokens(self.clock.now()).await {
            Ok(0) => 0,
            Ok(cleared) => {
                log::info!("Cleared {} expired password reset tokens", cleared);
                cleared
            }
            Err(e) => {
                log::error!("Failed to clear expired password reset tokens: {}", e);
                0
            }
        }
    }

    /// Spawns the sweep loop. The first sweep runs one interval after start.
    pub fn start(self) -> SweepHandle {
        let (shutdown, mut stopped) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
            log::info!("Reset token sweeper stopped");
        });

        SweepHandle { shutdown, task }
    }
}

impl SweepHandle {
    /// Signals the loop to exit and waits for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            log::error!("Reset token sweeper task failed: {}", e);
        }
    }
}

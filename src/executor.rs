use std::{
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

use crate::{
    foundation::{
        cancel::CancelToken,
        error::{SongreelError, SongreelResult},
    },
    invocation::InvocationSpec,
    runner::CommandRunner,
};

/// Hard ceiling for a parallel batch. Large enough to never fire for normal batches.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(0xFFF);

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub execution_units: usize,
    pub wait_timeout: Duration,
    /// How often the coordinator re-checks cancellation and the deadline while waiting.
    pub poll_interval: Duration,
    pub force_sequential: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            execution_units: 1,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: Duration::from_millis(100),
            force_sequential: false,
        }
    }
}

impl ExecutorConfig {
    pub fn detect() -> Self {
        let execution_units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            execution_units,
            ..Self::default()
        }
    }

    /// Workers a parallel batch would get: one unit stays with the coordinator.
    pub fn pool_size(&self) -> usize {
        self.execution_units.saturating_sub(1)
    }

    /// Parallel dispatch only pays off with more than 2 units and more than 1 invocation.
    pub fn prefers_parallel(&self, batch_len: usize) -> bool {
        !self.force_sequential && self.execution_units > 2 && batch_len > 1
    }

    pub fn validate(&self) -> SongreelResult<()> {
        if self.wait_timeout.is_zero() {
            return Err(SongreelError::configuration(
                "batch wait timeout must be greater than zero",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SongreelError::configuration(
                "poll interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    Sequential,
    Parallel { workers: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchResult {
    pub videos: usize,
    pub elapsed: Duration,
    pub mode: DispatchMode,
}

/// Run a batch, choosing sequential or parallel dispatch from `cfg`.
///
/// `cancel` is the user's interrupt token. Returns `Err(Aborted)` when it fires, and the first
/// failing invocation's `Process` error otherwise.
#[tracing::instrument(skip_all, fields(batch = invocations.len()))]
pub fn run_batch<R: CommandRunner>(
    invocations: &[InvocationSpec],
    runner: &R,
    cfg: &ExecutorConfig,
    cancel: &CancelToken,
) -> SongreelResult<BatchResult> {
    cfg.validate()?;
    if cfg.prefers_parallel(invocations.len()) {
        run_parallel(invocations, runner, cfg, cancel)
    } else {
        run_sequential(invocations, runner, cancel)
    }
}

/// Run invocations one at a time in list order.
///
/// An interrupt stops dispatch before the next invocation. The in-flight process receives the
/// terminal's interrupt itself, so the runner is given a stop token that never fires.
pub fn run_sequential<R: CommandRunner>(
    invocations: &[InvocationSpec],
    runner: &R,
    cancel: &CancelToken,
) -> SongreelResult<BatchResult> {
    let start = Instant::now();
    let never = CancelToken::new();
    tracing::debug!("dispatching {} invocation(s) sequentially", invocations.len());

    for spec in invocations {
        cancel.check()?;
        let outcome = runner.run(spec, &never);
        // A tool killed by the same Ctrl+C reports a failure; that is still the user's abort.
        cancel.check()?;
        outcome?;
    }

    Ok(BatchResult {
        videos: invocations.len(),
        elapsed: start.elapsed(),
        mode: DispatchMode::Sequential,
    })
}

/// Run invocations on a pool of `execution_units - 1` workers.
///
/// Refuses with `Configuration` (and runs nothing) when that pool would have fewer than 2
/// workers. Any failure, timeout or interrupt tears the pool down: queued work is skipped,
/// in-flight processes are killed and every worker is joined before returning.
pub fn run_parallel<R: CommandRunner>(
    invocations: &[InvocationSpec],
    runner: &R,
    cfg: &ExecutorConfig,
    cancel: &CancelToken,
) -> SongreelResult<BatchResult> {
    let workers = cfg.pool_size();
    if workers < 2 {
        return Err(SongreelError::configuration(format!(
            "parallel processing needs more than 2 execution units, found {}",
            cfg.execution_units
        )));
    }
    cfg.validate()?;

    let start = Instant::now();
    let pool = {
        let _scope = cancel.defer();
        build_worker_pool(workers)?
    };
    cancel.check()?;
    tracing::debug!(
        workers,
        "dispatching {} invocation(s) in parallel",
        invocations.len()
    );

    let stop = CancelToken::new();
    let outcome = pool.in_place_scope(|scope| {
        let (tx, rx) = mpsc::channel::<SongreelResult<()>>();
        for spec in invocations {
            let tx = tx.clone();
            let stop = &stop;
            scope.spawn(move |_| {
                if stop.is_cancelled() {
                    return;
                }
                let _ = tx.send(runner.run(spec, stop));
            });
        }
        drop(tx);

        let outcome = wait_for_workers(&rx, invocations.len(), cfg, cancel, start);
        if outcome.is_err() {
            stop.cancel();
        }
        outcome
        // Leaving the scope joins every spawned job.
    });

    outcome?;
    Ok(BatchResult {
        videos: invocations.len(),
        elapsed: start.elapsed(),
        mode: DispatchMode::Parallel { workers },
    })
}

fn wait_for_workers(
    rx: &mpsc::Receiver<SongreelResult<()>>,
    total: usize,
    cfg: &ExecutorConfig,
    cancel: &CancelToken,
    start: Instant,
) -> SongreelResult<()> {
    let deadline = start + cfg.wait_timeout;
    let mut completed = 0usize;

    while completed < total {
        cancel.check()?;

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(completed, total, "batch wait timed out, terminating workers");
            return Err(SongreelError::Timeout(cfg.wait_timeout));
        }

        match rx.recv_timeout(cfg.poll_interval.min(deadline - now)) {
            Ok(Ok(())) => completed += 1,
            Ok(Err(err)) => {
                cancel.check()?;
                return Err(err);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SongreelError::Other(anyhow::anyhow!(
                    "worker pool stopped after {completed} of {total} invocations"
                )));
            }
        }
    }
    Ok(())
}

fn build_worker_pool(workers: usize) -> SongreelResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("songreel-worker-{i}"))
        .build()
        .map_err(|e| SongreelError::configuration(format!("failed to build worker pool: {e}")))
}

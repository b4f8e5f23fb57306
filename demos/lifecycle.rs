//! # Lifecycle Example
//!
//! Walks three resources through the whole lifecycle with the built-in `LogWriter`:
//! - `config` loads its value in `need`
//! - `db` validates it in `check` and connects in `activate`
//! - `cache` flips between unhealthy and healthy across two probes
//!
//! The process then refreshes, and stops on Ctrl-C (or after a few seconds).
//!
//! ## Run
//! ```bash
//! RUST_LOG=vigil=debug cargo run --example lifecycle
//! ```

use std::{
    future::ready,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vigil::{
    Config, Health, HealedReply, HookError, KillDecision, LogWriter, Orchestrator, RefreshReply,
    Resource, Signal, Subscribe, TerminateFn, Verdict, exit_code,
};

fn resources(orch: &Orchestrator, cache_up: &Arc<AtomicBool>) -> anyhow::Result<()> {
    orch.resource(
        "config",
        Resource::new(String::new())
            .need(|ctx| async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                let dsn = if ctx.signal == Signal::Refresh {
                    "postgres://replica:5432/app"
                } else {
                    "postgres://primary:5432/app"
                };
                Ok::<_, HookError>(dsn.to_string())
            })
            .on_refresh(|ctx| {
                println!("[config] reloading (was {:?})", ctx.value);
                ready(Ok::<_, HookError>(RefreshReply { acknowledged: true }))
            }),
    )?;

    orch.resource(
        "db",
        Resource::new(0_u32)
            .need(|_ctx| ready(Ok::<_, HookError>(16)))
            .check(|ctx| ready(Ok::<_, HookError>(ctx.value > 0)))
            .activate(|ctx, reload| async move {
                println!("[db] pool of {} connections (reload={reload})", ctx.value);
                Ok::<_, HookError>(Verdict::default())
            })
            .on_stop(|_probe| ready(Ok::<_, HookError>(true))),
    )?;

    let up = Arc::clone(cache_up);
    orch.resource(
        "cache",
        Resource::new(())
            .on_healthcheck(move |_probe, default| {
                let healthy = up.load(Ordering::SeqCst);
                ready(Ok::<_, HookError>(Health { healthy, ..default }.with("latency_ms", 3)))
            })
            .sick(|probe| {
                println!("[{}] sick, keeping the process alive", probe.name);
                ready(Ok::<_, HookError>(KillDecision { kill: false }))
            })
            .on_healed(|probe, _health| {
                println!("[{}] healed", probe.name);
                ready(Ok::<_, HookError>(HealedReply {
                    healed: true,
                    kill: false,
                }))
            }),
    )?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vigil=info".into()))
        .init();

    let cfg = Config {
        wakeup_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let orch = Orchestrator::builder(cfg)
        .with_subscribers(subs)
        .with_terminator(TerminateFn::arc(|signal: Signal| {
            println!("terminating after {signal}, exit code {}", exit_code(signal));
        }))
        .build()?;

    let cache_up = Arc::new(AtomicBool::new(false));
    resources(&orch, &cache_up)?;

    orch.wake_up().await?;
    println!("mood after wake_up: {:?}", orch.mood());

    let report = orch.healthcheck().await?;
    println!("probe #1: {}", serde_json::to_string(&report)?);

    cache_up.store(true, Ordering::SeqCst);
    let report = orch.healthcheck().await?;
    println!("probe #2: {}", serde_json::to_string(&report)?);

    let acks = orch.refresh().await?;
    println!("refresh acknowledged by {:?}", acks.keys().collect::<Vec<_>>());

    let token = CancellationToken::new();
    let deadline = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        deadline.cancel();
    });
    println!("press Ctrl-C to stop (or wait 3s)");
    orch.stop_on_shutdown(token).await?;

    // Let the log worker drain.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

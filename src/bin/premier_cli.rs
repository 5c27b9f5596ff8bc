// src/bin/premier_cli.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use prettytable::{row, Table};
use structopt::StructOpt;
use tokio::time;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use premier::{
    function_id, Algorithm, AsyncRedisCounter, AsyncThrottler, MemoryCounter, Policy, RedisConfig,
    ThrottleError, ThrottlerConfig,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "premier_cli",
    about = "Simulate traffic against a throttled function"
)]
struct Opt {
    /// Throttling algorithm to use
    #[structopt(short, long, possible_values = &["fixed_window", "sliding_window", "token_bucket", "leaky_bucket"], default_value = "fixed_window")]
    algorithm: Algorithm,

    /// Calls allowed per duration
    #[structopt(short, long, default_value = "10")]
    quota: u64,

    /// Window or refill period in seconds
    #[structopt(short, long, default_value = "10")]
    duration: u64,

    /// Queue capacity for the leaky bucket
    #[structopt(short, long, default_value = "5")]
    bucket_size: u64,

    /// Give each simulated user their own counter
    #[structopt(short, long)]
    key_maker: bool,

    /// Number of simulated users requests are spread over
    #[structopt(short, long, default_value = "3")]
    users: u32,

    /// Simulation mode
    #[structopt(long, possible_values = &["burst", "steady", "sine_wave"], default_value = "burst")]
    simulation: String,

    /// Number of requests to simulate
    #[structopt(short = "n", long, default_value = "20")]
    num_requests: usize,

    /// Time between requests in milliseconds (steady and sine_wave modes)
    #[structopt(short = "t", long, default_value = "100")]
    request_interval_ms: u64,

    /// Counter store backend
    #[structopt(short, long, possible_values = &["memory", "redis"], default_value = "memory")]
    storage: String,

    /// Redis URL (when using Redis storage)
    #[structopt(long, default_value = "redis://localhost:6379")]
    redis_url: String,

    /// Keyspace for counter keys
    #[structopt(long, default_value = "premier")]
    keyspace: String,

    /// Append a random suffix to the keyspace so runs don't share counters
    #[structopt(long)]
    isolated: bool,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,

    /// Emit logs as JSON lines
    #[structopt(long)]
    json_logs: bool,
}

type Args = (usize, u32);

/// What happened to one simulated request
struct Outcome {
    index: usize,
    user: u32,
    issued_at: String,
    verdict: &'static str,
    detail: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let filter = if opt.disable_logs {
        "premier_cli=error,premier=error".to_string()
    } else {
        let log_level = match opt.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        format!("premier_cli={},premier={}", log_level, log_level)
    };
    let builder = FmtSubscriber::builder().with_env_filter(EnvFilter::new(filter));
    if opt.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    let keyspace = if opt.isolated {
        format!("{}-{}", opt.keyspace, Uuid::new_v4())
    } else {
        opt.keyspace.clone()
    };

    let throttler = Arc::new(AsyncThrottler::new());
    let config = ThrottlerConfig::new(keyspace, opt.algorithm);
    match opt.storage.as_str() {
        "redis" => {
            let store = AsyncRedisCounter::new(RedisConfig::new(opt.redis_url.clone())).await?;
            throttler.configure(Arc::new(store), config);
        }
        _ => throttler.configure(Arc::new(MemoryCounter::default()), config),
    }

    info!(
        "Running {} simulation: {} calls per {}s with {}",
        opt.simulation, opt.quota, opt.duration, opt.algorithm
    );

    let outcomes = run_simulation(&opt, Arc::clone(&throttler), &stop).await?;
    print_report(&opt, &outcomes);

    if opt.isolated {
        throttler.clear().await?;
    }
    Ok(())
}

async fn run_simulation(
    opt: &Opt,
    throttler: Arc<AsyncThrottler>,
    stop: &AtomicBool,
) -> Result<Vec<Outcome>, Box<dyn std::error::Error>> {
    let mut builder = Policy::<Args>::builder()
        .quota(opt.quota)
        .duration(opt.duration)
        .bucket_size(opt.bucket_size);
    if opt.key_maker {
        builder = builder.key_maker(|(_, user): &Args| format!("user-{}", user));
    }
    let policy = builder.build()?;

    let handle_request = policy.wrap_async(
        throttler,
        function_id!("handle_request"),
        |(index, _): Args| async move { (index, chrono::Local::now()) },
    )?;

    let progress = ProgressBar::new(opt.num_requests as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let base_interval = Duration::from_millis(opt.request_interval_ms);
    let users = opt.users.max(1);
    let mut outcomes = Vec::with_capacity(opt.num_requests);
    let mut pending = Vec::new();

    for index in 0..opt.num_requests {
        if stop.load(Ordering::SeqCst) {
            warn!("Interrupted after {} requests", index);
            break;
        }

        let request_time = Instant::now();
        let user = index as u32 % users;
        let issued_at = chrono::Local::now().format("%H:%M:%S%.3f").to_string();

        let (verdict, detail) = match handle_request.call_deferred((index, user)).await {
            Ok(handle) => {
                pending.push((outcomes.len(), handle));
                ("ADMITTED", String::new())
            }
            Err(ThrottleError::QuotaExceeded { remaining, .. }) => {
                ("REJECTED", format!("retry in {:.2}s", remaining))
            }
            Err(ThrottleError::CapacityExceeded { bucket_size }) => {
                ("OVERFLOW", format!("{} already queued", bucket_size))
            }
            Err(e) => {
                error!("Counter store failure: {}", e);
                progress.abandon_with_message("store failure");
                return Err(e.into());
            }
        };

        outcomes.push(Outcome {
            index,
            user,
            issued_at,
            verdict,
            detail,
        });
        progress.set_message(verdict);
        progress.inc(1);

        let interval = match opt.simulation.as_str() {
            "steady" => base_interval,
            "sine_wave" => {
                // One full cycle over the run, between 0.5x and 1.5x the base interval
                let phase = (index as f64 * std::f64::consts::PI * 2.0) / (opt.num_requests as f64);
                base_interval.mul_f64(1.0 + 0.5 * phase.sin())
            }
            _ => Duration::ZERO,
        };
        let elapsed = request_time.elapsed();
        if elapsed < interval {
            time::sleep(interval - elapsed).await;
        }
    }
    progress.finish_with_message("done");

    // Queued calls finish at their scheduled times
    for (slot, handle) in pending {
        let (_, ran_at) = handle.await?;
        outcomes[slot].detail = format!("ran at {}", ran_at.format("%H:%M:%S%.3f"));
    }

    Ok(outcomes)
}

fn print_report(opt: &Opt, outcomes: &[Outcome]) {
    let mut table = Table::new();
    table.set_titles(row!["#", "User", "Issued", "Verdict", "Detail"]);
    for outcome in outcomes {
        table.add_row(row![
            outcome.index + 1,
            outcome.user,
            outcome.issued_at,
            outcome.verdict,
            outcome.detail
        ]);
    }
    table.printstd();

    let count = |verdict: &str| outcomes.iter().filter(|o| o.verdict == verdict).count();
    println!("\n{} Simulation Results:", opt.simulation);
    println!("-------------------------");
    println!("Algorithm: {}", opt.algorithm);
    println!("Total requests: {}", outcomes.len());
    println!("Admitted: {}", count("ADMITTED"));
    println!("Rejected: {}", count("REJECTED"));
    println!("Overflowed: {}", count("OVERFLOW"));
}

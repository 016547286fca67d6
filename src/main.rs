use anyhow::{Context, Result};
use std::path::Path;

use moth_bench::bench::config::{MockServerConfig, RunConfig};
use moth_bench::bench::reference::{self, ReferenceRegistry};
use moth_bench::bench::{
    leaderboard, scorecard, BenchmarkRunner, CancelToken, MockChatServer, ProgressEvent,
    RunSummary, TestStatus,
};
use moth_bench::config::{self, CliArgs, Command, OutputArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::load();

    // Initialize logging with a configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Run {
            endpoint_url,
            request,
            output,
        } => {
            let endpoint_url = resolve_endpoint(endpoint_url).await?;
            run_benchmark(request.to_run_config(&endpoint_url), &output).await
        }

        Command::Standalone {
            latency_ms,
            jitter_ms,
            error_rate,
            request,
            output,
        } => {
            let mut server = MockChatServer::new(MockServerConfig {
                latency_ms,
                jitter_ms,
                error_rate,
                ..Default::default()
            });
            let port = server
                .start()
                .await
                .context("Failed to start the mock endpoint")?;
            tracing::info!("🦋 Mock endpoint listening on 127.0.0.1:{}", port);

            let result = run_benchmark(request.to_run_config(&server.url()), &output).await;
            server.stop();
            result
        }

        Command::Export {
            summary,
            references,
            output,
        } => export_saved(&summary, references.as_deref(), &output),
    }
}

/// Endpoint from CLI/env, or asked for interactively when a terminal is attached
async fn resolve_endpoint(endpoint_url: Option<String>) -> Result<String> {
    if let Some(url) = endpoint_url.filter(|url| !url.trim().is_empty()) {
        return Ok(url);
    }
    if !config::needs_interactive_setup(None) {
        anyhow::bail!("No endpoint configured: pass --endpoint-url or set ENDPOINT_URL");
    }

    // dialoguer blocks on stdin
    tokio::task::spawn_blocking(config::run_interactive_setup)
        .await
        .context("Interactive setup was interrupted")?
}

/// Run the full catalog against `run_config`, then report and export
async fn run_benchmark(run_config: RunConfig, output: &OutputArgs) -> Result<()> {
    let runner = BenchmarkRunner::new().context("Cannot start without a valid test catalog")?;

    let registry = ReferenceRegistry::load_first(&reference::candidate_paths(
        output.references.as_deref(),
    ));
    if registry.is_empty() {
        tracing::warn!("No reference entries loaded, the leaderboard will only show this run");
    } else {
        tracing::info!("Loaded {} reference entries", registry.len());
    }

    print_startup_banner(&run_config, runner.catalog().len());

    let mut handle = runner.start(run_config)?;
    tracing::info!("Run id: {}", handle.run_id());
    let signal_task = tokio::spawn(cancel_on_signal(handle.cancel_token()));

    while let Some(event) = handle.next_event().await {
        print_event(&event);
    }
    let summary = handle.wait().await;
    // Ctrl+C after this point should terminate the process as usual.
    signal_task.abort();
    let summary = summary?;

    let rows = leaderboard::build(&summary, &registry);

    scorecard::print_table(&summary, &rows);

    if let Some(path) = &output.save_summary {
        std::fs::write(path, scorecard::to_json(&summary)?)
            .with_context(|| format!("Failed to save run summary to {}", path.display()))?;
        println!("💾 Run summary saved to {}", path.display());
    }

    if output.json {
        println!("{}", scorecard::to_json(&summary)?);
    }

    if !output.no_export {
        scorecard::write_to(&output.output, &summary, &rows)?;
        println!("📄 Scorecard written to {}", output.output.display());
    }

    Ok(())
}

/// Re-render a scorecard from a previously saved summary
fn export_saved(summary_path: &Path, references: Option<&str>, output: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(summary_path)
        .with_context(|| format!("Failed to read {}", summary_path.display()))?;
    let summary: RunSummary = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a saved run summary", summary_path.display()))?;

    let registry = ReferenceRegistry::load_first(&reference::candidate_paths(references));
    let rows = leaderboard::build(&summary, &registry);

    scorecard::write_to(output, &summary, &rows)?;
    println!("📄 Scorecard written to {}", output.display());
    Ok(())
}

/// One console line per progress event
fn print_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::RunStarted { run_id, total } => {
            println!("▶ Run {} started ({} tests)", run_id, total);
        }
        ProgressEvent::TestStarted { .. } => {}
        ProgressEvent::TestFinished {
            test_id,
            category,
            status,
            latency_seconds,
            excerpt,
        } => {
            let icon = match status {
                TestStatus::Success => "✅",
                TestStatus::Timeout => "⏱️",
                TestStatus::Error => "❌",
            };
            println!(
                "[{:>2}] {:<8} {} {:>6.2}s  {}",
                test_id,
                category,
                icon,
                latency_seconds,
                scorecard::truncate_chars(excerpt, 60)
            );
        }
        ProgressEvent::TestAborted { test_id } => {
            println!("[{:>2}] aborted", test_id);
        }
        ProgressEvent::RunFinished {
            completed,
            total,
            cancelled,
        } => {
            if *cancelled {
                println!("⏹ Run cancelled after {}/{} tests", completed, total);
            } else {
                println!("■ Run finished: {}/{} tests", completed, total);
            }
        }
    }
}

/// Print startup banner
fn print_startup_banner(run_config: &RunConfig, tests: usize) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                    🦋 Moth-Bench                          ║
║                                                           ║
║     Latency benchmark for chat-completion endpoints       ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("  Endpoint:    {}", run_config.completions_url());
    println!("  Model:       {}", run_config.model);
    println!("  Max tokens:  {}", run_config.max_tokens);
    println!("  Timeout:     {}s", run_config.timeout_secs);
    println!("  Tests:       {}", tests);
    println!("  Press Ctrl+C to stop early; the partial run is still reported.");
    println!();
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn cancel_on_signal(cancel: CancelToken) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, cancelling run...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, cancelling run...");
        },
    }

    cancel.cancel();
}

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use srt_harvester::catalog::{CatalogEnumerator, YoutubeDataApi};
use srt_harvester::cli::{BatchOptions, Cli, Commands};
use srt_harvester::config::Config;
use srt_harvester::coordinator::{Coordinator, Interrupt, RunSettings};
use srt_harvester::dispatch::{CaptionDispatcher, SrtDispatcher};
use srt_harvester::output::{self, Exporter};
use srt_harvester::runner::ChannelRunner;
use srt_harvester::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "srt_harvester=debug" } else { "srt_harvester=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Channel { channel_id, options } => {
            if !utils::looks_like_channel_id(&channel_id) {
                tracing::warn!(
                    "Channel id {} does not look like a YouTube channel id (UC + 22 characters); continuing",
                    channel_id
                );
            }

            let runner = build_runner(&config, &options, cli.quiet)?;
            match runner.run_channel(&channel_id, options.max_videos(), options.dispatch_mode).await {
                Some(result) => output::print_channel_result(&result),
                None => anyhow::bail!("No videos could be fetched for channel {}", channel_id),
            }
        }
        Commands::Batch { channels, channels_file, options } => {
            let mut channel_ids = channels;
            let mut sources = Vec::new();
            if !channel_ids.is_empty() {
                sources.push("args".to_string());
            }
            if let Some(path) = &channels_file {
                channel_ids.extend(utils::load_channel_list(path)?);
                sources.push(format!("file:{}", path.display()));
            }
            if channel_ids.is_empty() {
                anyhow::bail!("No channels given: use --channel or --channels-file");
            }
            tracing::info!("Loaded {} channels", channel_ids.len());

            let runner = build_runner(&config, &options, cli.quiet)?;
            let settings = RunSettings::new(options.max_videos(), options.dispatch_mode, sources.join(","))
                .with_strategy(runner.strategy());

            let (handle, interrupt) = Interrupt::pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, abandoning the current channel and stopping");
                    handle.trigger();
                }
            });

            let coordinator = Coordinator::new(runner)
                .with_channel_delay(config.channel_delay())
                .with_interrupt(interrupt);
            let summary = coordinator.run_all(&channel_ids, &settings).await;

            if summary.has_activity() {
                let exporter = Exporter::new(output_dir(&config, &options), Vec::new());
                match exporter.save_summary(&summary) {
                    Ok(path) => println!("Summary saved to: {}", path.display()),
                    Err(e) => tracing::error!("Failed to save run summary: {:#}", e),
                }
                output::print_run_summary(&summary);
            } else {
                println!("No channels were processed");
            }
        }
        Commands::Srt { video_id, fetch_only, strategy } => {
            let dispatcher = SrtDispatcher::from_config(&config)?;
            let outcome = if fetch_only {
                dispatcher.dispatch(&video_id, true).await
            } else {
                strategy
                    .unwrap_or(config.srt.strategy)
                    .run(&dispatcher, &video_id)
                    .await
            };

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_success() {
                anyhow::bail!("SRT request for {} failed: {}", video_id, outcome.describe());
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
            }
        }
    }

    Ok(())
}

fn output_dir(config: &Config, options: &BatchOptions) -> std::path::PathBuf {
    options.output_dir.clone().unwrap_or_else(|| config.output_dir())
}

fn build_runner(
    config: &Config,
    options: &BatchOptions,
    quiet: bool,
) -> Result<ChannelRunner<YoutubeDataApi, SrtDispatcher>> {
    let api = YoutubeDataApi::from_config(config)?;
    let enumerator = CatalogEnumerator::from_config(api, config);
    let dispatcher = SrtDispatcher::from_config(config)?;

    let mut runner = ChannelRunner::new(enumerator, dispatcher)
        .with_strategy(options.strategy.unwrap_or(config.srt.strategy))
        .with_request_delay(config.request_delay())
        .with_progress(!quiet);

    if !options.no_export {
        let exporter = Exporter::new(output_dir(config, options), config.batch.export_formats.clone());
        runner = runner.with_exporter(exporter);
    }

    Ok(runner)
}

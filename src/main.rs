mod geocode;
mod options;
mod output;

use anyhow::{anyhow, Result};
use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use elevation::{Backend, BatchClient, Resolver, TileClient};
use indicatif::{ProgressBar, ProgressStyle};
use options::{BackendChoice, Cli, Command};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use viewshed::{PipelineConfig, Progress, Scout};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let center = match (&cli.center, &cli.place) {
        (Some(center), _) => center.0,
        (None, Some(query)) => {
            let place = geocode::search(query).await?;
            eprintln!("{} \u{2192} {}", place.display_name, place.point);
            place.point
        }
        (None, None) => return Err(anyhow!("either --center or --place is required")),
    };

    // Anchor the ephemeris near local noon of the requested day so the
    // event search lands on the right calendar date.
    let date = cli.date.unwrap_or_else(|| Utc::now().date_naive());
    let noon = Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).expect("valid time"))
        - Duration::minutes((center.lng * 4.0) as i64);

    let backend = match cli.backend {
        BackendChoice::Tiles => Backend::Tiles(TileClient::with_defaults()?),
        BackendChoice::Api => Backend::Provider(BatchClient::with_defaults()?),
    };
    let resolver = Arc::new(Resolver::new(backend));
    let scout = Scout::new(
        resolver,
        PipelineConfig {
            grid_spacing_m: cli.spacing,
            ..PipelineConfig::default()
        },
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let bar = progress_bar();
    let progress = {
        let bar = bar.clone();
        Arc::new(move |progress: Progress| {
            bar.set_position(u64::from(progress.percent));
            bar.set_message(progress.stage.label());
        })
    };

    let result = scout
        .run(
            center,
            cli.radius_km * 1_000.0,
            noon,
            cli.mode,
            progress,
            &cancel,
        )
        .await;
    bar.finish_and_clear();
    let output = result?;

    match cli.cmd.unwrap_or(Command::Table) {
        Command::Table => output::print_table(&output, cli.top, cli.mode),
        Command::Json => output::print_json(&output, cli.top, cli.mode)?,
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg:24} [{wide_bar:.cyan/blue}] {pos:>3}%")
            .expect("incorrect progress bar format string")
            .progress_chars("#>-"),
    );
    bar
}

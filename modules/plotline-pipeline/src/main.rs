use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atlas_client::{AtlasClient, ColumnMapping};
use plotline_common::Config;
use plotline_pipeline::pipeline::{default_query, load_query};
use plotline_pipeline::simulate::{SimulatedAnalytics, SimulatedDatasets};
use plotline_pipeline::upload::push_csv_dir;
use plotline_pipeline::{AnalyticsApi, DatasetStore, Pipeline, RunSettings};
use starscape_client::StarscapeClient;

#[derive(Parser)]
#[command(name = "plotline")]
#[command(about = "Collect enriched narrative analyses from Starscape")]
#[command(version)]
struct Cli {
    /// Name of the output document (written to <output dir>/<name>.json)
    #[arg(long)]
    name: String,

    /// Atlas dataset id. Scopes every query and receives uploads.
    #[arg(long)]
    dataset_id: Option<String>,

    /// Fabricate results instead of calling the APIs
    #[arg(long)]
    simulate: bool,

    /// Upload CSVs to Atlas before querying
    #[arg(long)]
    upload: bool,

    /// Directory of CSV exports to upload
    #[arg(long, default_value = "csvs")]
    csv_dir: PathBuf,

    /// JSON file holding the top-level query
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Also fetch daily post volume for each narrative
    #[arg(long)]
    volume: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("plotline=info".parse()?)
                .add_directive("starscape_client=info".parse()?)
                .add_directive("atlas_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!(name = cli.name.as_str(), simulate = cli.simulate, "Plotline starting...");

    let config = if cli.simulate {
        Config::simulated()
    } else {
        Config::from_env()?
    };
    config.log_redacted();

    let query = match &cli.query_file {
        Some(path) => load_query(path)?,
        None => default_query(),
    };

    let mut dataset_id = cli.dataset_id.clone();
    if cli.upload {
        let store: Box<dyn DatasetStore> = if cli.simulate {
            Box::new(SimulatedDatasets)
        } else {
            let key = config
                .atlas_api_key
                .clone()
                .context("--upload needs an Atlas API key (ATLAS_API_KEY_FILE)")?;
            Box::new(AtlasClient::with_base_url(&config.atlas_base_url, key))
        };
        let summary = push_csv_dir(
            store.as_ref(),
            &cli.csv_dir,
            &cli.name,
            dataset_id.as_deref(),
            &ColumnMapping::video_comments(),
        )
        .await?;
        if summary.dataset_id.is_some() {
            dataset_id = summary.dataset_id;
        }
    }

    let api: Box<dyn AnalyticsApi> = if cli.simulate {
        Box::new(SimulatedAnalytics::default())
    } else {
        Box::new(StarscapeClient::with_base_url(
            &config.starscape_base_url,
            config.starscape_api_key.clone(),
        ))
    };

    let settings = RunSettings {
        dataset_id,
        volume_window_days: cli.volume.then_some(config.volume_window_days),
        ..RunSettings::from_config(&config)
    };

    let summary = Pipeline::new(api.as_ref(), settings)
        .run(&query, &config.output_dir, &cli.name)
        .await?;

    info!(
        output = %summary.output_path.display(),
        manifest = %summary.manifest_path.display(),
        "Plotline complete"
    );
    Ok(())
}

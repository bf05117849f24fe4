//! mongo-blob-export
//!
//! Exports a MongoDB collection to a timestamped CSV blob.
//!
//! # Usage
//!
//! ```bash
//! # One run (for cron, a managed timer or a Kubernetes CronJob)
//! mongo-blob-export
//!
//! # Long-lived process running every hour
//! mongo-blob-export watch --every 3600
//! ```

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use mongo_blob_export::cli::{CliInterface, Commands};
use mongo_blob_export::error::Result;
use mongo_blob_export::{
    ExportPipeline, IntervalTrigger, MongoSource, ObjectStoreUploader, RunSettings, TriggerEvent,
};

type Pipeline = ExportPipeline<MongoSource, ObjectStoreUploader>;

/// Application entry point
#[tokio::main]
async fn main() {
    // Initialize the application and handle any errors
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// A failed export run is reported through the log and still exits
/// successfully; only an unusable command line or settings file is an error.
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    match cli.command() {
        Commands::Version => {
            println!("mongo-blob-export {}", mongo_blob_export::version());
        }
        Commands::Check => {
            let (report, complete) = cli.check_report(&RunSettings::from_env());
            println!("{}", report);
            if !complete {
                std::process::exit(2);
            }
        }
        Commands::Run => {
            let pipeline = build_pipeline(&cli);
            pipeline
                .run(&TriggerEvent::now(), &RunSettings::from_env())
                .await;
        }
        Commands::Watch { every } => {
            let pipeline = build_pipeline(&cli);
            let trigger = IntervalTrigger::new(Duration::from_secs(every));
            run_watch_loop(&pipeline, trigger).await;
        }
    }

    Ok(())
}

/// Create the production pipeline from the settings file
fn build_pipeline(cli: &CliInterface) -> Pipeline {
    let source = MongoSource::new(cli.config().source.app_name.clone());
    ExportPipeline::from_config(source, ObjectStoreUploader::new(), cli.config())
}

/// Run on every trigger tick until Ctrl+C
///
/// Settings are re-read from the environment for every run.
async fn run_watch_loop(pipeline: &Pipeline, mut trigger: IntervalTrigger) {
    tracing::info!(
        "Running every {} s; press Ctrl+C to stop",
        trigger.period().as_secs()
    );

    loop {
        tokio::select! {
            event = trigger.next() => {
                pipeline.run(&event, &RunSettings::from_env()).await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    eprintln!("Failed to listen for Ctrl+C: {}", err);
                }
                tracing::info!("Shutting down");
                break;
            }
        }
    }
}

/// Initialize logging system based on verbosity level
///
/// `-v`/`--vv` win; otherwise `RUST_LOG` is honoured, then the settings file.
fn initialize_logging(cli: &CliInterface) {
    let level = LevelFilter::from_level(cli.log_level());
    let filter = if cli.verbosity_forced() {
        EnvFilter::default().add_directive(level.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()))
    };

    // Build subscriber with level filter
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // Configure timestamps
    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}

//! Main application orchestration and execution

use crate::{
    cli::Cli,
    collector::MeasurementCollector,
    config::{display_config_summary, load_config, validate_config, EnvManager, ValidationLevel},
    error::Result,
    logging::Logger,
    models::Config,
    output::OutputFormatter,
    reporter::ResultReporter,
    store::ResultStore,
};

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        if self.cli.env_help {
            println!("{}", EnvManager::display_env_help());
            return Ok(());
        }

        if let Some(path) = &self.cli.init_env {
            EnvManager::save_example_env_file(path)?;
            println!("Example environment file written to {}", path.display());
            return Ok(());
        }

        let config = load_config(self.cli.clone())?;
        let formatter = OutputFormatter::new(config.enable_color, config.verbose);

        if let Some(limit) = self.cli.history {
            return Self::show_history(&config, &formatter, limit).await;
        }

        Self::show_warnings(&config)?;
        Self::measure_and_report(&config, &formatter).await
    }

    async fn show_history(config: &Config, formatter: &OutputFormatter, limit: u32) -> Result<()> {
        let store = ResultStore::new(
            config.storage.database_path.clone(),
            config.storage.format,
            Logger::disabled(),
        );
        let results = store.recent(limit).await?;
        println!("{}", formatter.format_history(&results));
        Ok(())
    }

    fn show_warnings(config: &Config) -> Result<()> {
        let warnings = validate_config(config)?;

        if config.debug {
            eprintln!("{}", crate::build_info());
            eprintln!("\nConfiguration Summary:");
            eprintln!("{}\n", display_config_summary(config));
        }

        let shown: Vec<_> = warnings
            .iter()
            .filter(|w| config.verbose || config.debug || w.level != ValidationLevel::Info)
            .collect();
        if !shown.is_empty() {
            eprintln!("Configuration Warnings:");
            for warning in shown {
                eprintln!("  {}", warning.format(config.enable_color));
            }
            eprintln!();
        }

        Ok(())
    }

    async fn measure_and_report(config: &Config, formatter: &OutputFormatter) -> Result<()> {
        let logger = Logger::from_config(config)?;
        logger.add_context_field("real_run", config.run_mode.real_run).await;
        logger.add_context_field("database", config.storage.database_path.display().to_string()).await;

        logger.info("Speedtest monitor started")
            .field("version", crate::VERSION)
            .field("threshold", config.thresholds.download)
            .field("threshold_mode", config.thresholds.mode.as_str())
            .log()
            .await;

        let collector = MeasurementCollector::new(config, logger.named("collector"))?;
        let measurement = collector.collect().await?;

        let reporter = ResultReporter::new(config, logger.named("reporter"));
        let outcome = reporter.report(&measurement).await;

        println!("{}", formatter.format_run_summary(&measurement, &outcome));

        match outcome.failure() {
            Some(error) => {
                logger.error("Run finished with failed report steps")
                    .error_info(&error)
                    .log()
                    .await;
                Err(error)
            }
            None => {
                logger.info("Run finished").field("hit", outcome.evaluation.is_hit()).log().await;
                Ok(())
            }
        }
    }
}

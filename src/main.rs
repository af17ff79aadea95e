use clap::{CommandFactory, FromArgMatches};
use placement_match::app::pipelines::PlacementPipeline;
use placement_match::core::ConfigProvider;
use placement_match::utils::error::{ErrorSeverity, MatchError};
use placement_match::utils::{logger, validation::Validate};
use placement_match::{CliConfig, LocalStorage, MatchRunner, TomlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let arg_matches = CliConfig::command().get_matches();
    let cli = CliConfig::from_arg_matches(&arg_matches).unwrap_or_else(|e| e.exit());

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting placement-match");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let dry_run = cli.dry_run;
    let result = match cli.config.clone() {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            let mut config = match TomlConfig::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(1);
                }
            };

            // 命令列明確給定的參數優先於設定檔
            for flag in cli.apply_to(&arg_matches, &mut config) {
                tracing::info!("🔧 --{} overrides the configuration file", flag);
            }

            let monitor_enabled = cli.monitor || config.monitoring_enabled();
            execute(config, dry_run, monitor_enabled).await
        }
        None => {
            let monitor_enabled = cli.monitor;
            execute(cli, dry_run, monitor_enabled).await
        }
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ Placement run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn execute<C>(config: C, dry_run: bool, monitor_enabled: bool) -> Result<(), MatchError>
where
    C: ConfigProvider + Validate,
{
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, dry_run);

    let pipeline = PlacementPipeline::new(LocalStorage::current_dir(), config);

    if dry_run {
        tracing::info!("🔍 DRY RUN MODE - No matching will occur");
        return perform_dry_run(&pipeline).await;
    }

    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let runner = MatchRunner::new_with_monitoring(pipeline, monitor_enabled);
    let output_path = runner.run().await?;

    tracing::info!("✅ Placement run completed successfully!");
    println!("✅ Placement run completed successfully!");
    println!("📁 Output saved to: {}", output_path);
    Ok(())
}

fn display_config_summary<C: ConfigProvider>(config: &C, dry_run: bool) {
    let weights = config.weights();
    let options = config.match_options();

    println!("📋 Configuration Summary:");
    println!("  Students: {}", config.students_path());
    println!("  Sites: {}", config.sites_path());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if config.compress_output() {
        println!("  Compression: {} (ZIP)", config.archive_name());
    }
    println!(
        "  Weights: field {:.2} / city {:.2} / special {:.2}",
        weights.field, weights.city, weights.special
    );
    println!("  Top-K: {}", options.top_k);
    println!("  Separate partners: {}", options.separate_partners);

    if dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run<C: ConfigProvider>(
    pipeline: &PlacementPipeline<LocalStorage, C>,
) -> Result<(), MatchError> {
    let preview = pipeline.preview().await?;

    println!("🔍 Dry Run Analysis:");
    println!();

    println!("🔄 Student Columns ({} rows):", preview.student_rows);
    for (field, column, strategy) in preview.students.entries() {
        println!("  {} <- '{}' ({:?})", field, column, strategy);
    }

    println!();
    println!("🔄 Site Columns ({} rows):", preview.site_rows);
    for (field, column, strategy) in preview.sites.entries() {
        println!("  {} <- '{}' ({:?})", field, column, strategy);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
    Ok(())
}

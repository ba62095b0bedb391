use clap::Parser;
use invoice_extractor::domain::model::OcrTier;
use invoice_extractor::domain::ports::ConfigProvider;
use invoice_extractor::utils::error::{ErrorSeverity, ExtractorError};
use invoice_extractor::utils::{logger, validation::Validate};
use invoice_extractor::{
    CliConfig, CommandOcr, DocumentReader, ExtractionEngine, InvoicePipeline, LocalStorage,
    OpenAiChatClient, RunReport, TomlConfig,
};
use std::path::PathBuf;

async fn run<C: ConfigProvider>(
    config: C,
    files: Vec<PathBuf>,
    forced_tier: Option<OcrTier>,
    monitor_enabled: bool,
) -> invoice_extractor::Result<RunReport> {
    if config.api_key().is_none() {
        tracing::warn!("⚠️ No API key set; requests to {} are unauthenticated", config.api_endpoint());
    }

    let model = OpenAiChatClient::from_config(&config)?;
    tracing::info!("🤖 Using model {} at {}", model.model(), config.api_endpoint());

    let ocr = CommandOcr::from_config(&config);
    if ocr.is_none() {
        tracing::warn!("⚠️ No OCR command configured, scans and images cannot be read");
    }
    let reader = DocumentReader::new(ocr);

    // 創建存儲和管道
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = InvoicePipeline::new(storage, config, model, reader).with_forced_tier(forced_tier);

    let engine = ExtractionEngine::new_with_monitoring(pipeline, monitor_enabled);
    engine.run(&files).await
}

fn exit_on_config_error(e: &ExtractorError) -> ! {
    tracing::error!("❌ Configuration validation failed: {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting invoice-extractor");

    // 驗證配置
    if let Err(e) = cli.validate() {
        exit_on_config_error(&e);
    }

    let files: Vec<PathBuf> = cli.files.iter().map(PathBuf::from).collect();
    let forced_tier = cli.forced_tier();

    let result = match cli.config.clone() {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            let config = match TomlConfig::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(1);
                }
            };
            if let Err(e) = config.validate() {
                exit_on_config_error(&e);
            }
            let monitor_enabled = cli.monitor || config.monitoring_enabled();
            run(config, files, forced_tier, monitor_enabled).await
        }
        None => {
            let monitor_enabled = cli.monitor;
            run(cli, files, forced_tier, monitor_enabled).await
        }
    };

    match result {
        Ok(report) => {
            tracing::info!("✅ Extraction finished");
            println!(
                "✅ {} document(s): {} drafted, {} failed",
                report.processed, report.drafted, report.failed
            );
            println!("📁 Output saved to: {}", report.output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Extraction failed: {} (Category: {:?}, Severity: {:?})",
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
    }

    Ok(())
}

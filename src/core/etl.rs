use crate::core::pipeline::failed_invoice;
use crate::core::Pipeline;
use crate::domain::model::{InvoiceStatus, RunReport};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use std::path::PathBuf;
use std::time::Instant;

/// Runs documents through a pipeline one at a time, then writes the batch.
pub struct ExtractionEngine<P: Pipeline> {
    pipeline: P,
    monitor: RunMonitor,
}

impl<P: Pipeline> ExtractionEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    pub fn monitor(&self) -> &RunMonitor {
        &self.monitor
    }

    pub async fn run(&self, files: &[PathBuf]) -> Result<RunReport> {
        tracing::info!("🚀 Processing {} document(s)", files.len());
        let mut invoices = Vec::with_capacity(files.len());

        for (index, path) in files.iter().enumerate() {
            tracing::info!("[{}/{}] {}", index + 1, files.len(), path.display());

            let started = Instant::now();
            let document = match self.pipeline.extract(path).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::error!("❌ Text extraction failed for {}: {}", path.display(), e);
                    invoices.push(failed_invoice(path, &e));
                    continue;
                }
            };
            self.monitor.record("extract", started.elapsed());

            let started = Instant::now();
            let invoice = match self.pipeline.transform(path, document).await {
                Ok(invoice) => invoice,
                Err(e) => {
                    tracing::error!("❌ Processing failed for {}: {}", path.display(), e);
                    failed_invoice(path, &e)
                }
            };
            self.monitor.record("transform", started.elapsed());

            if invoice.status == InvoiceStatus::Draft {
                tracing::info!("✅ {} -> {}", path.display(), invoice.display_name);
            }
            invoices.push(invoice);
        }

        let started = Instant::now();
        let output_path = self.pipeline.load(&invoices).await?;
        self.monitor.record("load", started.elapsed());

        let report = RunReport::summarize(output_path, &invoices);
        tracing::info!(
            "📊 {} processed, {} drafted, {} failed",
            report.processed,
            report.drafted,
            report.failed
        );
        self.monitor.log_final_stats();

        Ok(report)
    }
}

use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// 依序執行 extract -> transform -> load
pub struct MatchRunner<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> MatchRunner<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting placement run");

        let input = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Loaded {} students and {} sites",
            input.students.len(),
            input.sites.len()
        );
        self.monitor.log_stats("Extract");

        let report = self.pipeline.transform(input).await?;
        let stats = &report.summary.stats;
        tracing::info!(
            "🧮 Matched {} students: {} couples, {} singles, {} unassigned",
            stats.students,
            stats.couples_placed,
            stats.singles_placed,
            stats.unassigned
        );
        self.monitor.log_stats("Match");

        let output_path = self.pipeline.load(report).await?;
        tracing::info!("💾 Results written to {} in {:?}", output_path, started.elapsed());
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}

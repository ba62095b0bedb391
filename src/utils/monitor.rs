use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, System};

/// 每個階段累計耗時，啟用時另外記錄記憶體峰值
pub struct RunMonitor {
    enabled: bool,
    start_time: Instant,
    stages: Mutex<BTreeMap<String, Duration>>,
    peak_memory_mb: Mutex<u64>,
    #[cfg(feature = "cli")]
    system: Mutex<System>,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
}

#[derive(Debug, Clone)]
pub struct RunStats {
    pub elapsed: Duration,
    pub stages: BTreeMap<String, Duration>,
    pub peak_memory_mb: u64,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            start_time: Instant::now(),
            stages: Mutex::new(BTreeMap::new()),
            peak_memory_mb: Mutex::new(0),
            #[cfg(feature = "cli")]
            system: Mutex::new(System::new()),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, stage: &str, elapsed: Duration) {
        if let Ok(mut stages) = self.stages.lock() {
            *stages.entry(stage.to_string()).or_default() += elapsed;
        }
        if self.enabled {
            self.sample_memory();
            tracing::debug!("⏱️ {} took {:?}", stage, elapsed);
        }
    }

    #[cfg(feature = "cli")]
    fn sample_memory(&self) {
        let Some(pid) = self.pid else { return };
        let Ok(mut system) = self.system.lock() else { return };
        system.refresh_all();
        if let Some(process) = system.process(pid) {
            let memory_mb = process.memory() / 1024 / 1024;
            if let Ok(mut peak) = self.peak_memory_mb.lock() {
                *peak = (*peak).max(memory_mb);
            }
        }
    }

    #[cfg(not(feature = "cli"))]
    fn sample_memory(&self) {}

    pub fn stats(&self) -> RunStats {
        RunStats {
            elapsed: self.start_time.elapsed(),
            stages: self.stages.lock().map(|s| s.clone()).unwrap_or_default(),
            peak_memory_mb: self.peak_memory_mb.lock().map(|p| *p).unwrap_or(0),
        }
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let stats = self.stats();
        for (stage, elapsed) in &stats.stages {
            tracing::info!("📊 {:<12} {:?}", stage, elapsed);
        }
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            stats.elapsed,
            stats.peak_memory_mb
        );
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

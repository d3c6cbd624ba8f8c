//! Periodic process CPU / memory sampling

use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;

use crate::{MetricsHandle, state::ResourceSample};

/// Sampling cadence
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the resource sampler task
///
/// Samples process RSS and global CPU usage once per second and feeds
/// them to the aggregator until cancelled.
pub fn spawn_resource_sampler(
    handle: MetricsHandle,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());
        let mut tick = tokio::time::interval(SAMPLE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    system.refresh_memory();
                    system.refresh_cpu_usage();
                    system.refresh_processes_specifics(
                        ProcessesToUpdate::Some(&[pid]),
                        true,
                        ProcessRefreshKind::nothing().with_memory(),
                    );

                    let sample = ResourceSample {
                        cpu_fraction: f64::from(system.global_cpu_usage()) / 100.0,
                        process_rss_bytes: system.process(pid).map_or(0, sysinfo::Process::memory),
                        system_memory_bytes: system.total_memory(),
                    };
                    handle.record_resource(sample);
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}

use anyhow::{Context, anyhow};
use fs2::FileExt;
use std::fs::File;

/// Takes the single-instance lock. Only one agent may drive the modem.
pub fn acquire_agent_lock() -> anyhow::Result<File> {
    let mut lock_path = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    lock_path.push("cellconn-agent.lock");

    let file = File::create(&lock_path)
        .with_context(|| format!("Failed to create lock file {}", lock_path.display()))?;

    // Exclusive lock; fails if another instance holds it
    file.try_lock_exclusive()
        .map_err(|_| anyhow!("Another instance is already running"))?;

    Ok(file)
}

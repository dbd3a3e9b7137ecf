use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;

use revisit::config::{Config, ScheduleParams};
use revisit::tracker::Tracker;

/// Scratch notes directory plus a config pointing at a scratch store.
/// Zero jitter and a zero guard window keep scans deterministic.
pub struct Fixture {
    pub notes_dir: PathBuf,
    pub config: Config,
    _tmp: TempDir,
}

pub fn fixture() -> Result<Fixture> {
    fixture_with(ScheduleParams {
        intervals: vec![2, 6, 14],
        jitter: vec![0, 0, 0],
    })
}

pub fn fixture_with(scheduling: ScheduleParams) -> Result<Fixture> {
    let tmp = tempfile::tempdir().context("create tempdir")?;
    let notes_dir = tmp.path().join("notes");
    fs::create_dir_all(&notes_dir).context("create notes dir")?;

    let mut config = Config::new(tmp.path().join("store"), notes_dir.clone());
    config.guard_seconds = 0;
    config.scheduling = scheduling;

    Ok(Fixture {
        notes_dir,
        config,
        _tmp: tmp,
    })
}

impl Fixture {
    pub fn tracker(&self) -> Result<Tracker> {
        Tracker::open(self.config.clone()).context("open tracker")
    }

    pub fn write_note(&self, name: &str, content: &str) -> Result<()> {
        fs::write(self.notes_dir.join(name), content)
            .with_context(|| format!("write note {name}"))
    }

    pub fn remove_note(&self, name: &str) -> Result<()> {
        fs::remove_file(self.notes_dir.join(name))
            .with_context(|| format!("remove note {name}"))
    }
}

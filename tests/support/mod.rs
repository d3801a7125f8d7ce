use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use trk::config::Config;
use trk::store::Store;
use trk::task::TaskRecord;

pub struct TestTracker {
    dir: TempDir,
    config: Config,
}

#[allow(dead_code)]
impl TestTracker {
    pub fn init() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let config = Config::default();
        let mut store = Store::init(dir.path(), &config).expect("init tracker");
        store.close();
        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Store {
        Store::open(self.dir.path(), &self.config).expect("open store")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.path().join(".trk").join("tasks.jsonl")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join(".trk").join("index.db")
    }

    pub fn add_task(&self, id: &str, title: &str) {
        let record = TaskRecord::new(id, title);
        let mut store = self.store();
        store
            .mutate(move |mut records| {
                records.push(record);
                Ok((records, ()))
            })
            .expect("add task");
        store.close();
    }

    pub fn journal_bytes(&self) -> Vec<u8> {
        fs::read(self.journal_path()).expect("read journal")
    }
}

// Test fixtures: a throwaway drop directory with its own index and output

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Small sales export used by most tests
#[allow(dead_code)]
pub const ORDERS_CSV: &str = "\
order_id,customer,status,amount
1001,acme,paid,19.99
1002,globex,refunded,5.00
1003,initech,paid,42.00
";

/// Temporary layout: `in/` is watched, `out/` receives loads
#[allow(dead_code)]
pub struct DropDir {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl DropDir {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("in")).expect("Failed to create input dir");
        Self { dir }
    }

    /// Watched directory (canonical, matching index keys)
    pub fn input(&self) -> PathBuf {
        self.dir
            .path()
            .join("in")
            .canonicalize()
            .expect("Failed to canonicalize input dir")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn index_file(&self) -> PathBuf {
        self.dir.path().join("file_index.json")
    }

    /// Write a file relative to the input dir and return its key
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.input().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn write_csv(&self, name: &str) -> PathBuf {
        self.write(name, ORDERS_CSV)
    }

    /// Lines loaded from the input file at `name` (relative to `in/`)
    pub fn loaded_lines(&self, name: &str) -> Vec<String> {
        let path = self.output().join(format!("{name}.jsonl"));
        read_lines(&path)
    }
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#![allow(dead_code)]

use rustml_hub::{HubError, HubResult, ProgressCallback, SnapshotSource};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Element data for a fixture tensor.
pub enum Data {
    F32(Vec<f32>),
    U32(Vec<u32>),
}

impl Data {
    fn dtype(&self) -> &'static str {
        match self {
            Data::F32(_) => "F32",
            Data::U32(_) => "U32",
        }
    }

    fn bytes(&self) -> Vec<u8> {
        match self {
            Data::F32(v) => bytemuck::cast_slice::<f32, u8>(v).to_vec(),
            Data::U32(v) => bytemuck::cast_slice::<u32, u8>(v).to_vec(),
        }
    }
}

/// F32 fixture of `shape` filled with a ramp starting at `start`.
pub fn ramp(shape: &[usize], start: f32) -> (Vec<usize>, Data) {
    let n: usize = shape.iter().product();
    (shape.to_vec(), Data::F32((0..n).map(|i| start + i as f32 * 0.01).collect()))
}

/// Write a real safetensors file.
pub fn write_shard(path: &Path, entries: Vec<(&str, (Vec<usize>, Data))>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut header = serde_json::Map::new();
    let mut data = Vec::new();
    for (name, (shape, values)) in &entries {
        let start = data.len();
        data.extend(values.bytes());
        header.insert(
            name.to_string(),
            serde_json::json!({
                "dtype": values.dtype(),
                "shape": shape,
                "data_offsets": [start, data.len()],
            }),
        );
    }
    let header = serde_json::to_vec(&serde_json::Value::Object(header)).unwrap();
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(&(header.len() as u64).to_le_bytes()).unwrap();
    f.write_all(&header).unwrap();
    f.write_all(&data).unwrap();
}

/// How the fake hub answers a snapshot request.
pub enum Behavior {
    Succeed(PathBuf),
    Unauthorized,
    Offline,
    ServerError,
}

/// Records every call; never touches the network.
pub struct FakeHub {
    pub behavior: Behavior,
    pub cache_dir: PathBuf,
    pub snapshot_calls: Mutex<Vec<(String, Vec<String>)>>,
    pub local_dir_calls: Mutex<Vec<String>>,
}

impl FakeHub {
    pub fn new(behavior: Behavior, cache_dir: &Path) -> Self {
        Self {
            behavior,
            cache_dir: cache_dir.to_path_buf(),
            snapshot_calls: Mutex::new(Vec::new()),
            local_dir_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshot_calls.lock().unwrap().len()
    }

    pub fn local_dir_count(&self) -> usize {
        self.local_dir_calls.lock().unwrap().len()
    }
}

impl SnapshotSource for FakeHub {
    fn snapshot(&self, repo_id: &str, patterns: &[String], progress: &ProgressCallback<'_>) -> HubResult<PathBuf> {
        self.snapshot_calls
            .lock()
            .unwrap()
            .push((repo_id.to_string(), patterns.to_vec()));
        match &self.behavior {
            Behavior::Succeed(dir) => {
                progress(0, 100);
                progress(100, 100);
                Ok(dir.clone())
            }
            Behavior::Unauthorized => Err(HubError::Unauthorized(format!("{}: status code 401", repo_id))),
            Behavior::Offline => Err(HubError::Offline(format!("{}: Dns Failed", repo_id))),
            Behavior::ServerError => Err(HubError::NetworkError(format!("{}: status code 500", repo_id))),
        }
    }

    fn local_repo_dir(&self, repo_id: &str) -> PathBuf {
        self.local_dir_calls.lock().unwrap().push(repo_id.to_string());
        self.cache_dir.join(repo_id.replace('/', "--"))
    }
}

//! Builders for `.gem` archives used by the integration tests.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A gem archive to be written to disk.
#[derive(Debug, Clone)]
pub struct GemFixture {
    name: String,
    version: String,
    platform: Option<String>,
    bindir: Option<String>,
    require_paths: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
    raw_metadata: Option<String>,
    with_metadata: bool,
    with_data: bool,
}

impl GemFixture {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            platform: None,
            bindir: None,
            require_paths: vec!["lib".to_string()],
            files: vec![(format!("lib/{name}.rb"), format!("module {name}; end\n").into_bytes())],
            raw_metadata: None,
            with_metadata: true,
            with_data: true,
        }
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.platform = Some(platform.to_string());
        self
    }

    pub fn bindir(mut self, bindir: &str) -> Self {
        self.bindir = Some(bindir.to_string());
        self
    }

    pub fn require_paths(mut self, paths: &[&str]) -> Self {
        self.require_paths = paths.iter().map(ToString::to_string).collect();
        self
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// Replace the generated metadata YAML.
    pub fn raw_metadata(mut self, yaml: &str) -> Self {
        self.raw_metadata = Some(yaml.to_string());
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.with_metadata = false;
        self
    }

    pub fn without_data(mut self) -> Self {
        self.with_data = false;
        self
    }

    pub fn full_name(&self) -> String {
        match &self.platform {
            Some(platform) => format!("{}-{}-{}", self.name, self.version, platform),
            None => format!("{}-{}", self.name, self.version),
        }
    }

    pub fn metadata_yaml(&self) -> String {
        if let Some(raw) = &self.raw_metadata {
            return raw.clone();
        }

        let mut yaml = String::from("--- !ruby/object:Gem::Specification\n");
        yaml.push_str(&format!("name: {}\n", self.name));
        yaml.push_str("version: !ruby/object:Gem::Version\n");
        yaml.push_str(&format!("  version: '{}'\n", self.version));
        yaml.push_str(&format!(
            "platform: {}\n",
            self.platform.as_deref().unwrap_or("ruby")
        ));
        if let Some(bindir) = &self.bindir {
            yaml.push_str(&format!("bindir: {bindir}\n"));
        }
        yaml.push_str("dependencies: []\n");
        yaml.push_str("require_paths:\n");
        for path in &self.require_paths {
            yaml.push_str(&format!("- {path}\n"));
        }
        yaml.push_str("summary: A test gem\n");
        yaml
    }

    /// Write the archive as `<dir>/<full name>.gem`.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        self.write_as(&dir.join(format!("{}.gem", self.full_name())))
    }

    /// Write the archive to an explicit path.
    pub fn write_as(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        let mut entries: Vec<(String, Vec<u8>, u32)> = Vec::new();
        if self.with_metadata {
            entries.push((
                "metadata.gz".to_string(),
                gzip(self.metadata_yaml().as_bytes()),
                0o444,
            ));
        }
        if self.with_data {
            let files: Vec<_> = self
                .files
                .iter()
                .map(|(path, data)| {
                    let mode = if path.contains("bin/") { 0o755 } else { 0o644 };
                    (path.clone(), data.clone(), mode)
                })
                .collect();
            entries.push(("data.tar.gz".to_string(), gzip(&tar(&files)), 0o444));
        }

        fs::write(path, tar(&entries)).unwrap();
        path.to_path_buf()
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn tar(entries: &[(String, Vec<u8>, u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        builder.append_data(&mut header, path, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Every file below `dir`, keyed by relative path.
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    collect(dir, dir, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            files.insert(relative, fs::read(&path).unwrap());
        }
    }
}

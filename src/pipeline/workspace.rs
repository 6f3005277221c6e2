use std::fs;
use std::path::{Path, PathBuf};

/// A file the pipeline generates inside a test case directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(PathBuf),
    /// Every file in the case directory with this extension (e.g. `solc` output named after contracts).
    Extension(String),
    /// A generated directory removed recursively.
    Dir(PathBuf),
}

/// One independent unit of work. Owns `directory`; nothing else writes there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub directory: PathBuf,
    pub artifacts: Vec<Artifact>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_file(mut self, file_name: &str) -> Self {
        let path = self.directory.join(file_name);
        self.artifacts.push(Artifact::File(path));
        self
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.artifacts.push(Artifact::Extension(ext.to_string()));
        self
    }

    pub fn with_dir(mut self, dir_name: &str) -> Self {
        let path = self.directory.join(dir_name);
        self.artifacts.push(Artifact::Dir(path));
        self
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.directory.join(file_name)
    }

    /// Remove every artifact now; returns how many entries were deleted.
    pub fn remove_artifacts(&self) -> usize {
        let mut removed = 0usize;
        for artifact in &self.artifacts {
            match artifact {
                Artifact::File(path) => {
                    if fs::remove_file(path).is_ok() {
                        removed += 1;
                    }
                }
                Artifact::Dir(path) => {
                    if fs::remove_dir_all(path).is_ok() {
                        removed += 1;
                    }
                }
                Artifact::Extension(ext) => {
                    removed += remove_by_extension(&self.directory, ext);
                }
            }
        }
        removed
    }

    /// Scope guard that removes the artifacts when dropped.
    pub fn scope(&self) -> ArtifactScope<'_> {
        ArtifactScope { case: self }
    }
}

fn remove_by_extension(dir: &Path, ext: &str) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some(ext) && fs::remove_file(&path).is_ok()
        {
            removed += 1;
        }
    }
    removed
}

/// Deletes a test case's artifacts on every exit path, including early returns and panics.
pub struct ArtifactScope<'a> {
    case: &'a TestCase,
}

impl Drop for ArtifactScope<'_> {
    fn drop(&mut self) {
        let removed = self.case.remove_artifacts();
        tracing::debug!(
            "[PIPE] cleanup case={} removed={}",
            self.case.name,
            removed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::TestCase;
    use std::fs;

    #[test]
    fn test_scope_removes_artifacts_but_keeps_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("main.sol"), "contract C {}").expect("write");
        fs::write(dir.path().join("C.bin"), "6080").expect("write");
        fs::write(dir.path().join("C.abi"), "[]").expect("write");
        fs::write(dir.path().join("kernel.ptx"), "ptx").expect("write");
        fs::create_dir(dir.path().join("build")).expect("mkdir");
        fs::write(dir.path().join("build/out"), "x").expect("write");

        let case = TestCase::new("c", dir.path())
            .with_extension("bin")
            .with_extension("abi")
            .with_file("kernel.ptx")
            .with_file("bytecode.ll")
            .with_dir("build");
        {
            let _scope = case.scope();
        }

        assert!(dir.path().join("main.sol").exists());
        assert!(!dir.path().join("C.bin").exists());
        assert!(!dir.path().join("C.abi").exists());
        assert!(!dir.path().join("kernel.ptx").exists());
        assert!(!dir.path().join("build").exists());
    }
}

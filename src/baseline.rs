//! Registry of pre-populated baseline trees.
//!
//! A baseline is seeded once from a [`BaselineSource`], frozen, and cached per
//! [`CaseSensitivity`]. Callers only ever receive clones, so every sandbox starts from the same
//! snapshot and none of them can change it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::core::{BaselineSource, CaseSensitivity};
use crate::vfs::VirtualFileSystem;
use crate::vpath;

/// Name of the baseline served by [`BaselineRegistry::get_baseline`].
pub const DEFAULT_BASELINE: &str = "default";

/// Copies the host directory `source` (as understood by the registry's source) to `target`
/// inside the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
}

/// How to seed one baseline.
#[derive(Debug, Clone)]
pub struct BaselineConfig {
    pub mounts: Vec<Mount>,

    /// Current directory of served clones, created if missing. Default: `/`.
    pub cwd: String,

    /// Only files whose name matches are copied. Directories are always walked.
    pub filter: Option<Regex>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            mounts: Vec::new(),
            cwd: "/".to_string(),
            filter: None,
        }
    }
}

impl BaselineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(mut self, source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        self.mounts.push(Mount {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    fn accepts(&self, name: &str) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter.is_match(name))
    }
}

/// Lazily builds baselines and hands out independent clones of them.
///
/// The registry is an ordinary value: several registries over different sources can coexist.
/// It is `Sync` whenever the source is, and concurrent first requests for the same baseline
/// build it once.
///
/// ### Example
///
/// ```
/// use vfs_sandbox::{BaselineConfig, BaselineRegistry, CaseSensitivity, DirSource};
///
/// let source = DirSource::new(std::env::temp_dir()).unwrap();
/// let registry = BaselineRegistry::new(source)
///     .with_baseline("empty", BaselineConfig::new().cwd("/work"));
///
/// let mut sandbox = registry.get("empty", CaseSensitivity::Sensitive).unwrap();
/// sandbox.add_file("a.ts", "").unwrap();
///
/// let fresh = registry.get("empty", CaseSensitivity::Sensitive).unwrap();
/// assert_eq!(fresh.cwd(), "/work");
/// assert!(!fresh.file_exists("/work/a.ts"));
/// ```
#[derive(Debug)]
pub struct BaselineRegistry<S> {
    source: S,
    configs: HashMap<String, BaselineConfig>,
    cache: Mutex<HashMap<(String, CaseSensitivity), VirtualFileSystem>>,
}

impl<S: BaselineSource> BaselineRegistry<S> {
    /// Creates a registry whose default baseline is an empty tree.
    pub fn new(source: S) -> Self {
        let mut configs = HashMap::new();
        configs.insert(DEFAULT_BASELINE.to_string(), BaselineConfig::default());
        Self {
            source,
            configs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) the baseline `name`.
    pub fn with_baseline(mut self, name: impl Into<String>, config: BaselineConfig) -> Self {
        self.configs.insert(name.into(), config);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns a fresh clone of the default baseline.
    pub fn get_baseline(&self, case: CaseSensitivity) -> Result<VirtualFileSystem> {
        self.get(DEFAULT_BASELINE, case)
    }

    /// Returns a fresh, writable clone of the baseline `name` built under `case`.
    ///
    /// The first call per `(name, case)` seeds the baseline from the source. A failed build is
    /// not cached, so a later call retries it.
    pub fn get(&self, name: &str, case: CaseSensitivity) -> Result<VirtualFileSystem> {
        let config = self
            .configs
            .get(name)
            .ok_or_else(|| anyhow!("unknown baseline: {name}"))?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("baseline cache lock poisoned"))?;

        let key = (name.to_string(), case);
        if let Some(baseline) = cache.get(&key) {
            return Ok(baseline.clone());
        }

        let baseline = self
            .build(config, case)
            .with_context(|| format!("failed to build baseline {name}"))
            .inspect_err(|err| warn!("baseline build failed: name={} error={:#}", name, err))?;
        let sandbox = baseline.clone();
        cache.insert(key, baseline);
        Ok(sandbox)
    }

    /// Checks if the baseline `name` has already been built under `case`.
    ///
    /// Reads through a poisoned lock, since a finished build stays in the cache either way.
    pub fn is_cached(&self, name: &str, case: CaseSensitivity) -> bool {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.contains_key(&(name.to_string(), case))
    }

    fn build(&self, config: &BaselineConfig, case: CaseSensitivity) -> Result<VirtualFileSystem> {
        debug!("building baseline: case={:?} mounts={}", case, config.mounts.len());
        let mut fs = VirtualFileSystem::new(case);

        let mut seeded = 0;
        for mount in &config.mounts {
            let target = fs.mkdirp(&mount.target)?.path().to_string();
            let mut ancestors = vec![(self.source.canonicalize(&mount.source)?, target.clone())];
            seeded += self.seed_dir(&mut fs, &mount.source, &target, config, &mut ancestors)?;
        }

        fs.mkdirp(&config.cwd)?;
        fs.change_directory(&config.cwd)?;
        fs.make_readonly();

        debug!("baseline ready: case={:?} files={}", case, seeded);
        Ok(fs)
    }

    /// Copies the host directory `source` into `target`, returning the number of files seeded.
    ///
    /// `ancestors` pairs the host identity of each directory on the current seeding path with
    /// its baseline path. A host directory that leads back to one of them becomes a symlink to
    /// that baseline path instead of another copy.
    fn seed_dir(
        &self,
        fs: &mut VirtualFileSystem,
        source: &Path,
        target: &str,
        config: &BaselineConfig,
        ancestors: &mut Vec<(PathBuf, String)>,
    ) -> Result<usize> {
        let listing = self.source.read_dir(source)?;
        let mut seeded = 0;

        for name in listing.files.iter().filter(|name| config.accepts(name)) {
            let host = source.join(name);
            match self.source.read_text(&host)? {
                Some(text) => {
                    fs.seed_file(&vpath::append_name(target, name), text)?;
                    seeded += 1;
                }
                None => trace!("vanished while seeding: {}", host.display()),
            }
        }

        for name in &listing.directories {
            let host = source.join(name);
            let dir = vpath::append_name(target, name);
            let identity = self.source.canonicalize(&host)?;

            if let Some((_, seen)) = ancestors.iter().find(|(id, _)| *id == identity) {
                debug!("host directory cycle: {} -> {}", host.display(), seen);
                fs.add_symlink(&dir, seen)?;
                continue;
            }

            fs.mkdirp(&dir)?;
            ancestors.push((identity, dir.clone()));
            seeded += self.seed_dir(fs, &host, &dir, config, ancestors)?;
            ancestors.pop();
        }

        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::core::HostListing;
    use pretty_assertions::assert_eq;

    /// In-memory host with a counter of every text read.
    #[derive(Default)]
    struct FakeSource {
        files: BTreeMap<PathBuf, String>,
        reads: AtomicUsize,
    }

    impl FakeSource {
        fn with_files(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(path, text)| (PathBuf::from(path), text.to_string()))
                    .collect(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl BaselineSource for FakeSource {
        fn read_text(&self, path: &Path) -> Result<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.files.get(path).cloned())
        }

        fn read_dir(&self, path: &Path) -> Result<HostListing> {
            let mut listing = HostListing::default();
            let mut found = false;
            for file in self.files.keys() {
                let Ok(rest) = file.strip_prefix(path) else {
                    continue;
                };
                let mut components = rest.components();
                let Some(first) = components.next() else {
                    continue;
                };
                found = true;
                let name = first.as_os_str().to_string_lossy().into_owned();
                let list = if components.next().is_some() {
                    &mut listing.directories
                } else {
                    &mut listing.files
                };
                if !list.contains(&name) {
                    list.push(name);
                }
            }
            if !found {
                return Err(anyhow!("{} does not exist", path.display()));
            }
            Ok(listing)
        }
    }

    /// Host whose only directory contains itself under the name `again`.
    struct LoopSource;

    impl BaselineSource for LoopSource {
        fn read_text(&self, path: &Path) -> Result<Option<String>> {
            Ok(path.ends_with("index.d.ts").then(|| "export {};".to_string()))
        }

        fn read_dir(&self, _path: &Path) -> Result<HostListing> {
            Ok(HostListing {
                files: vec!["index.d.ts".to_string()],
                directories: vec!["again".to_string()],
            })
        }

        fn canonicalize(&self, _path: &Path) -> Result<PathBuf> {
            Ok(PathBuf::from("/loop"))
        }
    }

    fn setup_registry() -> BaselineRegistry<FakeSource> {
        let source = FakeSource::with_files(&[
            ("/host/lib/lib.d.ts", "declare var x: number;"),
            ("/host/lib/lib.dom.d.ts", "declare var document: any;"),
            ("/host/lib/README.md", "docs"),
            ("/host/lib/esnext/Array.d.ts", "interface Array<T> {}"),
        ]);
        BaselineRegistry::new(source).with_baseline(
            "built",
            BaselineConfig::new()
                .mount("/host/lib", "/.lib")
                .cwd("/project"),
        )
    }

    #[test]
    fn test_default_baseline_is_empty() -> Result<()> {
        let registry = BaselineRegistry::new(FakeSource::default());
        let fs = registry.get_baseline(CaseSensitivity::Sensitive)?;
        assert_eq!(fs.cwd(), "/");
        let entries = fs.get_accessible_file_system_entries("/");
        assert!(entries.files.is_empty() && entries.directories.is_empty());
        assert!(!fs.is_readonly());
        Ok(())
    }

    #[test]
    fn test_baseline_is_seeded() -> Result<()> {
        let registry = setup_registry();
        let fs = registry.get("built", CaseSensitivity::Sensitive)?;

        assert_eq!(fs.cwd(), "/project");
        assert_eq!(fs.read_file("/.lib/lib.d.ts")?, "declare var x: number;");
        assert_eq!(fs.read_file("/.lib/esnext/Array.d.ts")?, "interface Array<T> {}");
        assert_eq!(
            fs.get_accessible_file_system_entries("/.lib").directories,
            vec!["esnext"]
        );
        assert!(fs.written_files().is_empty());
        Ok(())
    }

    #[test]
    fn test_clones_are_independent() -> Result<()> {
        let registry = setup_registry();
        let mut first = registry.get("built", CaseSensitivity::Sensitive)?;
        let second = registry.get("built", CaseSensitivity::Sensitive)?;

        first.add_file("/project/main.ts", "")?;
        first.remove("/.lib/lib.d.ts")?;

        assert!(!second.file_exists("/project/main.ts"));
        assert!(second.file_exists("/.lib/lib.d.ts"));

        let third = registry.get("built", CaseSensitivity::Sensitive)?;
        assert!(third.file_exists("/.lib/lib.d.ts"));
        assert!(third.written_files().is_empty());
        Ok(())
    }

    #[test]
    fn test_built_once_per_mode() -> Result<()> {
        let registry = setup_registry();
        assert!(!registry.is_cached("built", CaseSensitivity::Sensitive));

        registry.get("built", CaseSensitivity::Sensitive)?;
        let reads = registry.source().reads();
        assert_eq!(reads, 4);
        assert!(registry.is_cached("built", CaseSensitivity::Sensitive));

        registry.get("built", CaseSensitivity::Sensitive)?;
        assert_eq!(registry.source().reads(), reads);

        registry.get("built", CaseSensitivity::Insensitive)?;
        assert_eq!(registry.source().reads(), 2 * reads);
        Ok(())
    }

    #[test]
    fn test_insensitive_baseline() -> Result<()> {
        let registry = setup_registry();
        let fs = registry.get("built", CaseSensitivity::Insensitive)?;
        assert!(fs.ignore_case());
        assert!(fs.file_exists("/.LIB/ESNEXT/array.D.TS"));
        Ok(())
    }

    #[test]
    fn test_filter() -> Result<()> {
        let source = FakeSource::with_files(&[
            ("/host/lib/lib.d.ts", ""),
            ("/host/lib/README.md", ""),
        ]);
        let registry = BaselineRegistry::new(source).with_baseline(
            DEFAULT_BASELINE,
            BaselineConfig::new()
                .mount("/host/lib", "/lib")
                .filter(Regex::new(r"\.d\.ts$").unwrap()),
        );

        let fs = registry.get_baseline(CaseSensitivity::Sensitive)?;
        assert_eq!(fs.get_accessible_file_system_entries("/lib").files, vec!["lib.d.ts"]);
        Ok(())
    }

    #[test]
    fn test_unknown_baseline() {
        let registry = setup_registry();
        let err = registry.get("missing", CaseSensitivity::Sensitive).unwrap_err();
        assert!(err.to_string().contains("unknown baseline"));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let registry = BaselineRegistry::new(FakeSource::default())
            .with_baseline("broken", BaselineConfig::new().mount("/nowhere", "/lib"));

        let err = registry.get("broken", CaseSensitivity::Sensitive).unwrap_err();
        assert!(format!("{err:#}").contains("failed to build baseline broken"));
        assert!(format!("{err:#}").contains("does not exist"));
        assert!(!registry.is_cached("broken", CaseSensitivity::Sensitive));
    }

    #[test]
    fn test_concurrent_first_requests_build_once() -> Result<()> {
        let registry = setup_registry();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.get("built", CaseSensitivity::Sensitive)))
                .collect();
            for handle in handles {
                let fs = handle.join().unwrap().unwrap();
                assert!(fs.file_exists("/.lib/lib.d.ts"));
            }
        });

        assert_eq!(registry.source().reads(), 4);
        Ok(())
    }

    #[test]
    fn test_poisoned_cache_keeps_built_baselines() -> Result<()> {
        let registry = setup_registry();
        registry.get("built", CaseSensitivity::Sensitive)?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _cache = registry.cache.lock().unwrap();
            panic!("panic while holding the cache");
        }));
        assert!(result.is_err());
        assert!(registry.cache.is_poisoned());

        assert!(registry.is_cached("built", CaseSensitivity::Sensitive));
        assert!(!registry.is_cached("built", CaseSensitivity::Insensitive));
        let err = registry.get("built", CaseSensitivity::Sensitive).unwrap_err();
        assert!(err.to_string().contains("poisoned"));
        Ok(())
    }

    mod host_cycles {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::vfs::{DirSource, ListOptions};

        #[test]
        fn test_self_containing_directory_becomes_symlink() -> Result<()> {
            let registry = BaselineRegistry::new(LoopSource)
                .with_baseline("loop", BaselineConfig::new().mount("/loop", "/lib"));
            let fs = registry.get("loop", CaseSensitivity::Sensitive)?;

            let again = fs.get_entry("/lib/again", false)?.unwrap();
            assert!(again.is_symlink());
            assert_eq!(fs.real_path("/lib/again/again")?, "/lib");
            assert_eq!(fs.read_file("/lib/again/index.d.ts")?, "export {};");
            Ok(())
        }

        #[cfg(unix)]
        #[test]
        fn test_host_link_cycles_terminate() -> Result<()> {
            let temp_dir = tempdir::TempDir::new("baseline_cycles")?;
            let root = temp_dir.path();
            std::fs::create_dir_all(root.join("lib"))?;
            std::fs::write(root.join("lib/a.d.ts"), "declare var a: number;")?;
            std::os::unix::fs::symlink(root.join("lib"), root.join("lib/l1"))?;
            std::os::unix::fs::symlink(root.join("lib"), root.join("lib/l2"))?;

            let registry = BaselineRegistry::new(DirSource::new(root)?)
                .with_baseline("linked", BaselineConfig::new().mount("lib", "/lib"));
            let fs = registry.get("linked", CaseSensitivity::Sensitive)?;

            assert_eq!(fs.read_file("/lib/a.d.ts")?, "declare var a: number;");
            assert!(fs.get_entry("/lib/l1", false)?.unwrap().is_symlink());
            assert!(fs.file_exists("/lib/l1/l2/a.d.ts"));
            assert_eq!(
                fs.get_directories("/lib", &ListOptions::new().recursive(true).qualified(true)),
                vec!["/lib/l1", "/lib/l2"]
            );
            Ok(())
        }
    }
}

//! Read-only access to LXC container configuration.
//!
//! Only the parts of the LXC config format the hook needs are understood:
//! `key = value` lines, comments, repeated keys accumulating into a list, an
//! empty value clearing that list, and `lxc.include` of files or directories.
//! Pre-3.0 configs may declare networks without indices; each
//! `lxc.network.type` line then opens the next `lxc.network.<i>` block.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use ctctl_common::{CtctlError, CtctlPaths, CtctlResult};

const INCLUDE_KEY: &str = "lxc.include";
const LEGACY_NETWORK: &str = "lxc.network.";
const MAX_INCLUDE_DEPTH: usize = 8;

/// Parsed container configuration.
#[derive(Debug, Clone, Default)]
pub struct LxcConfig {
    items: HashMap<String, Vec<String>>,
    legacy_network: Option<u32>,
}

impl LxcConfig {
    /// Load the config of container `name` from the container store.
    ///
    /// # Errors
    ///
    /// [`CtctlError::ContainerNotDefined`] when the container has no config.
    pub fn load_container(paths: &CtctlPaths, name: &str) -> CtctlResult<Self> {
        let path = paths.container_config(name);
        if !path.is_file() {
            return Err(CtctlError::ContainerNotDefined {
                name: name.to_string(),
            });
        }
        Self::load(&path)
    }

    /// Load a config file, following includes.
    pub fn load(path: &Path) -> CtctlResult<Self> {
        let mut config = Self::default();
        config.read_file(path, 0)?;
        tracing::debug!(
            path = %path.display(),
            keys = config.items.len(),
            "Loaded container config"
        );
        Ok(config)
    }

    /// Parse config text. Includes are resolved relative to the working directory.
    pub fn parse_str(text: &str) -> CtctlResult<Self> {
        let mut config = Self::default();
        config.parse(Path::new("<inline>"), text, 0)?;
        Ok(config)
    }

    /// All values of `key`, in declaration order.
    #[must_use]
    pub fn get(&self, key: &str) -> &[String] {
        self.items.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// First value of `key`, if set and non-empty.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .first()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Indices of the `<prefix>.<i>.*` blocks declared, ascending.
    #[must_use]
    pub fn indices(&self, prefix: &str) -> BTreeSet<u32> {
        self.items
            .keys()
            .filter_map(|key| key.strip_prefix(prefix)?.strip_prefix('.'))
            .filter_map(|rest| rest.split('.').next()?.parse().ok())
            .collect()
    }

    fn read_file(&mut self, path: &Path, depth: usize) -> CtctlResult<()> {
        let text = std::fs::read_to_string(path).map_err(|source| CtctlError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(path, &text, depth)
    }

    fn parse(&mut self, path: &Path, text: &str, depth: usize) -> CtctlResult<()> {
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(CtctlError::ConfigParse {
                    path: path.to_path_buf(),
                    line: number + 1,
                    message: format!("expected 'key = value', got '{line}'"),
                });
            };
            let (key, value) = (key.trim(), value.trim());

            if key == INCLUDE_KEY {
                self.include(path, value, depth)?;
                continue;
            }

            let key = self.index_legacy_key(key);
            if value.is_empty() {
                self.items.remove(&key);
            } else {
                self.items.entry(key).or_default().push(value.to_string());
            }
        }
        Ok(())
    }

    fn include(&mut self, from: &Path, target: &str, depth: usize) -> CtctlResult<()> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(CtctlError::ConfigParse {
                path: from.to_path_buf(),
                line: 0,
                message: format!("includes nested deeper than {MAX_INCLUDE_DEPTH} levels"),
            });
        }

        let mut target = PathBuf::from(target);
        if target.is_relative() {
            if let Some(dir) = from.parent() {
                target = dir.join(target);
            }
        }

        if !target.is_dir() {
            return self.read_file(&target, depth + 1);
        }

        let entries = std::fs::read_dir(&target).map_err(|source| CtctlError::ConfigRead {
            path: target.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "conf"))
            .collect();
        files.sort();

        for file in files {
            self.read_file(&file, depth + 1)?;
        }
        Ok(())
    }

    /// Rewrite unindexed `lxc.network.*` keys onto the current network block.
    fn index_legacy_key(&mut self, key: &str) -> String {
        let Some(rest) = key.strip_prefix(LEGACY_NETWORK) else {
            return key.to_string();
        };
        let block = rest.split('.').next().unwrap_or_default();
        if block.parse::<u32>().is_ok() {
            return key.to_string();
        }

        if rest == "type" {
            self.legacy_network = Some(self.legacy_network.map_or(0, |i| i + 1));
        }
        let index = self.legacy_network.unwrap_or(0);
        format!("{LEGACY_NETWORK}{index}.{rest}")
    }
}

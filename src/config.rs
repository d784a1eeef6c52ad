//! Launcher configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command-line flags and environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CtlError, Result};

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "snaketron.toml";

/// A host directory or socket made visible inside the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub mode: Option<String>,
}

impl Mount {
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: None,
        }
    }

    pub fn read_write(mut self) -> Self {
        self.mode = Some("rw".to_string());
        self
    }

    /// Value for `docker run -v`
    pub fn volume_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container)?;
        if let Some(mode) = &self.mode {
            write!(f, ":{}", mode)?;
        }
        Ok(())
    }
}

impl FromStr for Mount {
    type Err = CtlError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let (host, container, mode) = match parts.as_slice() {
            [host, container] => (*host, *container, None),
            [host, container, mode] => (*host, *container, Some(*mode)),
            _ => {
                return Err(CtlError::Config(format!(
                    "Invalid mount '{}', expected HOST:CONTAINER[:MODE]",
                    s
                )))
            }
        };

        if host.is_empty() || container.is_empty() {
            return Err(CtlError::Config(format!("Invalid mount '{}'", s)));
        }
        if let Some(mode) = mode {
            if mode != "rw" && mode != "ro" {
                return Err(CtlError::Config(format!(
                    "Invalid mount mode '{}' in '{}', expected rw or ro",
                    mode, s
                )));
            }
        }

        Ok(Self {
            host: PathBuf::from(host),
            container: container.to_string(),
            mode: mode.map(str::to_string),
        })
    }
}

impl TryFrom<String> for Mount {
    type Error = CtlError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Mount> for String {
    fn from(mount: Mount) -> Self {
        mount.to_string()
    }
}

/// Everything the lifecycle manager needs to build and launch the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// Image name (and optional tag) of the build artifact
    pub image: String,
    /// Build context directory
    pub context: PathBuf,
    /// Build definition, relative paths resolve against `context`
    pub dockerfile: PathBuf,
    /// Container runtime binary
    pub runtime: String,
    /// Existence marker file, relative paths resolve against `context`
    pub marker: PathBuf,
    /// Host X11 socket directory
    pub x11_socket: PathBuf,
    /// Display identifier; falls back to `$DISPLAY`
    pub display: Option<String>,
    /// Grant and revoke X server access around each run with xhost
    pub xhost: bool,
    /// Client spec handed to xhost
    pub xhost_client: String,
    /// Host source directory mounted for live editing
    pub source: Option<PathBuf>,
    /// Where `source` appears inside the container
    pub source_target: String,
    /// Extra bind mounts
    pub mounts: Vec<Mount>,
    /// Command override; empty keeps the image entrypoint
    pub command: Vec<String>,
    /// Attach stdin/tty to the container
    pub interactive: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            image: "snaketron".to_string(),
            context: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
            runtime: "docker".to_string(),
            marker: PathBuf::from(".snaketron-built"),
            x11_socket: PathBuf::from("/tmp/.X11-unix"),
            display: None,
            xhost: true,
            xhost_client: "local:docker".to_string(),
            source: None,
            source_target: "/app".to_string(),
            mounts: Vec::new(),
            command: Vec::new(),
            interactive: true,
        }
    }
}

/// Values supplied on the command line; `None` keeps the lower layer
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub image: Option<String>,
    pub context: Option<PathBuf>,
    pub dockerfile: Option<PathBuf>,
    pub runtime: Option<String>,
    pub marker: Option<PathBuf>,
    pub source: Option<PathBuf>,
    pub mounts: Vec<Mount>,
    pub command: Vec<String>,
}

impl ConfigOverrides {
    /// Resolve relative host paths (`--source`, `--mount`) against `base`
    pub fn relative_to(mut self, base: &Path) -> Self {
        self.source = self.source.map(|source| absolute_from(base, &source));
        for mount in &mut self.mounts {
            mount.host = absolute_from(base, &mount.host);
        }
        self
    }
}

/// `path` unchanged when absolute, otherwise joined onto `base`
fn absolute_from(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl LauncherConfig {
    /// Load configuration from a TOML file.
    ///
    /// An explicit path must exist. Without one, `snaketron.toml` in the
    /// working directory is used when present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CtlError::Config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                Self::from_file(p)
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: LauncherConfig = toml::from_str(&contents)
            .map_err(|e| CtlError::Config(format!("{}: {}", path.display(), e)))?;

        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        config.anchor_host_paths(&std::env::current_dir()?.join(dir));
        config.validate()?;
        Ok(config)
    }

    /// Host-side bind paths from the file resolve against its directory,
    /// since the runtime reads a bare relative name as a named volume.
    fn anchor_host_paths(&mut self, base: &Path) {
        self.x11_socket = absolute_from(base, &self.x11_socket);
        if let Some(source) = &self.source {
            self.source = Some(absolute_from(base, source));
        }
        for mount in &mut self.mounts {
            mount.host = absolute_from(base, &mount.host);
        }
    }

    /// Apply command-line overrides on top of this configuration
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(image) = overrides.image {
            self.image = image;
        }
        if let Some(context) = overrides.context {
            self.context = context;
        }
        if let Some(dockerfile) = overrides.dockerfile {
            self.dockerfile = dockerfile;
        }
        if let Some(runtime) = overrides.runtime {
            self.runtime = runtime;
        }
        if let Some(marker) = overrides.marker {
            self.marker = marker;
        }
        if overrides.source.is_some() {
            self.source = overrides.source;
        }
        self.mounts.extend(overrides.mounts);
        if !overrides.command.is_empty() {
            self.command = overrides.command;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(CtlError::Config("Image name must not be empty".to_string()));
        }
        if self.image.chars().any(char::is_whitespace) {
            return Err(CtlError::Config(format!(
                "Image name '{}' must not contain whitespace",
                self.image
            )));
        }
        if self.runtime.trim().is_empty() {
            return Err(CtlError::Config("Runtime must not be empty".to_string()));
        }
        if let Some(source) = &self.source {
            if !source.is_dir() {
                return Err(CtlError::Config(format!(
                    "Source directory not found: {}",
                    source.display()
                )));
            }
        }
        if !self.source_target.starts_with('/') {
            return Err(CtlError::Config(format!(
                "source_target must be an absolute container path, got '{}'",
                self.source_target
            )));
        }
        Ok(())
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.resolve(&self.dockerfile)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.resolve(&self.marker)
    }

    /// Lock file guarding the build, next to the marker
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.marker_path().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Display identifier passed to the container
    pub fn display_value(&self) -> Option<String> {
        self.display
            .clone()
            .or_else(|| std::env::var("DISPLAY").ok())
            .filter(|d| !d.is_empty())
    }

    /// All bind mounts for a run: X11 socket first, then source, then extras
    pub fn run_mounts(&self) -> Vec<Mount> {
        let mut mounts = vec![Mount::new(
            self.x11_socket.clone(),
            self.x11_socket.to_string_lossy().to_string(),
        )
        .read_write()];

        if let Some(source) = &self.source {
            mounts.push(Mount::new(source.clone(), self.source_target.clone()));
        }

        mounts.extend(self.mounts.iter().cloned());
        mounts
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        absolute_from(&self.context, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LauncherConfig::default();
        assert_eq!(config.image, "snaketron");
        assert_eq!(config.runtime, "docker");
        assert!(config.interactive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let result = LauncherConfig::load(Some(Path::new("/nonexistent/snaketron.toml")));
        assert!(matches!(result, Err(CtlError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snaketron.toml");
        std::fs::write(
            &path,
            r#"
image = "snaketron:dev"
runtime = "podman"
mounts = ["/data:/data:ro"]
command = ["python", "-m", "snaketron"]
"#,
        )
        .unwrap();

        let config = LauncherConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.image, "snaketron:dev");
        assert_eq!(config.runtime, "podman");
        assert_eq!(config.mounts, vec!["/data:/data:ro".parse::<Mount>().unwrap()]);
        assert_eq!(config.command.len(), 3);
        // untouched keys keep their defaults
        assert_eq!(config.x11_socket, PathBuf::from("/tmp/.X11-unix"));
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snaketron.toml");
        std::fs::write(&path, "imagee = \"typo\"\n").unwrap();
        assert!(LauncherConfig::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = LauncherConfig::default().with_overrides(ConfigOverrides {
            image: Some("other".to_string()),
            source: Some(PathBuf::from("/src")),
            command: vec!["bash".to_string()],
            ..Default::default()
        });
        assert_eq!(config.image, "other");
        assert_eq!(config.source, Some(PathBuf::from("/src")));
        assert_eq!(config.command, vec!["bash".to_string()]);
        assert_eq!(config.runtime, "docker");
    }

    #[test]
    fn test_paths_resolve_against_context() {
        let config = LauncherConfig {
            context: PathBuf::from("/work"),
            ..Default::default()
        };
        assert_eq!(config.dockerfile_path(), PathBuf::from("/work/Dockerfile"));
        assert_eq!(config.marker_path(), PathBuf::from("/work/.snaketron-built"));
        assert_eq!(config.lock_path(), PathBuf::from("/work/.snaketron-built.lock"));

        let absolute = LauncherConfig {
            context: PathBuf::from("/work"),
            marker: PathBuf::from("/var/state/marker"),
            ..Default::default()
        };
        assert_eq!(absolute.marker_path(), PathBuf::from("/var/state/marker"));
    }

    #[test]
    fn test_mount_parse() {
        let m: Mount = "/tmp/.X11-unix:/tmp/.X11-unix:rw".parse().unwrap();
        assert_eq!(m.host, PathBuf::from("/tmp/.X11-unix"));
        assert_eq!(m.mode.as_deref(), Some("rw"));
        assert_eq!(m.volume_arg(), "/tmp/.X11-unix:/tmp/.X11-unix:rw");

        assert!("nocolon".parse::<Mount>().is_err());
        assert!("/a:/b:rx".parse::<Mount>().is_err());
        assert!(":/b".parse::<Mount>().is_err());
    }

    #[test]
    fn test_run_mounts_order() {
        let config = LauncherConfig {
            source: Some(PathBuf::from("/home/me/snaketron")),
            mounts: vec![Mount::new("/data", "/data")],
            ..Default::default()
        };
        let mounts = config.run_mounts();
        assert_eq!(mounts.len(), 3);
        assert_eq!(mounts[0].volume_arg(), "/tmp/.X11-unix:/tmp/.X11-unix:rw");
        assert_eq!(mounts[1].volume_arg(), "/home/me/snaketron:/app");
        assert_eq!(mounts[2].volume_arg(), "/data:/data");
    }

    #[test]
    fn test_file_host_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let path = dir.path().join("snaketron.toml");
        std::fs::write(
            &path,
            r#"
source = "src"
x11_socket = "x11"
mounts = ["assets:/assets:ro", "/data:/data"]
"#,
        )
        .unwrap();

        let config = LauncherConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.source, Some(dir.path().join("src")));
        assert_eq!(config.x11_socket, dir.path().join("x11"));
        assert_eq!(config.mounts[0].host, dir.path().join("assets"));
        assert_eq!(config.mounts[1].host, PathBuf::from("/data"));
        assert!(config.run_mounts().iter().all(|m| m.host.is_absolute()));
    }

    #[test]
    fn test_cli_host_paths_resolve_against_base() {
        let overrides = ConfigOverrides {
            source: Some(PathBuf::from("src")),
            mounts: vec!["cache:/cache".parse().unwrap(), "/data:/data".parse().unwrap()],
            ..Default::default()
        }
        .relative_to(Path::new("/home/me/snaketron"));

        assert_eq!(overrides.source, Some(PathBuf::from("/home/me/snaketron/src")));
        assert_eq!(overrides.mounts[0].host, PathBuf::from("/home/me/snaketron/cache"));
        assert_eq!(overrides.mounts[1].host, PathBuf::from("/data"));

        let config = LauncherConfig::default().with_overrides(overrides);
        assert_eq!(config.run_mounts()[1].volume_arg(), "/home/me/snaketron/src:/app");
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig {
            source: Some(dir.path().join("missing")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CtlError::Config(_))));

        let config = LauncherConfig {
            source: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LauncherConfig {
            image: "bad name".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LauncherConfig {
            source_target: "relative".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

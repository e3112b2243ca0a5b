use crate::config;
use std::path::{Path, PathBuf};

/// Where things live on the host.
///
/// Commands always see the real host paths from [`config`]. File access made
/// directly by the installer goes through [`Layout::resolve`], which maps a
/// host path under `root`. Production uses `/`; tests point `root` at a
/// scratch directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    /// Source tree copied into the proxy runtime directory.
    pub bundle_dir: PathBuf,
    pub gateway_repo_url: String,
    pub gateway_port: u16,
    pub proxy_port: u16,
}

impl Layout {
    pub fn system(bundle_dir: PathBuf, gateway_repo_url: String) -> Self {
        Self {
            root: PathBuf::from("/"),
            bundle_dir,
            gateway_repo_url,
            gateway_port: config::GATEWAY_PORT,
            proxy_port: config::PROXY_PORT,
        }
    }

    /// A layout whose file access is confined under `root`.
    pub fn rooted(root: impl Into<PathBuf>, bundle_dir: PathBuf) -> Self {
        Self {
            root: root.into(),
            bundle_dir,
            gateway_repo_url: config::DEFAULT_GATEWAY_REPO.to_string(),
            gateway_port: config::GATEWAY_PORT,
            proxy_port: config::PROXY_PORT,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a host path to the path the installer should read or write.
    pub fn resolve(&self, host_path: impl AsRef<Path>) -> PathBuf {
        let host_path = host_path.as_ref();
        match host_path.strip_prefix("/") {
            Ok(rel) => self.root.join(rel),
            Err(_) => self.root.join(host_path),
        }
    }

    pub fn gateway_upstream_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.gateway_port)
    }

    pub fn proxy_base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.proxy_port)
    }

    pub fn proxy_runtime_file(&self, name: &str) -> PathBuf {
        Path::new(config::PROXY_RUNTIME_DIR).join(name)
    }

    pub fn plugin_dir(&self) -> PathBuf {
        Path::new(config::PROXY_RUNTIME_DIR).join(config::PLUGIN_SUBDIR)
    }

    pub fn env_file(&self) -> PathBuf {
        self.proxy_runtime_file(config::ENV_FILE_NAME)
    }
}

use crate::commands::{run_root, shell_escape, Host};
use clawstack_core::config::{
    CONTAINER_GID, CONTAINER_UID, GATEWAY_HOME, GATEWAY_SRC_DIR, GATEWAY_USER, PROXY_DATA_DIR,
};
use clawstack_core::session::SessionConfig;
use clawstack_core::{AppError, Layout};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// The gateway's service account.
    Gateway,
    /// The UID the proxy container runs as.
    Container,
}

impl Owner {
    fn chown_spec(self) -> String {
        match self {
            Owner::Gateway => format!("{GATEWAY_USER}:{GATEWAY_USER}"),
            Owner::Container => format!("{CONTAINER_UID}:{CONTAINER_GID}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSpec {
    pub path: PathBuf,
    pub owner: Owner,
    pub mode: u32,
}

/// Every directory the deployment relies on, with its owner.
pub fn directory_plan(session: &SessionConfig) -> Vec<DirSpec> {
    vec![
        DirSpec {
            path: PathBuf::from(GATEWAY_SRC_DIR),
            owner: Owner::Gateway,
            mode: 0o755,
        },
        DirSpec {
            path: PathBuf::from(GATEWAY_HOME),
            owner: Owner::Gateway,
            mode: 0o750,
        },
        DirSpec {
            path: PathBuf::from(PROXY_DATA_DIR),
            owner: Owner::Container,
            mode: 0o750,
        },
        DirSpec {
            path: session.audit_dir(),
            owner: Owner::Container,
            mode: 0o750,
        },
    ]
}

/// Step 5: service account plus the directory tree.
///
/// `useradd` is guarded by `id -u`, directories use create-if-missing, and
/// ownership is re-asserted every run.
pub async fn provision(
    host: &dyn Host,
    layout: &Layout,
    session: &SessionConfig,
) -> Result<(), AppError> {
    run_root(
        host,
        &format!(
            "id -u {GATEWAY_USER} >/dev/null 2>&1 || \
             useradd --system --user-group --home-dir {GATEWAY_HOME} --create-home \
             --shell /usr/sbin/nologin {GATEWAY_USER}"
        ),
    )
    .await
    .map_err(|e| AppError::provision("user creation", e))?;

    for dir in directory_plan(session) {
        let on_disk = layout.resolve(&dir.path);
        std::fs::create_dir_all(&on_disk)?;
        crate::set_mode(&on_disk, dir.mode)?;
        let path = shell_escape(&dir.path.display().to_string());
        run_root(host, &format!("chown -R {} {path}", dir.owner.chown_spec()))
            .await
            .map_err(|e| AppError::provision("directory ownership", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn audit_and_proxy_data_belong_to_the_container_uid() {
        let plan = directory_plan(&SessionConfig::local("/mnt/claw"));
        let audit = plan
            .iter()
            .find(|d| d.path == PathBuf::from("/mnt/claw/audit"))
            .unwrap();
        assert_eq!(audit.owner, Owner::Container);
        let data = plan
            .iter()
            .find(|d| d.path == PathBuf::from(PROXY_DATA_DIR))
            .unwrap();
        assert_eq!(data.owner, Owner::Container);
        let home = plan
            .iter()
            .find(|d| d.path == PathBuf::from(GATEWAY_HOME))
            .unwrap();
        assert_eq!(home.owner, Owner::Gateway);
    }

    #[tokio::test]
    async fn rerun_creates_nothing_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::rooted(tmp.path(), PathBuf::from("/src"));
        let session = SessionConfig::local("/mnt/claw");

        let host = FakeHost::new();
        provision(&host, &layout, &session).await.unwrap();
        provision(&host, &layout, &session).await.unwrap();

        for script in host.scripts().iter().filter(|s| s.contains("useradd")) {
            assert!(script.starts_with("id -u openclaw >/dev/null 2>&1 ||"));
        }
        assert!(tmp.path().join("mnt/claw/audit").is_dir());
        assert!(tmp.path().join("var/lib/clawstack").is_dir());
        assert!(host.ran("chown -R 1000:1000 '/mnt/claw/audit'"));
        assert!(host.ran("chown -R openclaw:openclaw '/var/lib/openclaw'"));
    }
}

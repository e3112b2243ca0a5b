use crate::commands::Host;
use clawstack_core::config::{MIN_DISTRO_VERSION, OS_RELEASE_PATH, SUPPORTED_DISTRO};
use clawstack_core::{AppError, Layout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub version_id: String,
    pub pretty_name: Option<String>,
}

/// Parse `/etc/os-release` (KEY=VALUE, optionally quoted).
pub fn parse_os_release(text: &str) -> OsRelease {
    let mut id = String::new();
    let mut version_id = String::new();
    let mut pretty_name = None;
    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key {
            "ID" => id = value.to_ascii_lowercase(),
            "VERSION_ID" => version_id = value,
            "PRETTY_NAME" => pretty_name = Some(value),
            _ => {}
        }
    }
    OsRelease {
        id,
        version_id,
        pretty_name,
    }
}

fn parse_version(v: &str) -> Option<(u32, u32)> {
    let mut parts = v.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor))
}

/// Reject anything but a supported Ubuntu release.
pub fn check_platform(os: &OsRelease) -> Result<(), AppError> {
    if os.id != SUPPORTED_DISTRO {
        return Err(AppError::UnsupportedPlatform {
            found: if os.id.is_empty() {
                "unknown".into()
            } else {
                os.id.clone()
            },
            expected: SUPPORTED_DISTRO.into(),
        });
    }
    let minimum = format!("{}.{:02}", MIN_DISTRO_VERSION.0, MIN_DISTRO_VERSION.1);
    match parse_version(&os.version_id) {
        Some(found) if found >= MIN_DISTRO_VERSION => Ok(()),
        _ => Err(AppError::UnsupportedVersion {
            distro: SUPPORTED_DISTRO.into(),
            found: os.version_id.clone(),
            minimum,
        }),
    }
}

/// CPU architectures with Docker, NodeSource and cloudflared packages.
pub const SUPPORTED_ARCHES: [&str; 2] = ["x86_64", "aarch64"];

pub fn check_arch(arch: &str) -> Result<(), AppError> {
    if SUPPORTED_ARCHES.contains(&arch) {
        Ok(())
    } else {
        Err(AppError::UnsupportedArch(arch.to_string()))
    }
}

/// Step 1: privilege, distribution, version and architecture checks. Reads only.
pub fn run(host: &dyn Host, layout: &Layout) -> Result<OsRelease, AppError> {
    if !host.is_privileged() {
        return Err(AppError::NotRoot);
    }
    let path = layout.resolve(OS_RELEASE_PATH);
    let text = std::fs::read_to_string(&path).map_err(|e| AppError::UnsupportedPlatform {
        found: format!("unreadable {} ({e})", path.display()),
        expected: SUPPORTED_DISTRO.into(),
    })?;
    let os = parse_os_release(&text);
    check_platform(&os)?;
    check_arch(&host.arch())?;
    Ok(os)
}

//! Pick the gateway release to build: an ordered chain of resolvers, first
//! hit wins, the last link is a pinned tag that always answers.

use crate::commands::{shell_escape, ExecRequest, Host};
use async_trait::async_trait;
use clawstack_core::config::FALLBACK_RELEASE_TAG;
use clawstack_core::AppError;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseSource {
    DefaultBranch,
    HighestVersionTag,
    Pinned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub tag: String,
    pub source: ReleaseSource,
}

fn release_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v(\d+)\.(\d+)\.(\d+)$").expect("valid release pattern"))
}

/// Stable release tags only: `vX.Y.Z`, no pre-release suffix.
pub fn is_release_tag(tag: &str) -> bool {
    release_pattern().is_match(tag)
}

fn version_key(tag: &str) -> Option<(u64, u64, u64)> {
    let caps = release_pattern().captures(tag)?;
    Some((
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

/// Highest release tag in a newline-separated list, compared numerically.
pub fn pick_highest(tags: &str) -> Option<String> {
    tags.lines()
        .map(str::trim)
        .filter_map(|t| version_key(t).map(|k| (k, t)))
        .max_by_key(|(k, _)| *k)
        .map(|(_, t)| t.to_string())
}

#[async_trait]
pub trait ReleaseResolver: Send + Sync {
    fn source(&self) -> ReleaseSource;

    /// `None` means "no answer from me, ask the next resolver".
    async fn resolve(&self, host: &dyn Host, repo: &Path) -> Option<String>;
}

async fn git_stdout(host: &dyn Host, repo: &Path, args: &str) -> Option<String> {
    let script = format!(
        "git -C {} {args}",
        shell_escape(&repo.display().to_string())
    );
    match host.exec(&ExecRequest::gateway(script)).await {
        Ok(out) if out.success() => Some(out.stdout),
        Ok(out) => {
            debug!(code = out.code, stderr = %out.stderr.trim(), "git query failed");
            None
        }
        Err(e) => {
            debug!(error = %e, "git query could not run");
            None
        }
    }
}

/// Newest stable tag reachable from the remote's default branch.
pub struct DefaultBranchTag;

#[async_trait]
impl ReleaseResolver for DefaultBranchTag {
    fn source(&self) -> ReleaseSource {
        ReleaseSource::DefaultBranch
    }

    async fn resolve(&self, host: &dyn Host, repo: &Path) -> Option<String> {
        let out = git_stdout(
            host,
            repo,
            "describe --tags --abbrev=0 --match 'v[0-9]*' --exclude '*-*' origin/HEAD",
        )
        .await?;
        let tag = out.trim();
        is_release_tag(tag).then(|| tag.to_string())
    }
}

/// Highest version-sorted release tag anywhere in the repository.
pub struct HighestVersionTag;

#[async_trait]
impl ReleaseResolver for HighestVersionTag {
    fn source(&self) -> ReleaseSource {
        ReleaseSource::HighestVersionTag
    }

    async fn resolve(&self, host: &dyn Host, repo: &Path) -> Option<String> {
        let out = git_stdout(host, repo, "tag --list 'v*'").await?;
        pick_highest(&out)
    }
}

/// A known-good tag; always answers.
pub struct PinnedTag(pub &'static str);

#[async_trait]
impl ReleaseResolver for PinnedTag {
    fn source(&self) -> ReleaseSource {
        ReleaseSource::Pinned
    }

    async fn resolve(&self, _host: &dyn Host, _repo: &Path) -> Option<String> {
        Some(self.0.to_string())
    }
}

pub fn default_chain() -> Vec<Box<dyn ReleaseResolver>> {
    vec![
        Box::new(DefaultBranchTag),
        Box::new(HighestVersionTag),
        Box::new(PinnedTag(FALLBACK_RELEASE_TAG)),
    ]
}

/// Walk `chain` in order and return the first answer.
pub async fn resolve_release(
    host: &dyn Host,
    repo: &Path,
    chain: &[Box<dyn ReleaseResolver>],
) -> Result<ResolvedRelease, AppError> {
    for resolver in chain {
        if let Some(tag) = resolver.resolve(host, repo).await {
            return Ok(ResolvedRelease {
                tag,
                source: resolver.source(),
            });
        }
        debug!(source = ?resolver.source(), "release resolver had no answer");
    }
    Err(AppError::provision(
        "release resolution",
        "no resolver produced a release tag",
    ))
}

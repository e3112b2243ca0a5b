use clawstack_core::config::DEFAULT_STORAGE_MOUNT;
use clawstack_core::session::SessionConfig;
use clawstack_core::{AppError, Layout};
use clawstack_ui::{self as ui, Prompter};
use std::path::PathBuf;

const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Normalise and validate a public hostname.
pub fn validate_domain(raw: &str) -> Result<String, String> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Err("a domain is required for public access".into());
    }
    if domain.contains("://") || domain.contains('/') {
        return Err("enter a bare hostname such as claw.example.com (no scheme or path)".into());
    }
    if domain.len() > 253 {
        return Err("hostname is longer than 253 characters".into());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("hostname needs at least one dot".into());
    }
    for label in labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(format!("'{label}' is not a valid hostname label"));
        }
    }
    Ok(domain)
}

/// Empty input means the default mount; anything else must be absolute.
pub fn resolve_storage(raw: &str) -> Result<PathBuf, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(PathBuf::from(DEFAULT_STORAGE_MOUNT));
    }
    let path = PathBuf::from(raw.trim_end_matches('/'));
    if !path.is_absolute() {
        return Err(format!("{raw} is not an absolute path"));
    }
    Ok(path)
}

fn ask_until_valid<T>(
    prompter: &dyn Prompter,
    prompt: &str,
    default: Option<&str>,
    validate: impl Fn(&str) -> Result<T, String>,
) -> Result<T, AppError> {
    let mut last_error = String::new();
    for _ in 0..MAX_PROMPT_ATTEMPTS {
        let answer = prompter.input(prompt, default)?;
        match validate(&answer) {
            Ok(value) => return Ok(value),
            Err(e) => {
                ui::emit(&format!("  {e}"));
                last_error = e;
            }
        }
    }
    Err(AppError::InvalidInput(last_error))
}

/// Step 2: ask for public access and the storage mount.
pub fn collect(prompter: &dyn Prompter, layout: &Layout) -> Result<SessionConfig, AppError> {
    let public = prompter.confirm(
        "Expose the security proxy publicly through a Cloudflare Tunnel?",
        false,
    )?;

    let domain = if public {
        Some(ask_until_valid(
            prompter,
            "Public hostname (e.g. claw.example.com)",
            None,
            validate_domain,
        )?)
    } else {
        None
    };

    let storage = ask_until_valid(
        prompter,
        "Storage mount for audit data",
        Some(DEFAULT_STORAGE_MOUNT),
        resolve_storage,
    )?;

    let on_disk = layout.resolve(&storage);
    if on_disk.exists() {
        if !on_disk.is_dir() {
            return Err(AppError::InvalidInput(format!(
                "{} exists but is not a directory",
                storage.display()
            )));
        }
    } else {
        let create = prompter.confirm(
            &format!("{} does not exist. Create it?", storage.display()),
            true,
        )?;
        if !create {
            return Err(AppError::StorageDeclined(storage.display().to_string()));
        }
        std::fs::create_dir_all(&on_disk)?;
    }

    Ok(match domain {
        Some(domain) => SessionConfig::public(domain, storage),
        None => SessionConfig::local(storage),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    fn layout(tmp: &tempfile::TempDir) -> Layout {
        Layout::rooted(tmp.path(), PathBuf::from("/src"))
    }

    #[test]
    fn domain_validation() {
        assert_eq!(
            validate_domain(" Claw.Example.com. ").unwrap(),
            "claw.example.com"
        );
        assert!(validate_domain("").is_err());
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("https://claw.example.com").is_err());
        assert!(validate_domain("bad_label.example.com").is_err());
        assert!(validate_domain("-x.example.com").is_err());
    }

    #[test]
    fn empty_storage_answer_is_the_default() {
        assert_eq!(
            resolve_storage("").unwrap(),
            PathBuf::from(DEFAULT_STORAGE_MOUNT)
        );
        assert_eq!(resolve_storage("/mnt/x/").unwrap(), PathBuf::from("/mnt/x"));
        assert!(resolve_storage("relative/path").is_err());
    }

    #[test]
    fn local_only_with_default_storage_created() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = ScriptedPrompter::new(&[false, true], &[""]);
        let session = collect(&prompter, &layout(&tmp)).unwrap();
        assert!(!session.use_public_tunnel);
        assert_eq!(session.domain_name, None);
        assert!(session.uses_default_storage());
        assert!(tmp.path().join("home/openclaw-data").is_dir());
    }

    #[test]
    fn public_access_retries_bad_domain() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("srv/claw")).unwrap();
        let prompter = ScriptedPrompter::new(&[true], &["nodot", "claw.example.com", "/srv/claw"]);
        let session = collect(&prompter, &layout(&tmp)).unwrap();
        assert!(session.use_public_tunnel);
        assert_eq!(session.domain_name.as_deref(), Some("claw.example.com"));
        assert_eq!(session.storage_mount_path, PathBuf::from("/srv/claw"));
    }

    #[test]
    fn declining_storage_creation_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = ScriptedPrompter::new(&[false, false], &["/data/missing"]);
        let err = collect(&prompter, &layout(&tmp)).unwrap_err();
        assert!(matches!(err, AppError::StorageDeclined(p) if p == "/data/missing"));
        assert!(!tmp.path().join("data/missing").exists());
    }

    #[test]
    fn gives_up_after_repeated_invalid_input() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = ScriptedPrompter::new(&[true], &["a", "b", "c"]);
        assert!(matches!(
            collect(&prompter, &layout(&tmp)),
            Err(AppError::InvalidInput(_))
        ));
    }
}

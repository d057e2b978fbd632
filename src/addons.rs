//! Addon module upgrades
//!
//! After restore, installed addon modules must be upgraded against the new
//! database. Addons live in one of a few well-known locations depending on
//! how the container was assembled; the first existing directory wins. An
//! absent or empty addons directory is not an error - there is simply
//! nothing to upgrade.

use crate::command;
use crate::error::{RestoreResult, RestorerError};
use crate::settings::LocalSettings;
use std::path::{Path, PathBuf};

const ADDON_DIR_CANDIDATES: [&str; 3] =
    ["/volumes/addons", "/opt/project/addons", "/opt/odoo/odoo-addons"];
const ODOO_BIN: &str = "/odoo/odoo-bin";
const FALLBACK_PYTHON: &str = "/opt/odoo/venv/bin/python";
const CONFIG_FILE: &str = "/etc/odoo.conf";

pub struct AddonUpdater<'a> {
    local: &'a LocalSettings,
    addon_dirs: Vec<PathBuf>,
    odoo_bin: PathBuf,
    fallback_python: PathBuf,
    config_file: PathBuf,
}

impl<'a> AddonUpdater<'a> {
    pub fn new(local: &'a LocalSettings) -> Self {
        Self {
            local,
            addon_dirs: ADDON_DIR_CANDIDATES.iter().map(PathBuf::from).collect(),
            odoo_bin: PathBuf::from(ODOO_BIN),
            fallback_python: PathBuf::from(FALLBACK_PYTHON),
            config_file: PathBuf::from(CONFIG_FILE),
        }
    }

    #[cfg(test)]
    fn with_paths(
        local: &'a LocalSettings,
        addon_dirs: Vec<PathBuf>,
        odoo_bin: PathBuf,
        fallback_python: PathBuf,
        config_file: PathBuf,
    ) -> Self {
        Self {
            local,
            addon_dirs,
            odoo_bin,
            fallback_python,
            config_file,
        }
    }

    /// Upgrade every discovered addon module against the refreshed
    /// database. Returns `Ok` without running anything when no addons are
    /// found.
    pub async fn update_addons(&self) -> RestoreResult<()> {
        let Some(dir) = self.addon_dirs.iter().find(|dir| dir.exists()) else {
            tracing::info!("No addons directory found; skipping addon update");
            return Ok(());
        };

        let modules = module_list(dir)?;
        if modules.is_empty() {
            tracing::info!("No addons found to update");
            return Ok(());
        }

        let cmd = self.build_command(&modules);
        command::run_shell(&cmd, &[])
            .await
            .map_err(|err| match err {
                RestorerError::CommandFailed { status, .. } => {
                    RestorerError::AddonUpdate { status }
                }
                other => other,
            })
    }

    fn build_command(&self, modules: &[String]) -> String {
        let odoo_bin = if self.odoo_bin.exists() {
            self.odoo_bin.display().to_string()
        } else {
            format!(
                "{} {}",
                self.fallback_python.display(),
                self.odoo_bin.display()
            )
        };
        let mut cmd = format!(
            "{odoo_bin} --stop-after-init -d {db} --no-http -u {modules}",
            db = self.local.db_name,
            modules = modules.join(","),
        );
        if self.config_file.exists() {
            cmd.push_str(&format!(" --config {}", self.config_file.display()));
        }
        cmd
    }
}

/// Names of the subdirectories of `dir`, sorted for a stable module list.
fn module_list(dir: &Path) -> RestoreResult<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|source| RestorerError::AddonScan {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut modules = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RestorerError::AddonScan {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.path().is_dir() {
            modules.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    modules.sort();
    Ok(modules)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn local() -> LocalSettings {
        LocalSettings {
            host: "localhost".to_string(),
            port: 5432,
            db_user: "odoo".to_string(),
            db_password: SecretString::from("pw".to_string()),
            db_name: "devdb".to_string(),
            filestore_path: PathBuf::from("/var/lib/odoo/filestore"),
            base_url: None,
        }
    }

    #[tokio::test]
    async fn test_no_candidate_directory_is_ok() {
        let settings = local();
        let updater = AddonUpdater::with_paths(
            &settings,
            vec![PathBuf::from("/nonexistent/addons")],
            PathBuf::from("/nonexistent/odoo-bin"),
            PathBuf::from("/nonexistent/python"),
            PathBuf::from("/nonexistent/odoo.conf"),
        );
        updater.update_addons().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_addons_directory_is_ok() {
        let settings = local();
        let dir = tempfile::tempdir().unwrap();
        let updater = AddonUpdater::with_paths(
            &settings,
            vec![dir.path().to_path_buf()],
            PathBuf::from("/nonexistent/odoo-bin"),
            PathBuf::from("/nonexistent/python"),
            PathBuf::from("/nonexistent/odoo.conf"),
        );
        updater.update_addons().await.unwrap();
    }

    #[test]
    fn test_module_list_names_subdirectories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shopify_sync")).unwrap();
        std::fs::create_dir(dir.path().join("account_ext")).unwrap();
        std::fs::write(dir.path().join("README.md"), "not a module").unwrap();

        let modules = module_list(dir.path()).unwrap();
        assert_eq!(modules, vec!["account_ext", "shopify_sync"]);
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::create_dir(second.path().join("ignored")).unwrap();
        let settings = local();
        let updater = AddonUpdater::with_paths(
            &settings,
            vec![
                PathBuf::from("/nonexistent/addons"),
                first.path().to_path_buf(),
                second.path().to_path_buf(),
            ],
            PathBuf::from("/nonexistent/odoo-bin"),
            PathBuf::from("/nonexistent/python"),
            PathBuf::from("/nonexistent/odoo.conf"),
        );
        let chosen = updater.addon_dirs.iter().find(|d| d.exists()).unwrap();
        assert_eq!(chosen, &first.path().to_path_buf());
    }

    #[test]
    fn test_build_command_with_missing_bin_uses_python_fallback() {
        let settings = local();
        let updater = AddonUpdater::with_paths(
            &settings,
            vec![],
            PathBuf::from("/nonexistent/odoo-bin"),
            PathBuf::from("/nonexistent/python"),
            PathBuf::from("/nonexistent/odoo.conf"),
        );
        let cmd = updater.build_command(&["shopify_sync".to_string(), "account_ext".to_string()]);
        assert_eq!(
            cmd,
            "/nonexistent/python /nonexistent/odoo-bin --stop-after-init -d devdb \
             --no-http -u shopify_sync,account_ext"
        );
    }

    #[test]
    fn test_build_command_appends_existing_config_file() {
        let settings = local();
        let conf = tempfile::NamedTempFile::new().unwrap();
        let bin = tempfile::NamedTempFile::new().unwrap();
        let updater = AddonUpdater::with_paths(
            &settings,
            vec![],
            bin.path().to_path_buf(),
            PathBuf::from("/nonexistent/python"),
            conf.path().to_path_buf(),
        );
        let cmd = updater.build_command(&["base".to_string()]);
        assert!(cmd.starts_with(&bin.path().display().to_string()));
        assert!(cmd.ends_with(&format!(" --config {}", conf.path().display())));
    }
}

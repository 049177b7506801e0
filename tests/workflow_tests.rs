//! Workflow tests
//!
//! Drive the create, delete, backup and restore workflows end to end against
//! a temporary sites directory. External tools are answered by a
//! `RecordingRunner` whose handlers simulate their side effects on disk.

use std::fs;
use std::path::{Path, PathBuf};

use herdpress::config::Config;
use herdpress::error::{HerdpressError, Result};
use herdpress::logic::backup::{BackupStrategy, backup_websites};
use herdpress::logic::delete::delete_websites;
use herdpress::logic::provision::{ProvisionPlan, create_website};
use herdpress::logic::restore::{RestoreJob, RestoreStrategy, restore_website};
use herdpress::packages::PackageResolver;
use herdpress::packages::cache::DownloadCache;
use herdpress::packages::catalog::{Catalog, Downloader, Release};
use herdpress::platform::{Layout, LinuxPaths, ToolPaths};
use herdpress::prompt::ScriptedPrompter;
use herdpress::site::CREDENTIALS_FILE;
use herdpress::tool_args::Invocation;
use herdpress::{CommandOutput, RecordingRunner, Toolbox};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    config: Config,
    layout: Layout,
    tools: ToolPaths,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let layout = Layout {
            sites: root.join("sites"),
            backups: root.join("backups"),
            cache: root.join("cache"),
            herd_bin: root.join("bin"),
        };
        fs::create_dir_all(&layout.sites).unwrap();
        fs::create_dir_all(&layout.backups).unwrap();
        Self {
            _tmp: tmp,
            root,
            config: Config::default(),
            layout,
            tools: ToolPaths::bare(&LinuxPaths),
        }
    }

    fn site_dir(&self, name: &str) -> PathBuf {
        self.layout.sites.join(name)
    }

    fn add_site(&self, name: &str) -> PathBuf {
        let dir = self.site_dir(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("wp-login.php"), "<?php").unwrap();
        dir
    }

    fn cache(&self) -> DownloadCache {
        DownloadCache::open(&self.layout.cache).unwrap()
    }
}

/// A catalog that knows nothing: every package comes from WP-CLI.
struct OfflineCatalog;

impl Catalog for OfflineCatalog {
    fn latest(&self, slug: &str) -> Result<Release> {
        Err(HerdpressError::catalog(slug, "offline"))
    }
}

/// A catalog that only offers the core package.
struct CoreCatalog;

impl Catalog for CoreCatalog {
    fn latest(&self, slug: &str) -> Result<Release> {
        if slug != "wordpress" {
            return Err(HerdpressError::catalog(slug, "unknown slug"));
        }
        Ok(Release {
            slug: slug.to_string(),
            version: "6.5.2".to_string(),
            download_url: "https://downloads.test/wordpress-6.5.2.zip".to_string(),
        })
    }
}

struct FileDownloader;

impl Downloader for FileDownloader {
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let name = url.rsplit('/').next().unwrap_or("download.zip");
        let path = dest_dir.join(name);
        fs::write(&path, "zip")?;
        Ok(path)
    }
}

/// Arguments of a WP-CLI call without the leading `--path=`.
fn wp_words(inv: &Invocation) -> String {
    inv.args
        .iter()
        .filter(|a| !a.starts_with("--path="))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}

fn wp_calls(runner: &RecordingRunner) -> Vec<String> {
    runner
        .invocations()
        .iter()
        .filter(|inv| inv.program_name() == "wp")
        .map(wp_words)
        .collect()
}

/// Output directory of a `7z x ... -o<dest>` call.
fn extract_dest(inv: &Invocation) -> Option<PathBuf> {
    if inv.program_name() != "7z" || inv.args.first().map(String::as_str) != Some("x") {
        return None;
    }
    inv.args
        .iter()
        .find_map(|a| a.strip_prefix("-o"))
        .map(PathBuf::from)
}

/// `wp config create` writes a stock wp-config.php into the site.
fn config_create_handler(inv: &Invocation) -> Option<CommandOutput> {
    if inv.program_name() != "wp" || !wp_words(inv).starts_with("config create") {
        return None;
    }
    let dir = inv.cwd.clone()?;
    fs::write(
        dir.join("wp-config.php"),
        "<?php\ndefine( 'DB_NAME', 'x' );\n$table_prefix = 'wp_';\nrequire_once ABSPATH . 'wp-settings.php';\n",
    )
    .ok()?;
    Some(CommandOutput::ok(""))
}

fn sql_ending_with(inv: &Invocation, sql: &str) -> bool {
    inv.program_name() == "mysql" && inv.args.last().is_some_and(|a| a == sql)
}

// ============================================================================
// Create
// ============================================================================

#[test]
fn test_create_my_blog_end_to_end() {
    let fx = Fixture::new();
    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let site = tb.claim_site("My Blog", fx.config.admin.clone()).unwrap();
    let plan = ProvisionPlan {
        apply_baseline: true,
        ..ProvisionPlan::default()
    };
    let site = create_website(&tb, &mut resolver, site, &plan).unwrap();

    assert_eq!(site.name, "my-blog");
    assert_eq!(site.database, "my_blog");
    assert!(site.path.is_dir());
    assert!(site.path.join(CREDENTIALS_FILE).is_file());

    let mysql = runner.calls_to("mysql");
    assert!(mysql.iter().any(|c| c.contains("CREATE DATABASE IF NOT EXISTS `my_blog`")));

    let wp = wp_calls(&runner);
    let position = |prefix: &str| wp.iter().position(|c| c.starts_with(prefix));

    // Catalog offline: WP-CLI fetches core and the default theme itself
    let download = position("core download").expect("core download");
    let install = position("core install").expect("core install");
    assert!(download < install);
    assert!(wp.iter().any(|c| c == "theme install twentytwentyfour --force --activate"));

    let mut last = install;
    for command in &fx.config.baseline_commands {
        let rendered = command.join(" ");
        let at = wp
            .iter()
            .position(|c| *c == rendered)
            .unwrap_or_else(|| panic!("baseline command {:?} not run", rendered));
        assert!(at > last, "baseline command {:?} out of order", rendered);
        last = at;
    }

    let secured = runner
        .invocations()
        .into_iter()
        .any(|inv| {
            inv.program_name() == "herd"
                && inv.starts_with(&["secure"])
                && inv.cwd.as_deref() == Some(site.path.as_path())
        });
    assert!(secured);
    assert!(
        runner
            .calls_to("xdg-open")
            .contains(&"https://my-blog.test/wp-admin".to_string())
    );
}

#[test]
fn test_create_uses_cached_core_and_reroots_it() {
    let fx = Fixture::new();
    let runner = RecordingRunner::new().with_handler(|inv| {
        let dest = extract_dest(inv)?;
        let wrapper = dest.join("wordpress");
        fs::create_dir_all(wrapper.join("wp-admin")).ok()?;
        fs::write(wrapper.join("wp-load.php"), "<?php").ok()?;
        Some(CommandOutput::ok(""))
    });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&CoreCatalog, &FileDownloader, fx.cache());

    let site = tb.claim_site("shop", fx.config.admin.clone()).unwrap();
    let site = create_website(&tb, &mut resolver, site, &ProvisionPlan::default()).unwrap();

    assert!(site.path.join("wp-load.php").is_file());
    assert!(site.path.join("wp-admin").is_dir());
    assert!(!site.path.join("wordpress").exists());
    assert!(!wp_calls(&runner).iter().any(|c| c.starts_with("core download")));
    assert_eq!(resolver.cache().get("wordpress").unwrap().version, "6.5.2");
}

#[test]
fn test_create_rejects_taken_name() {
    let fx = Fixture::new();
    fx.add_site("my-blog");
    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);

    let err = tb.claim_site("My Blog", fx.config.admin.clone()).unwrap_err();
    assert!(matches!(err, HerdpressError::NameCollision { ref name } if name == "my-blog"));
}

#[test]
fn test_failed_create_rolls_back() {
    let fx = Fixture::new();
    let runner = RecordingRunner::new().with_handler(|inv| {
        (inv.program_name() == "wp" && wp_words(inv).starts_with("core install"))
            .then(|| CommandOutput::failed(1, "Error: database connection lost"))
    });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let site = tb.claim_site("broken", fx.config.admin.clone()).unwrap();
    let path = site.path.clone();
    assert!(create_website(&tb, &mut resolver, site, &ProvisionPlan::default()).is_err());

    assert!(!path.exists());
    assert!(
        runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.ends_with("DROP DATABASE IF EXISTS `broken`"))
    );
}

#[test]
fn test_create_refuses_dry_run() {
    let fx = Fixture::new();
    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let mut tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    tb.dry_run = true;
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let site = tb.claim_site("preview", fx.config.admin.clone()).unwrap();
    let err = create_website(&tb, &mut resolver, site, &ProvisionPlan::default()).unwrap_err();
    assert!(matches!(err, HerdpressError::Validation(_)));
    assert!(runner.calls_to("wp").is_empty());
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_batch_delete_continues_past_failure() {
    let fx = Fixture::new();
    for name in ["a", "b", "c"] {
        fx.add_site(name);
    }
    let runner = RecordingRunner::new().with_handler(|inv| {
        sql_ending_with(inv, "DROP DATABASE IF EXISTS `b`")
            .then(|| CommandOutput::failed(1, "ERROR 1010: Error dropping database"))
    });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);

    let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let report = delete_websites(&tb, &names).unwrap();

    assert_eq!(report.succeeded, vec!["a", "c"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "b");
    assert!(!fx.site_dir("a").exists());
    assert!(fx.site_dir("b").is_dir());
    assert!(!fx.site_dir("c").exists());
}

#[test]
fn test_delete_unknown_site_is_recorded() {
    let fx = Fixture::new();
    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);

    let report = delete_websites(&tb, &["ghost".to_string()]).unwrap();
    assert!(!report.is_clean());
    assert!(
        !runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.contains("DROP DATABASE"))
    );
}

#[test]
fn test_delete_rejects_paths_outside_sites_root() {
    let fx = Fixture::new();
    fx.add_site("a");
    fs::write(fx.layout.backups.join("precious.zip"), "zip").unwrap();
    let outside = fx.root.join("elsewhere");
    fs::create_dir_all(&outside).unwrap();

    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);

    let names: Vec<String> = vec![
        "../backups".to_string(),
        outside.display().to_string(),
        ".".to_string(),
        "a/..".to_string(),
    ];
    let report = delete_websites(&tb, &names).unwrap();

    assert_eq!(report.failed.len(), names.len());
    assert!(
        report
            .failed
            .iter()
            .all(|(_, e)| matches!(e, HerdpressError::Validation(_)))
    );
    assert!(fx.layout.backups.join("precious.zip").is_file());
    assert!(outside.is_dir());
    assert!(fx.site_dir("a").is_dir());
    assert!(
        !runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.contains("DROP DATABASE"))
    );
}

#[test]
fn test_dry_run_delete_keeps_directory() {
    let fx = Fixture::new();
    fx.add_site("keep");
    let runner = RecordingRunner::dry_run();
    let prompter = ScriptedPrompter::default();
    let mut tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    tb.dry_run = true;

    let report = delete_websites(&tb, &["keep".to_string()]).unwrap();
    assert!(report.is_clean());
    assert!(fx.site_dir("keep").is_dir());
    assert!(
        runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.ends_with("DROP DATABASE IF EXISTS `keep`"))
    );
}

#[test]
fn test_delete_stops_when_database_unreachable() {
    let fx = Fixture::new();
    fx.add_site("a");
    let runner = RecordingRunner::new().with_handler(|inv| {
        sql_ending_with(inv, "SELECT 1").then(|| CommandOutput::failed(1, "Can't connect"))
    });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);

    let err = delete_websites(&tb, &["a".to_string()]).unwrap_err();
    assert!(matches!(err, HerdpressError::DatabaseUnreachable(_)));
    assert!(fx.site_dir("a").is_dir());
}

// ============================================================================
// Backup
// ============================================================================

#[test]
fn test_full_backup_dumps_and_zips() {
    let fx = Fixture::new();
    let dir = fx.add_site("shop");
    fs::write(dir.join("stale.sql"), "-- old").unwrap();
    fs::create_dir_all(dir.join("sql")).unwrap();
    fs::write(dir.join("sql").join("fixture.sql"), "-- kept").unwrap();

    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let report =
        backup_websites(&tb, &mut resolver, &["shop".to_string()], BackupStrategy::Full).unwrap();
    assert!(report.is_clean());

    assert!(!dir.join("stale.sql").exists());
    assert!(dir.join("sql").join("fixture.sql").exists());

    let dumps = runner.calls_to("mysqldump");
    assert_eq!(dumps.len(), 1);
    assert!(dumps[0].contains(&format!("--result-file={}", dir.join("shop.sql").display())));

    let zips = runner.calls_to("7z");
    assert_eq!(zips.len(), 1);
    let expected = format!("a -tzip -mx=5 {}", fx.layout.backups.join("shop_full_backup_").display());
    assert!(zips[0].starts_with(&expected), "{}", zips[0]);
    assert!(zips[0].contains("-xr!.git"));
    assert!(zips[0].contains("-x!wp-content/cache"));
}

#[test]
fn test_plugin_backup_without_marker_fails_and_reactivates() {
    let fx = Fixture::new();
    fx.add_site("shop");
    let runner = RecordingRunner::new().with_handler(|inv| {
        (inv.program_name() == "wp" && wp_words(inv).starts_with("plugin list --status=active"))
            .then(|| CommandOutput::ok("woocommerce\nseo\n"))
    });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let report =
        backup_websites(&tb, &mut resolver, &["shop".to_string()], BackupStrategy::Plugin).unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, HerdpressError::PartialState(_)));

    let wp = wp_calls(&runner);
    let deactivated = wp
        .iter()
        .position(|c| c.starts_with("plugin deactivate --all"))
        .unwrap();
    let reactivated = wp
        .iter()
        .position(|c| c == "plugin activate woocommerce seo")
        .unwrap();
    assert!(deactivated < reactivated);
    assert!(runner.calls_to("7z").is_empty());
}

#[test]
fn test_plugin_backup_zips_reported_file() {
    let fx = Fixture::new();
    let dir = fx.add_site("shop");
    let storage = dir.join(&fx.config.backup_plugin.storage_dir);
    fs::create_dir_all(&storage).unwrap();
    let container = storage.join(format!("shop.{}", fx.config.backup_plugin.file_extension));
    fs::write(&container, "container").unwrap();

    let command = fx.config.backup_plugin.command.clone();
    let stdout = format!("Backup in progress...\nBackup location: {}\n", container.display());
    let runner = RecordingRunner::new().with_handler(move |inv| {
        (inv.program_name() == "wp" && wp_words(inv) == format!("{} backup", command))
            .then(|| CommandOutput::ok(stdout.clone()))
    });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let report =
        backup_websites(&tb, &mut resolver, &["shop".to_string()], BackupStrategy::Plugin).unwrap();
    assert!(report.is_clean(), "{}", report);

    let zips = runner.calls_to("7z");
    assert_eq!(zips.len(), 1);
    assert!(zips[0].contains("shop_plugin_backup_"));
}

// ============================================================================
// Restore
// ============================================================================

#[test]
fn test_full_restore_converges_site() {
    let fx = Fixture::new();
    let archive = fx.root.join("shop-export.zip");
    fs::write(&archive, "zip").unwrap();

    let runner = RecordingRunner::new()
        .with_handler(|inv| {
            let dest = extract_dest(inv)?;
            let wrapper = dest.join("public_html");
            fs::create_dir_all(&wrapper).ok()?;
            fs::write(wrapper.join("wp-login.php"), "<?php").ok()?;
            fs::write(wrapper.join("wp-config.php"), "<?php // production").ok()?;
            fs::write(wrapper.join("shop.sql"), "-- dump").ok()?;
            Some(CommandOutput::ok(""))
        })
        .with_handler(config_create_handler)
        .with_handler(|inv| {
            (inv.program_name() == "mysql"
                && inv.args.last().is_some_and(|a| a.starts_with("SHOW TABLES")))
            .then(|| CommandOutput::ok("Tables_in_shop (%\\_options)\nwp2_options\n"))
        })
        .with_handler(|inv| {
            (inv.program_name() == "wp" && wp_words(inv).starts_with("user list"))
                .then(|| CommandOutput::ok("ID,user_login\n7,editor\n1,owner\n"))
        });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("Shop", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Full,
        source: archive,
        sql: None,
    };
    let site = restore_website(&tb, &mut resolver, job).unwrap();

    assert!(site.path.join("wp-login.php").is_file());
    assert!(!site.path.join("public_html").exists());
    assert_eq!(site.table_prefix, "wp2_");
    let config = fs::read_to_string(site.config_file()).unwrap();
    assert!(config.contains("$table_prefix = 'wp2_';"));

    let imports: Vec<Invocation> = runner
        .invocations()
        .into_iter()
        .filter(|inv| inv.program_name() == "mysql" && inv.stdin.is_some())
        .collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].stdin.as_deref(), Some(site.path.join("shop.sql").as_path()));

    let mysql = runner.calls_to("mysql");
    assert!(
        mysql
            .iter()
            .any(|c| c.ends_with("UPDATE `wp2_users` SET user_login = 'admin' WHERE ID = 1"))
    );

    let wp = wp_calls(&runner);
    assert!(wp.contains(&"user update 1 --user_pass=admin --user_email=admin@example.com --skip-email".to_string()));
    assert!(wp.contains(&"option update admin_email admin@example.com".to_string()));
    assert!(wp.contains(&"option update siteurl https://shop.test".to_string()));
    assert!(wp.contains(&"option update home https://shop.test".to_string()));
}

#[test]
fn test_full_restore_without_dump_rolls_back() {
    let fx = Fixture::new();
    let archive = fx.root.join("files-only.zip");
    fs::write(&archive, "zip").unwrap();

    let runner = RecordingRunner::new()
        .with_handler(|inv| {
            let dest = extract_dest(inv)?;
            fs::create_dir_all(&dest).ok()?;
            fs::write(dest.join("wp-login.php"), "<?php").ok()?;
            Some(CommandOutput::ok(""))
        })
        .with_handler(config_create_handler);
    // No answer for the SQL prompt: the operator walks away
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("files-only", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Full,
        source: archive,
        sql: None,
    };
    let err = restore_website(&tb, &mut resolver, job).unwrap_err();
    assert!(matches!(err, HerdpressError::Cancelled(_)));
    assert!(!fx.site_dir("files-only").exists());
    assert!(
        runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.ends_with("DROP DATABASE IF EXISTS `files_only`"))
    );
}

#[test]
fn test_content_restore_rejects_plain_folder() {
    let fx = Fixture::new();
    let folder = fx.root.join("not-content");
    fs::create_dir_all(&folder).unwrap();

    let runner = RecordingRunner::new();
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("copy", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Content,
        source: folder,
        sql: None,
    };
    let err = restore_website(&tb, &mut resolver, job).unwrap_err();
    assert!(matches!(err, HerdpressError::Validation(_)));
    assert!(!fx.site_dir("copy").exists());
}

#[test]
fn test_installer_restore_keeps_site_when_declined() {
    let fx = Fixture::new();
    let package = fx.root.join("package.zip");
    fs::write(&package, "zip").unwrap();

    let runner = RecordingRunner::new().with_handler(|inv| {
        let dest = extract_dest(inv)?;
        fs::create_dir_all(&dest).ok()?;
        fs::write(dest.join("installer.php"), "<?php").ok()?;
        Some(CommandOutput::ok(""))
    });
    let prompter = ScriptedPrompter::new(["n"]);
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("migrated", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Installer,
        source: package,
        sql: None,
    };
    let err = restore_website(&tb, &mut resolver, job).unwrap_err();
    assert!(matches!(err, HerdpressError::Cancelled(_)));

    assert!(fx.site_dir("migrated").join("installer.php").is_file());
    assert!(
        runner
            .calls_to("xdg-open")
            .contains(&"https://migrated.test/installer.php".to_string())
    );
    assert!(
        !runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.contains("DROP DATABASE"))
    );
}

/// `wp user list` for the administrator reset after a restore.
fn admin_list_handler(inv: &Invocation) -> Option<CommandOutput> {
    (inv.program_name() == "wp" && wp_words(inv).starts_with("user list"))
        .then(|| CommandOutput::ok("ID,user_login\n1,owner\n"))
}

#[test]
fn test_content_restore_overlays_and_imports() {
    let fx = Fixture::new();
    let content = fx.root.join("export").join("wp-content");
    fs::create_dir_all(content.join("themes").join("shop-theme")).unwrap();
    fs::create_dir_all(content.join("plugins").join("shop-kit")).unwrap();
    fs::write(content.join("plugins").join("shop-kit").join("shop-kit.php"), "<?php").unwrap();
    fs::write(content.join("themes").join("shop-theme").join("style.css"), "/* */").unwrap();
    let dump = fx.root.join("export").join("shop.sql");
    fs::write(&dump, "-- dump").unwrap();

    let runner = RecordingRunner::new()
        .with_handler(config_create_handler)
        .with_handler(admin_list_handler);
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("copy", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Content,
        source: content,
        sql: Some(dump.clone()),
    };
    let site = restore_website(&tb, &mut resolver, job).unwrap();

    let wp_content = site.path.join("wp-content");
    assert!(wp_content.join("plugins").join("shop-kit").join("shop-kit.php").is_file());
    assert!(wp_content.join("themes").join("shop-theme").join("style.css").is_file());

    // The fresh install's tables are dropped before the dump goes in
    let mysql: Vec<Invocation> = runner
        .invocations()
        .into_iter()
        .filter(|inv| inv.program_name() == "mysql")
        .collect();
    let last_position = |sql: &str| {
        mysql
            .iter()
            .rposition(|inv| inv.args.last().is_some_and(|a| a.starts_with(sql)))
            .unwrap_or_else(|| panic!("{} not run", sql))
    };
    let dropped = last_position("DROP DATABASE IF EXISTS `copy`");
    let created = last_position("CREATE DATABASE IF NOT EXISTS `copy`");
    let imported = mysql
        .iter()
        .position(|inv| inv.stdin.as_deref() == Some(dump.as_path()))
        .expect("dump imported");
    assert!(dropped < created);
    assert!(created < imported);

    let wp = wp_calls(&runner);
    assert!(wp.iter().any(|c| c.starts_with("core install")));
    assert!(wp.contains(&"option update siteurl https://copy.test".to_string()));
    assert!(wp.iter().any(|c| c.starts_with("user update 1 ")));
}

#[test]
fn test_plugin_restore_from_zip_with_nested_container() {
    let fx = Fixture::new();
    let archive = fx.root.join("migration.zip");
    fs::write(&archive, "zip").unwrap();

    let runner = RecordingRunner::new()
        .with_handler(|inv| {
            let dest = extract_dest(inv)?;
            let nested = dest.join("exports");
            fs::create_dir_all(&nested).ok()?;
            fs::write(nested.join("shop-export.wpress"), "container").ok()?;
            Some(CommandOutput::ok(""))
        })
        .with_handler(config_create_handler)
        .with_handler(admin_list_handler)
        .with_handler(|inv| {
            (inv.program_name() == "wp" && wp_words(inv) == "plugin list --field=name").then(|| {
                CommandOutput::ok("updraftplus\nwoocommerce\nall-in-one-wp-migration\n")
            })
        });
    let prompter = ScriptedPrompter::default();
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("shop", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Plugin,
        source: archive,
        sql: None,
    };
    let site = restore_website(&tb, &mut resolver, job).unwrap();

    let storage = site.path.join(&fx.config.backup_plugin.storage_dir);
    assert!(storage.join("shop-export.wpress").is_file());
    assert!(!storage.join("exports").join("shop-export.wpress").exists());

    let wp = wp_calls(&runner);
    assert!(wp.contains(&"ai1wm restore shop-export.wpress --yes".to_string()));
    assert!(wp.contains(&"plugin activate woocommerce all-in-one-wp-migration".to_string()));
    assert!(
        !wp.iter()
            .any(|c| c.starts_with("plugin activate") && c.contains("updraftplus"))
    );
    assert!(wp.contains(&"option update home https://shop.test".to_string()));
}

#[test]
fn test_installer_restore_converges_after_confirmation() {
    let fx = Fixture::new();
    let package = fx.root.join("package.zip");
    fs::write(&package, "zip").unwrap();

    let runner = RecordingRunner::new()
        .with_handler(|inv| {
            let dest = extract_dest(inv)?;
            let wrapper = dest.join("dup-package");
            fs::create_dir_all(&wrapper).ok()?;
            fs::write(wrapper.join("installer.php"), "<?php").ok()?;
            Some(CommandOutput::ok(""))
        })
        .with_handler(admin_list_handler);
    let prompter = ScriptedPrompter::new(["y"]);
    let tb = Toolbox::new(&fx.config, &fx.layout, &fx.tools, &runner, &prompter);
    let mut resolver = PackageResolver::new(&OfflineCatalog, &FileDownloader, fx.cache());

    let job = RestoreJob {
        site: tb.claim_site("migrated", fx.config.admin.clone()).unwrap(),
        strategy: RestoreStrategy::Installer,
        source: package,
        sql: None,
    };
    let site = restore_website(&tb, &mut resolver, job).unwrap();

    assert!(site.path.join("installer.php").is_file());
    assert!(site.path.join(CREDENTIALS_FILE).is_file());

    let invocations = runner.invocations();
    let opened_installer = invocations
        .iter()
        .position(|inv| {
            inv.program_name() == "xdg-open"
                && inv.has_arg("https://migrated.test/installer.php")
        })
        .expect("installer opened");
    let admin_reset = invocations
        .iter()
        .position(|inv| inv.program_name() == "wp" && wp_words(inv).starts_with("user update 1 "))
        .expect("admin reset");
    let url_rewrite = invocations
        .iter()
        .position(|inv| {
            inv.program_name() == "wp"
                && wp_words(inv) == "option update siteurl https://migrated.test"
        })
        .expect("siteurl rewritten");
    assert!(opened_installer < admin_reset);
    assert!(opened_installer < url_rewrite);

    assert!(
        runner
            .calls_to("mysql")
            .iter()
            .any(|c| c.ends_with("UPDATE `wp_users` SET user_login = 'admin' WHERE ID = 1"))
    );
}

//! `lockstep paths` command implementation.

use super::{fail, root_dir};
use lockstep_core::config::SETTINGS_FILE_NAME;
use lockstep_core::paths::GLOBAL_PACKAGES_ENV;
use lockstep_core::pkg::{lock_file_path, PROJECT_SPEC_FILE_NAME};
use lockstep_core::Settings;
use miette::Result;
use std::path::Path;

/// Run the paths command.
pub fn run(cwd: &Path, json: bool) -> Result<()> {
    let root = root_dir(cwd);
    let settings = match Settings::load(&root) {
        Ok(settings) => settings,
        Err(e) => fail(json, "SETTINGS_INVALID", &e.to_string()),
    };

    let settings_file = root.join(SETTINGS_FILE_NAME);
    let spec_file = root.join(PROJECT_SPEC_FILE_NAME);
    let lock_file = lock_file_path(&spec_file);
    let global_packages = settings.global_packages_folder();
    let packages = settings.packages_folder(&root);
    let env_override = std::env::var(GLOBAL_PACKAGES_ENV)
        .ok()
        .filter(|v| !v.is_empty());

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "projectRoot": root.to_string_lossy(),
                "settingsFile": settings_file.to_string_lossy(),
                "settingsFileExists": settings_file.exists(),
                "projectSpec": spec_file.to_string_lossy(),
                "lockFile": lock_file.to_string_lossy(),
                "globalPackagesFolder": global_packages.to_string_lossy(),
                "globalPackagesFromEnv": env_override.is_some(),
                "packagesFolder": packages.to_string_lossy(),
                "packageSources": settings.package_sources,
                "maxDegreeOfParallelism": settings.max_degree_of_parallelism
            })
        );
    } else {
        println!("Project root:    {}", root.display());
        println!("Settings:        {}", settings_file.display());
        println!("Lock file:       {}", lock_file.display());
        print!("Global packages: {}", global_packages.display());
        if env_override.is_some() {
            print!(" (from {GLOBAL_PACKAGES_ENV})");
        }
        println!();
        println!("Packages:        {}", packages.display());
        if !settings.package_sources.is_empty() {
            println!("Sources:");
            for source in &settings.package_sources {
                println!("  {source}");
            }
        }
    }

    Ok(())
}

//! `check-config` and `init-config` - configuration file helpers.

use std::path::Path;

use console::style;
use serde_json::json;

use gpstracker::ConfigFile;

use crate::error::CliError;

/// Validate `path` and print the effective settings.
pub fn run_check(path: &Path, json_output: bool) -> Result<(), CliError> {
    if !path.exists() {
        return Err(CliError::Config(format!(
            "configuration file '{}' not found",
            path.display()
        )));
    }
    let config = ConfigFile::load_from(path)?;

    if json_output {
        println!("{}", json!({ "valid": true, "path": path.display().to_string() }));
        return Ok(());
    }

    let tracking = &config.tracking;
    let tracker = &config.tracker;
    println!("{} {}", style("✓").green(), path.display());
    println!();
    println!("[tracking]");
    println!("  min_distance_m        = {}", tracking.min_distance_m);
    println!("  min_interval_ms       = {}", tracking.min_interval.as_millis());
    println!("  desired_accuracy      = {} m", tracking.desired_accuracy_m);
    match tracking.timeout {
        Some(timeout) => println!("  timeout_ms            = {}", timeout.as_millis()),
        None => println!("  timeout_ms            = (none)"),
    }
    println!("[tracker]");
    println!("  history_size          = {}", tracker.history_size);
    println!("  platform_error_retries = {}", tracker.platform_error_retries);
    println!(
        "  activation_timeout_ms = {}",
        tracker.activation_timeout.as_millis()
    );
    Ok(())
}

/// Write a default configuration file to `path`.
pub fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "'{}' already exists (use --force to overwrite)",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = run_check(&temp.path().join("none.ini"), false);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_check_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[tracking]\nmin_distance_m = far\n").unwrap();

        assert!(matches!(
            run_check(&path, true),
            Err(CliError::ConfigFile(_))
        ));
    }

    #[test]
    fn test_init_then_check() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        run_init(&path, false).unwrap();
        assert!(run_init(&path, false).is_err());
        run_init(&path, true).unwrap();

        run_check(&path, true).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }
}

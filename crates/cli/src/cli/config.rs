use lc_domain::config::{Config, ConfigSeverity};

/// Parse and validate the config, printing any issues.
///
/// Returns false when errors (not just warnings) were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count, warning_count,
    );

    error_count == 0
}

/// The resolved config (with all defaults filled in) as TOML, with any
/// plaintext API key masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if let Some(key) = shown.llm.auth.key.as_mut() {
        *key = mask_secret(key);
    }
    Ok(toml::to_string_pretty(&shown)?)
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(3).collect();
    if secret.chars().count() <= 6 {
        "***".into()
    } else {
        format!("{visible}***")
    }
}

use anyhow::{Context, Result};
use regex::Regex;
use std::env;
use tracing::{debug, warn};

const ENV_PLACEHOLDER: &str = r"\$\{(\w+)\}|\$(\w+)";

fn placeholder_regex() -> Result<Regex> {
    Regex::new(ENV_PLACEHOLDER).context("Invalid environment placeholder pattern")
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME.
///
/// Unset variables are left in place so the validator can report them.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = placeholder_regex()?;
    let mut missing_vars = Vec::new();

    let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let Some(var_name) = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()) else {
            return whole.to_string();
        };

        match env::var(var_name) {
            Ok(value) => {
                debug!(var = var_name, "Substituting environment variable");
                value
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                whole.to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result.into_owned())
}

/// Check if a string still contains environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    placeholder_regex()
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

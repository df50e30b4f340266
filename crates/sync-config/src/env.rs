use regex::Regex;
use std::env;

use crate::ConfigError;

/// Interpolate environment variables in a string: replaces `${VAR_NAME}`
/// with the value of the environment variable of that name.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

    let mut result = input.to_string();
    let mut missing = Vec::new();

    let matches: Vec<_> = re
        .captures_iter(input)
        .map(|cap| {
            let full_match = cap.get(0).unwrap().as_str().to_string();
            let var_name = cap.get(1).unwrap().as_str().to_string();
            (full_match, var_name)
        })
        .collect();

    for (full_match, var_name) in matches {
        match env::var(&var_name) {
            Ok(value) => {
                result = result.replace(&full_match, &value);
            }
            Err(_) => missing.push(var_name),
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }

    Ok(result)
}

//! String helpers shared by the config loader and the `set` command.

use std::sync::LazyLock;

use anyhow::{Context, bail};
use regex::{Captures, Regex};
use serde_json::Value;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{env:([^{}]*)\}").expect("valid placeholder pattern"));

/// Replaces environment variable placeholders in a string.
///
/// Placeholders use the format `${env:VAR_NAME}`. Unset variables are
/// replaced with an empty string. Anything else, including `${other:x}`,
/// is kept verbatim.
///
/// # Example
///
/// ```rust
/// use formtool::utils::replace_env_placeholders;
///
/// unsafe { std::env::set_var("FORMTOOL_DOC_VAR", "hello"); }
/// assert_eq!(replace_env_placeholders("Value: ${env:FORMTOOL_DOC_VAR}"), "Value: hello");
/// ```
pub fn replace_env_placeholders(input: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(input, |caps: &Captures| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(value) => {
                    debug!("Using {name}={value}");
                    value
                }
                Err(_) => String::new(),
            }
        })
        .into_owned()
}

/// Parse a `path=value` assignment.
///
/// The value is read as JSON; when that fails it is taken as a plain
/// string, so `name=Alice` and `name="Alice"` mean the same. An empty value
/// (`path=`) removes the field.
pub fn parse_assignment(input: &str) -> anyhow::Result<(String, Option<Value>)> {
    let Some((path, raw)) = input.split_once('=') else {
        bail!("expected `<path>=<value>`, got `{input}`");
    };
    let path = path.trim();
    if path.is_empty() {
        bail!("empty path in assignment `{input}`");
    }
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok((path.to_string(), None));
    }
    let value = serde_json::from_str(raw)
        .or_else(|_| serde_json::to_value(raw))
        .with_context(|| format!("invalid value in `{input}`"))?;
    Ok((path.to_string(), Some(value)))
}

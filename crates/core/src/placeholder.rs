//! Placeholder substitution for SQL scripts
//!
//! Every `${key}` occurrence is replaced from the configured map before
//! execution; `${key:default}` falls back to the default when the key is not
//! configured. An unresolved key without a default aborts the run.

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};

/// Substitute configured placeholders into `content`
///
/// `script` names the artifact in error messages. Returns the content
/// unchanged when substitution is disabled.
pub fn apply_placeholders(
    content: &str,
    config: &MigrationConfig,
    script: &str,
) -> MigrationResult<String> {
    if !config.placeholder_replacement {
        return Ok(content.to_string());
    }

    let prefix = &config.placeholder_prefix;
    let suffix = &config.placeholder_suffix;

    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find(prefix.as_str()) {
        output.push_str(&rest[..start]);
        let after_prefix = &rest[start + prefix.len()..];

        let Some(end) = after_prefix.find(suffix.as_str()) else {
            // No closing token: the remainder is literal text
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let token = &after_prefix[..end];
        let (key, default) = match token.split_once(':') {
            Some((key, default)) => (key, Some(default)),
            None => (token, None),
        };

        match config.placeholders.get(key).map(String::as_str).or(default) {
            Some(value) => output.push_str(value),
            None => {
                return Err(MigrationError::UnresolvedPlaceholder {
                    key: key.to_string(),
                    script: script.to_string(),
                })
            }
        }

        rest = &after_prefix[end + suffix.len()..];
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(pairs: &[(&str, &str)]) -> MigrationConfig {
        let mut config = MigrationConfig::default();
        for (key, value) in pairs {
            config
                .placeholders
                .insert(key.to_string(), value.to_string());
        }
        config
    }

    #[test]
    fn test_substitutes_configured_values() {
        let config = config_with(&[("schema", "app"), ("owner", "svc")]);
        let sql = "CREATE TABLE ${schema}.users (id INT); ALTER TABLE ${schema}.users OWNER TO ${owner};";
        let out = apply_placeholders(sql, &config, "V1__t.sql").unwrap();
        assert_eq!(
            out,
            "CREATE TABLE app.users (id INT); ALTER TABLE app.users OWNER TO svc;"
        );
    }

    #[test]
    fn test_default_value_syntax() {
        let config = config_with(&[]);
        let out = apply_placeholders("SET ROLE ${role:admin};", &config, "s").unwrap();
        assert_eq!(out, "SET ROLE admin;");

        // Configured value wins over the default
        let config = config_with(&[("role", "deploy")]);
        let out = apply_placeholders("SET ROLE ${role:admin};", &config, "s").unwrap();
        assert_eq!(out, "SET ROLE deploy;");
    }

    #[test]
    fn test_unresolved_placeholder_fails_naming_the_key() {
        let config = config_with(&[]);
        let err = apply_placeholders("SELECT '${tenant}';", &config, "V2__x.sql").unwrap_err();
        match err {
            MigrationError::UnresolvedPlaceholder { key, script } => {
                assert_eq!(key, "tenant");
                assert_eq!(script, "V2__x.sql");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_token_is_literal() {
        let config = config_with(&[("a", "1")]);
        let out = apply_placeholders("SELECT ${a} + ${broken", &config, "s").unwrap();
        assert_eq!(out, "SELECT 1 + ${broken");
    }

    #[test]
    fn test_replacement_can_be_disabled() {
        let mut config = config_with(&[("a", "1")]);
        config.placeholder_replacement = false;
        let out = apply_placeholders("SELECT ${a};", &config, "s").unwrap();
        assert_eq!(out, "SELECT ${a};");
    }

    #[test]
    fn test_custom_prefix_suffix() {
        let mut config = config_with(&[("env", "prod")]);
        config.placeholder_prefix = "%{".to_string();
        config.placeholder_suffix = "}%".to_string();
        let out = apply_placeholders("-- %{env}%", &config, "s").unwrap();
        assert_eq!(out, "-- prod");
    }
}

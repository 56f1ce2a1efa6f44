use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use crate::client::Credential;

/// The default values applied to the Catalog Store's `settings` table when a
/// key is absent (spec §3/§6/§7).
pub const DEFAULT_FILE_TEMPLATE: &str = "{artist} - {title}";
pub const DEFAULT_FOLDER_STRUCTURE: &str = "{artist}/{album}";
pub const DEFAULT_QUALITY: &str = "lossless";
pub const DEFAULT_DOWNLOAD_PATH: &str = ".";

/// Credential configuration resolved from file + environment (spec §4.2
/// "Maintains one authenticated HTTP session per credential"). Resolution of
/// the raw value into a `Credential` is deferred to the caller, since a
/// bare token string is ambiguous between OAuth and session-cookie kinds
/// until the configured `kind` (or an `AgAAAA`/`y0_` prefix heuristic) is
/// applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    yandex: Option<YandexSection>,
    // Legacy bare-key layout, kept for backward compatibility.
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YandexSection {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_kind: Option<String>,
}

fn token_from_file(fc: &FileConfig) -> Option<String> {
    fc.yandex
        .as_ref()
        .and_then(|y| y.token.clone())
        .or_else(|| fc.token.clone())
        .filter(|s| !s.is_empty())
}

fn token_kind_from_file(fc: &FileConfig) -> Option<String> {
    fc.yandex
        .as_ref()
        .and_then(|y| y.token_kind.clone())
        .or_else(|| fc.token_kind.clone())
}

/// Resolve a raw token + optional kind hint into a typed `Credential`.
/// Mirrors the reference implementation's `token.startswith('y0_')` /
/// `'AgAAAA'` OAuth heuristic when no explicit kind is given.
pub fn resolve_credential(token: &str, kind_hint: Option<&str>) -> Credential {
    let is_oauth = match kind_hint {
        Some(k) if k.eq_ignore_ascii_case("oauth") => true,
        Some(k) if k.eq_ignore_ascii_case("session") || k.eq_ignore_ascii_case("cookie") => false,
        _ => token.starts_with("y0_") || token.starts_with("AgAAAA"),
    };
    if is_oauth {
        Credential::OAuth(token.to_string())
    } else {
        Credential::SessionCookie(token.to_string())
    }
}

fn config_path() -> PathBuf {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"));
    config_dir.join("yamuse-dl").join("config.toml")
}

/// Parse config from TOML content only (no env vars, no prompts). Exposed
/// for testing.
pub fn parse_toml_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).context("failed to parse config")
}

/// Load the credential from file + environment. Precedence: `YAMUSE_TOKEN`/
/// `YAMUSE_TOKEN_KIND` env vars, then the `[yandex]` file section, then
/// legacy bare keys.
pub fn load_credential() -> Result<Credential> {
    let file_contents = std::fs::read_to_string(config_path()).unwrap_or_default();
    let fc: FileConfig = toml::from_str(&file_contents).context("failed to parse config file")?;

    let token = std::env::var("YAMUSE_TOKEN")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| token_from_file(&fc));

    let token = match token {
        Some(t) => t,
        None => prompt_token()?,
    };

    let kind_hint = std::env::var("YAMUSE_TOKEN_KIND")
        .ok()
        .or_else(|| token_kind_from_file(&fc));

    Ok(resolve_credential(&token, kind_hint.as_deref()))
}

fn prompt_token() -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!(
            "No credential token provided. Set YAMUSE_TOKEN or add a [yandex] token to \
             ~/.config/yamuse-dl/config.toml"
        );
    }
    eprint!("Session token (OAuth or Session_id): ");
    io::stderr().flush()?;
    let token = rpassword::read_password().context("failed to read token")?;
    if token.is_empty() {
        bail!("token cannot be empty");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_format_yandex_section() {
        let cfg = parse_toml_config(
            r#"
[yandex]
token = "y0_abc123"
token_kind = "oauth"
"#,
        )
        .unwrap();
        assert_eq!(token_from_file(&cfg).as_deref(), Some("y0_abc123"));
        assert_eq!(token_kind_from_file(&cfg).as_deref(), Some("oauth"));
    }

    #[test]
    fn legacy_bare_keys() {
        let cfg = parse_toml_config(r#"token = "abc""#).unwrap();
        assert_eq!(token_from_file(&cfg).as_deref(), Some("abc"));
    }

    #[test]
    fn section_takes_precedence_over_bare_keys() {
        let cfg = parse_toml_config(
            r#"
token = "bare-token"

[yandex]
token = "section-token"
"#,
        )
        .unwrap();
        assert_eq!(token_from_file(&cfg).as_deref(), Some("section-token"));
    }

    #[test]
    fn empty_token_treated_as_missing() {
        let cfg = parse_toml_config(r#"token = """#).unwrap();
        assert!(token_from_file(&cfg).is_none());
    }

    #[test]
    fn empty_config() {
        let cfg = parse_toml_config("").unwrap();
        assert!(token_from_file(&cfg).is_none());
    }

    #[test]
    fn oauth_token_detected_by_prefix() {
        let cred = resolve_credential("y0_sometoken", None);
        assert!(matches!(cred, Credential::OAuth(_)));
    }

    #[test]
    fn agaaaa_prefixed_token_is_oauth() {
        let cred = resolve_credential("AgAAAAsomething", None);
        assert!(matches!(cred, Credential::OAuth(_)));
    }

    #[test]
    fn plain_token_defaults_to_session_cookie() {
        let cred = resolve_credential("abcdef0123456789", None);
        assert!(matches!(cred, Credential::SessionCookie(_)));
    }

    #[test]
    fn explicit_session_kind_overrides_prefix_heuristic() {
        let cred = resolve_credential("y0_looks_like_oauth", Some("session"));
        assert!(matches!(cred, Credential::SessionCookie(_)));
    }
}

//! `UserPromptSubmit` hook payload.

use serde::Deserialize;
use std::env;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, RouterError};

/// Input payload from the `UserPromptSubmit` hook
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInput {
    /// The user's prompt text. Older hosts send `user_prompt`.
    #[serde(default, alias = "user_prompt")]
    pub prompt: String,

    /// Current working directory
    #[serde(default)]
    pub cwd: String,

    #[serde(default)]
    pub session_id: String,

    /// Path to conversation transcript
    #[serde(default)]
    pub transcript_path: String,

    /// Permission mode (ask, auto, etc.)
    #[serde(default)]
    pub permission_mode: String,
}

impl HookInput {
    /// Parse a payload from any reader (stdin in production)
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = String::new();
        reader
            .read_to_string(&mut raw)
            .map_err(RouterError::StdinRead)?;
        debug!("Received input: {} bytes", raw.len());
        Ok(serde_json::from_str(&raw)?)
    }

    /// Payload cwd, then `$CWD`, then the process cwd
    pub fn resolve_cwd(&self) -> PathBuf {
        resolve_cwd_with(&self.cwd, env::var("CWD").ok())
    }
}

fn resolve_cwd_with(payload_cwd: &str, env_cwd: Option<String>) -> PathBuf {
    if !payload_cwd.is_empty() {
        return PathBuf::from(payload_cwd);
    }
    match env_cwd {
        Some(cwd) if !cwd.is_empty() => PathBuf::from(cwd),
        _ => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        let json =
            r#"{"prompt":"merge pdf","cwd":"/work","sessionId":"abc","permissionMode":"ask"}"#;
        let input = HookInput::from_reader(json.as_bytes()).unwrap();
        assert_eq!(input.prompt, "merge pdf");
        assert_eq!(input.cwd, "/work");
        assert_eq!(input.session_id, "abc");
        assert_eq!(input.permission_mode, "ask");
        assert!(input.transcript_path.is_empty());
    }

    #[test]
    fn test_user_prompt_alias() {
        let json = r#"{"user_prompt":"analyze excel"}"#;
        let input = HookInput::from_reader(json.as_bytes()).unwrap();
        assert_eq!(input.prompt, "analyze excel");
    }

    #[test]
    fn test_invalid_json() {
        let err = HookInput::from_reader("not json".as_bytes()).unwrap_err();
        assert!(matches!(err, RouterError::InputParse(_)));
    }

    #[test]
    fn test_cwd_fallbacks() {
        assert_eq!(resolve_cwd_with("/work", Some("/env".into())), PathBuf::from("/work"));
        assert_eq!(resolve_cwd_with("", Some("/env".into())), PathBuf::from("/env"));
        assert!(!resolve_cwd_with("", None).as_os_str().is_empty());
    }
}

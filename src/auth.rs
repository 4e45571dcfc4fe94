// Credential setup
//
// Interactive prompt for the four Meta app credentials, persisted into the
// `[credentials]` section of the config file. Other sections of an existing
// file are preserved.

use crate::config::{Config, ConfigError, Credentials};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;

const PROMPTS: [(&str, &str); 4] = [
    ("access_token", "Enter your Meta Access Token"),
    ("business_account_id", "Enter your Instagram Business Account ID"),
    ("app_id", "Enter your Meta App ID"),
    ("app_secret", "Enter your Meta App Secret"),
];

/// Result of `auth status`
#[derive(Debug, PartialEq, Eq)]
pub enum CredentialStatus {
    /// No credentials in the file or environment
    Missing,
    Valid,
    Invalid(ConfigError),
}

/// Prompt for credentials on `input`/`output` and write them to `path`
pub fn setup<R: BufRead, W: Write>(path: &Path, input: &mut R, output: &mut W) -> Result<Credentials> {
    writeln!(output, "\n📸 Instagram Manager - Authentication Setup\n")?;

    let mut answers = Vec::with_capacity(PROMPTS.len());
    for (field, prompt) in PROMPTS {
        answers.push(prompt_required(input, output, field, prompt)?);
    }
    let [access_token, business_account_id, app_id, app_secret]: [String; 4] = answers
        .try_into()
        .map_err(|_| anyhow::anyhow!("Credential prompt ended early"))?;

    let credentials = Credentials {
        access_token,
        business_account_id,
        app_id,
        app_secret,
    };

    // Environment values are not written back into the file
    let mut config = Config::load_with_env(path, |_| None)?;
    config.credentials = credentials.clone();
    config.save_to_path(path)?;

    writeln!(output, "\n✓ Authentication setup complete!")?;
    writeln!(output, "Configuration written to {}", path.display())?;
    Ok(credentials)
}

fn prompt_required<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    field: &str,
    prompt: &str,
) -> Result<String> {
    loop {
        write!(output, "{}: ", prompt)?;
        output.flush()?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .with_context(|| format!("Failed to read {}", field))?;
        if read == 0 {
            bail!("Input closed before {} was entered", field);
        }

        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        writeln!(output, "{} is required", field)?;
    }
}

/// Evaluate the credentials in an already loaded configuration
pub fn status(config: &Config) -> CredentialStatus {
    if config.credentials.is_empty() {
        return CredentialStatus::Missing;
    }
    match config.credentials.validate() {
        Ok(()) => CredentialStatus::Valid,
        Err(e) => CredentialStatus::Invalid(e),
    }
}

/// Remove the config file; returns whether a file was removed
pub fn clear(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_setup_writes_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut input = Cursor::new("tok\nig-1\napp-1\nsecret-1\n");
        let mut output = Vec::new();

        let creds = setup(&path, &mut input, &mut output).unwrap();
        assert_eq!(creds.business_account_id, "ig-1");

        let loaded = Config::load_with_env(&path, |_| None).unwrap();
        assert_eq!(loaded.credentials, creds);
        assert_eq!(status(&loaded), CredentialStatus::Valid);
    }

    #[test]
    fn test_setup_reprompts_on_empty_answer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut input = Cursor::new("\n  \ntok\nig\napp\nsecret\n");
        let mut output = Vec::new();

        let creds = setup(&path, &mut input, &mut output).unwrap();
        assert_eq!(creds.access_token, "tok");

        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("access_token is required").count(), 2);
    }

    #[test]
    fn test_setup_fails_on_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut input = Cursor::new("tok\n");
        let mut output = Vec::new();

        assert!(setup(&path, &mut input, &mut output).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_setup_preserves_other_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[webhook]\nport = 4321\n").unwrap();

        let mut input = Cursor::new("a\nb\nc\nd\n");
        setup(&path, &mut input, &mut Vec::new()).unwrap();

        let loaded = Config::load_with_env(&path, |_| None).unwrap();
        assert_eq!(loaded.webhook.port, 4321);
        assert_eq!(loaded.credentials.app_secret, "d");
    }

    #[test]
    fn test_status_variants() {
        let mut config = Config::default();
        assert_eq!(status(&config), CredentialStatus::Missing);

        config.credentials.access_token = "YOUR_META_ACCESS_TOKEN".to_string();
        assert_eq!(
            status(&config),
            CredentialStatus::Invalid(ConfigError::InvalidCredential("access_token"))
        );
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert!(!clear(&path).unwrap());

        std::fs::write(&path, "").unwrap();
        assert!(clear(&path).unwrap());
        assert!(!path.exists());
    }
}

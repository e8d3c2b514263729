use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# localchat configuration
#
# Every value can also be set from the environment, e.g.
#   LOCALCHAT_OLLAMA__BASE_URL=http://gpu-box:11434
# and from the command line (--ollama-url, --chat-url, --model).

# ── Inference server ─────────────────────────────────────────────
[ollama]
base_url = "http://localhost:11434"
# Timeout in seconds for listing and deleting models
timeout_secs = 10

# ── Chat backend ─────────────────────────────────────────────────
[chat]
base_url = "http://localhost:5000"
# Used when the server has no models installed
default_model = "llama3.2:latest"

# ── Dictation (Ctrl+L) ───────────────────────────────────────────
# A program that listens on the microphone and prints the transcript
# so far, one line per update. Leave unset to disable dictation.
[voice]
# command = "whisper-stream"
# args = ["--language", "en"]
"#;

pub fn run() -> Result<()> {
    let config_path = Config::config_path()?;

    if config_path.exists() {
        println!("Existing config file found:");
        println!("  {}", config_path.display());
        print!("\nOverwrite? (The existing file will be backed up) [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    if let Some(backup) = write_template(&config_path)? {
        println!("  Backed up to {}", backup.display());
    }
    println!("Created {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Start Ollama:      ollama serve");
    println!("  2. Start chatting:    localchat");
    println!("  3. Or ask once:       localchat ask \"hello world\"");

    Ok(())
}

/// Write the template to `path`, moving any existing file aside first.
/// Returns where the old file went.
pub fn write_template(path: &Path) -> Result<Option<PathBuf>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    }

    let backup = if path.exists() {
        Some(backup_file(path)?)
    } else {
        None
    };

    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(backup)
}

/// Back up a file to <name>.bak, appending a timestamp if .bak already exists.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let mut backup = path.with_extension("toml.bak");

    if backup.exists() {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        backup = path.with_extension(format!("toml.bak.{}", secs));
    }

    std::fs::rename(path, &backup)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_parses_as_defaults() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_write_template_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("localchat").join("config.toml");

        let backup = write_template(&path).unwrap();
        assert!(backup.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);
    }

    #[test]
    fn test_write_template_backs_up_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[chat]\ndefault_model = \"mine\"\n").unwrap();

        let backup = write_template(&path).unwrap().unwrap();
        assert_eq!(backup, temp_dir.path().join("config.toml.bak"));
        assert!(std::fs::read_to_string(&backup).unwrap().contains("mine"));

        // A second run must not clobber the first backup.
        let second = write_template(&path).unwrap().unwrap();
        assert_ne!(second, backup);
        assert!(backup.exists());
    }
}

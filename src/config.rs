//! Runtime configuration for lollms-bridge.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Sampling defaults, antiprompt markers and the mounted binding live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "lollms-bridge", about = "Streaming generation bridge for a mounted model binding")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address. Overrides `server.listen` from the config file.
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Model configuration.
    pub model: ModelConfig,

    /// Process-wide sampling defaults.
    pub generation: GenerationDefaults,

    /// Hallucination guard settings.
    pub antiprompt: AntipromptConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:9600").
    pub listen: String,

    /// Chunks buffered between the generation worker and the HTTP stream.
    /// With 1 the binding runs at most one chunk ahead of the client.
    pub stream_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9600".to_string(),
            stream_channel_capacity: 1,
        }
    }
}

/// Which built-in binding to mount at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    /// Echo the prompt back word by word.
    Echo,
    /// Start without a binding; generation endpoints answer `null`.
    None,
}

/// Model-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name reported in OpenAI-style responses.
    pub model_name: String,

    /// Binding mounted at startup.
    pub binding: BindingKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "echo".to_string(),
            binding: BindingKind::Echo,
        }
    }
}

/// Sampling defaults used when a request leaves a parameter unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    /// Maximum tokens to generate.
    pub n_predict: usize,

    /// Sampling temperature.
    pub temperature: f64,

    /// Top-k sampling cutoff.
    pub top_k: u32,

    /// Top-p (nucleus) sampling threshold.
    pub top_p: f64,

    /// Repetition penalty.
    pub repeat_penalty: f64,

    /// Window (in tokens) the repetition penalty looks back over.
    pub repeat_last_n: u32,

    /// Random seed (-1 = random).
    pub seed: i64,

    /// Threads the binding may use.
    pub n_threads: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            n_predict: 1024,
            temperature: 0.4,
            top_k: 50,
            top_p: 0.6,
            repeat_penalty: 1.3,
            repeat_last_n: 40,
            seed: -1,
            n_threads: 1,
        }
    }
}

/// Antiprompt markers that signal the model started writing its own dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntipromptConfig {
    pub markers: Vec<String>,
}

impl Default for AntipromptConfig {
    fn default() -> Self {
        Self {
            markers: vec!["!@>".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.generation.n_predict, 1024);
        assert_eq!(cfg.generation.top_k, 50);
        assert_eq!(cfg.antiprompt.markers, vec!["!@>".to_string()]);
        assert_eq!(cfg.model.binding, BindingKind::Echo);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"generation": {"temperature": 0.9}, "model": {"binding": "none"}}"#)
                .unwrap();
        assert_eq!(cfg.generation.temperature, 0.9);
        assert_eq!(cfg.generation.repeat_last_n, 40);
        assert_eq!(cfg.model.binding, BindingKind::None);
        assert_eq!(cfg.model.model_name, "echo");
        assert_eq!(cfg.server.stream_channel_capacity, 1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = Config::load(std::path::Path::new("/nonexistent/lollms-bridge.json")).unwrap();
        assert_eq!(cfg.server.listen, "0.0.0.0:9600");
    }
}

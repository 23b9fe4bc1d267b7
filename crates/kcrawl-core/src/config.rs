//! KCrawl Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for offline development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Retrieval backend configuration
    pub search: SearchConfig,

    /// Pipeline behaviour
    pub pipeline: PipelineConfig,

    /// Record output
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        // Search
        if let Ok(provider) = std::env::var("SEARCH_PROVIDER") {
            self.search.provider = provider.parse()?;
        }
        if let Ok(url) = std::env::var("SEARXNG_URL") {
            self.search.searxng_url = url;
        }
        if let Ok(dir) = std::env::var("CORPUS_DIR") {
            self.search.corpus_dir = Some(PathBuf::from(dir));
        }

        // Pipeline
        if let Ok(path) = std::env::var("ROSTER_PATH") {
            self.pipeline.roster_path = Some(PathBuf::from(path));
        }
        if let Ok(secs) = std::env::var("STAGE_TIMEOUT_SECS") {
            self.pipeline.stage_timeout_secs =
                secs.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "STAGE_TIMEOUT_SECS".to_string(),
                    value: secs,
                })?;
        }

        // Output
        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        self.validate()
    }

    /// Reject values that would silently disable a stage
    fn validate(&self) -> Result<(), ConfigError> {
        // A zero cap makes every retrieval come back empty
        if self.search.max_text_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.max_text_chars".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Simulated,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
    /// Offline canned responses, dispatched per stage
    Simulated,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            "simulated" => Ok(Self::Simulated),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Retrieval backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Retrieval backend to use
    pub provider: SearchProvider,

    /// SearxNG instance base URL
    pub searxng_url: String,

    /// Preferred result language passed to the search engine
    pub language: Option<String>,

    /// Directory of `.txt`/`.md` documents for corpus retrieval
    pub corpus_dir: Option<PathBuf>,

    /// Results kept per query
    pub max_results_per_query: usize,

    /// Upper bound on aggregated text (characters)
    pub max_text_chars: usize,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProvider::Simulated,
            searxng_url: "http://localhost:8888".to_string(),
            language: None,
            corpus_dir: None,
            max_results_per_query: 5,
            max_text_chars: 20_000,
            timeout_secs: 30,
        }
    }
}

/// Supported retrieval backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Searxng,
    Corpus,
    /// Offline canned text
    Simulated,
}

impl std::str::FromStr for SearchProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "searxng" => Ok(Self::Searxng),
            "corpus" => Ok(Self::Corpus),
            "simulated" => Ok(Self::Simulated),
            _ => Err(ConfigError::InvalidValue {
                key: "SEARCH_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Roster file (.xlsx, .xls, .csv or .txt)
    pub roster_path: Option<PathBuf>,

    /// Process only the first N roster entries
    pub limit: Option<usize>,

    /// Timeout applied to every collaborator call
    pub stage_timeout_secs: u64,

    /// Re-validate the record returned by the correction stage
    pub revalidate_correction: bool,

    /// Directory with prompt template overrides
    pub prompt_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            roster_path: None,
            limit: None,
            stage_timeout_secs: 180,
            revalidate_correction: true,
            prompt_dir: None,
        }
    }
}

/// Record output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `<entity_id>.json` files
    pub dir: PathBuf,

    /// Optional JSON run report path
    pub report_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            report_path: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, LlmProvider::Simulated);
        assert_eq!(config.search.provider, SearchProvider::Simulated);
        assert_eq!(config.output.dir, PathBuf::from("output"));
        assert!(config.pipeline.revalidate_correction);
        assert!(config.pipeline.limit.is_none());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("openai".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert_eq!("Ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert!("invalid".parse::<LlmProvider>().is_err());

        assert_eq!("searxng".parse::<SearchProvider>().unwrap(), SearchProvider::Searxng);
        assert_eq!("corpus".parse::<SearchProvider>().unwrap(), SearchProvider::Corpus);
        assert!("bing".parse::<SearchProvider>().is_err());
    }

    #[test]
    fn test_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pipeline]\nlimit = 2\nrevalidate_correction = false\n\n[llm]\nprovider = \"ollama\"\nmodel = \"qwen2.5\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.limit, Some(2));
        assert!(!config.pipeline.revalidate_correction);
        assert_eq!(config.pipeline.stage_timeout_secs, 180);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.search.max_results_per_query, 5);
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline\nlimit = ").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_zero_text_cap_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nmax_text_chars = 0").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "search.max_text_chars"
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/kcrawl.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}

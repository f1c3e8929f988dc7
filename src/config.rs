use clap::{Parser, Subcommand};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::db::executor::DEFAULT_MAX_ROWS;
use crate::nlq::guard::GuardConfig;
use crate::nlq::prompts::PromptCatalog;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
    /// Rows kept from a generated query; the rest of the result is dropped.
    pub max_rows: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "ollama" or "remote"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub sql_temperature: f32,
    pub answer_temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptCatalog,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DuckDB database file
    #[arg(long, value_name = "PATH")]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create the hospital tables and load the demo data set
    Seed,
    /// Replace the phone directory with the contents of an ANEXO/DISPLAY CSV
    LoadDirectory {
        #[arg(value_name = "CSV")]
        path: PathBuf,
    },
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let mut config_builder = Config::builder()
            .set_default("database.connection_string", defaults.database.connection_string)?
            .set_default("database.pool_size", defaults.database.pool_size as u64)?
            .set_default("database.max_rows", defaults.database.max_rows as u64)?
            .set_default("web.host", defaults.web.host)?
            .set_default("web.port", defaults.web.port as u64)?
            .set_default("llm.backend", defaults.llm.backend)?
            .set_default("llm.model", defaults.llm.model)?
            .set_default("llm.sql_temperature", defaults.llm.sql_temperature as f64)?
            .set_default("llm.answer_temperature", defaults.llm.answer_temperature as f64)?
            .set_default("llm.timeout_secs", defaults.llm.timeout_secs)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder
                .add_source(File::from(config_path.as_path()).format(FileFormat::Toml));
        } else {
            let default_locations = ["config.toml", "config/config.toml", "/etc/nexa/config.toml"];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder = config_builder.add_source(File::new(location, FileFormat::Toml));
                    break;
                }
            }
        }

        // NEXA__LLM__API_KEY and friends
        config_builder = config_builder.add_source(Environment::with_prefix("NEXA").separator("__"));

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "nexa.duckdb".to_string(),
                pool_size: 5,
                max_rows: DEFAULT_MAX_ROWS,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "ollama".to_string(),
                model: "qwen2.5-coder:1.5b".to_string(),
                api_key: None,
                api_url: None,
                sql_temperature: 0.1,
                answer_temperature: 0.5,
                timeout_secs: 60,
            },
            prompts: PromptCatalog::default(),
            guard: GuardConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_with_file(path: &Path) -> CliArgs {
        CliArgs {
            config: Some(path.to_path_buf()),
            host: None,
            port: None,
            database: None,
            command: None,
        }
    }

    #[test]
    fn test_file_values_and_defaults_merge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
backend = "remote"
model = "gpt-4o-mini"
api_url = "https://llm.example/v1"
api_key = "secret"

[guard]
allowed_tables = ["areas"]
"#
        )
        .unwrap();

        let config = AppConfig::new(&args_with_file(file.path())).unwrap();

        assert_eq!(config.llm.backend, "remote");
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.llm.sql_temperature, 0.1);
        assert_eq!(config.llm.answer_temperature, 0.5);
        assert_eq!(config.database.connection_string, "nexa.duckdb");
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.database.max_rows, DEFAULT_MAX_ROWS);
        assert_eq!(config.guard.allowed_tables, vec!["areas".to_string()]);
        assert!(config.guard.enforce_read_only);
        assert!(config.history.enabled);
        assert!(config.prompts.sql_template.contains("{question}"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[web]\nhost = \"0.0.0.0\"\nport = 8080\n[database]\nmax_rows = 25").unwrap();

        let mut args = args_with_file(file.path());
        args.port = Some(9090);
        args.database = Some(":memory:".to_string());

        let config = AppConfig::new(&args).unwrap();
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 9090);
        assert_eq!(config.database.connection_string, ":memory:");
        assert_eq!(config.database.max_rows, 25);
    }

    #[test]
    fn test_prompt_overrides_keep_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[prompts]\nanswer_template = \"Datos: {{result}} / {{question}}\""
        )
        .unwrap();

        let config = AppConfig::new(&args_with_file(file.path())).unwrap();
        assert_eq!(config.prompts.answer_template, "Datos: {result} / {question}");
        assert_eq!(
            config.prompts.sql_template,
            PromptCatalog::default().sql_template
        );
    }
}

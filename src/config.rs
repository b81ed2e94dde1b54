use crate::error::{PlannerError, Result};
use crate::logic::RetryPolicy;
use crate::models::{LatLng, RainThresholds};
use config::{Environment, File, FileFormat};
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "palmwater";
const ENV_PREFIX: &str = "PALMWATER";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub plantation: PlantationConfig,
    #[serde(default)]
    pub openweathermap: Option<OpenWeatherMapConfig>,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlantationConfig {
    pub name: String,
    pub operator: String,
    /// Center used for the outlook screen
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_cost_per_square_meter")]
    pub cost_per_square_meter: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_cost_per_square_meter() -> f64 {
    0.05
}

fn default_currency() -> String {
    "RM".into()
}

#[derive(Clone, Deserialize, Serialize)]
pub struct OpenWeatherMapConfig {
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl OpenWeatherMapConfig {
    pub fn is_active(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for OpenWeatherMapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherMapConfig")
            .field("api_key", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastConfig {
    /// Daily max precipitation probability (0.0-1.0) that blocks watering
    #[serde(default = "default_rain_probability_threshold")]
    pub rain_probability_threshold: f64,
    /// Daily total precipitation that blocks watering
    #[serde(default = "default_rain_threshold_mm")]
    pub rain_threshold_mm: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_outlook_days")]
    pub outlook_days: usize,
}

fn default_rain_probability_threshold() -> f64 {
    0.5
}

fn default_rain_threshold_mm() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_outlook_days() -> usize {
    5
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            rain_probability_threshold: default_rain_probability_threshold(),
            rain_threshold_mm: default_rain_threshold_mm(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            outlook_days: default_outlook_days(),
        }
    }
}

impl ForecastConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn rain_thresholds(&self) -> RainThresholds {
        RainThresholds {
            probability: self.rain_probability_threshold,
            precipitation_mm: self.rain_threshold_mm,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Admin number for the wa.me link, international format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_phone: Option<String>,
    /// Where receipts are written; defaults to the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(PlannerError::Config(format!(
                "Config file not found at {:?}. Run `palmwater init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| PlannerError::Config(format!("Failed to read config: {}", e)))?;

        tracing::debug!(path = %config_path.display(), "Loading configuration");
        Self::from_yaml(
            &config_str,
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Parse YAML content, expand `${VAR}` references and layer `env` on top.
    fn from_yaml(content: &str, env: Environment) -> Result<Self> {
        let content = Self::substitute_env_vars(content);

        let settings = config::Config::builder()
            .add_source(File::from_str(&content, FileFormat::Yaml))
            .add_source(env)
            .build()
            .map_err(|e| PlannerError::Config(format!("Failed to parse config: {}", e)))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PlannerError::Config(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.plantation_center()
            .validate()
            .map_err(|e| PlannerError::Config(format!("plantation location: {}", e)))?;

        let rate = self.plantation.cost_per_square_meter;
        if !rate.is_finite() || rate < 0.0 {
            return Err(PlannerError::Config(format!(
                "cost_per_square_meter must be a non-negative number, got {}",
                rate
            )));
        }

        let p = self.forecast.rain_probability_threshold;
        if !(0.0..=1.0).contains(&p) {
            return Err(PlannerError::Config(format!(
                "rain_probability_threshold must be between 0 and 1, got {}",
                p
            )));
        }

        Ok(())
    }

    pub fn plantation_center(&self) -> LatLng {
        LatLng::new(self.plantation.latitude, self.plantation.longitude)
    }

    /// OpenWeatherMap settings when enabled and keyed
    pub fn active_openweathermap(&self) -> Option<&OpenWeatherMapConfig> {
        self.openweathermap.as_ref().filter(|c| c.is_active())
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let default_path = Self::default_config_path()?;
        Ok(default_path)
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/palmwater/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PlannerError::Config("Cannot determine config directory".into()))?
            .join(APP_DIR);
        Ok(config_dir.join("config.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("No configuration found. Let's set up palmwater!");
        println!();

        println!("Plantation");
        let name: String = Input::new()
            .with_prompt("  Plantation name")
            .default("Main Estate".into())
            .interact_text()
            .map_err(input_error)?;

        let operator: String = Input::new()
            .with_prompt("  Operator name")
            .interact_text()
            .map_err(input_error)?;

        let latitude: f64 = Input::new()
            .with_prompt("  Latitude")
            .default(3.5609)
            .interact_text()
            .map_err(input_error)?;

        let longitude: f64 = Input::new()
            .with_prompt("  Longitude")
            .default(101.6585)
            .interact_text()
            .map_err(input_error)?;

        let currency: String = Input::new()
            .with_prompt("  Currency prefix")
            .default(default_currency())
            .interact_text()
            .map_err(input_error)?;

        let cost_per_square_meter: f64 = Input::new()
            .with_prompt("  Irrigation cost per m²")
            .default(default_cost_per_square_meter())
            .interact_text()
            .map_err(input_error)?;

        println!();

        println!("OpenWeatherMap (leave empty to skip)");
        let owm_api_key: String = Password::new()
            .with_prompt("  API key")
            .allow_empty_password(true)
            .interact()
            .map_err(input_error)?;

        let openweathermap = if owm_api_key.is_empty() {
            None
        } else {
            Some(OpenWeatherMapConfig {
                api_key: owm_api_key,
                enabled: true,
            })
        };

        println!();

        println!("Export");
        let phone: String = Input::new()
            .with_prompt("  Admin WhatsApp number (leave empty to skip)")
            .allow_empty(true)
            .interact_text()
            .map_err(input_error)?;

        println!();

        let config = Config {
            plantation: PlantationConfig {
                name,
                operator,
                latitude,
                longitude,
                cost_per_square_meter,
                currency,
            },
            openweathermap,
            forecast: ForecastConfig::default(),
            export: ExportConfig {
                whatsapp_phone: (!phone.trim().is_empty()).then(|| phone.trim().to_string()),
                output_dir: None,
            },
        };
        config.validate()?;

        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| PlannerError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# palmwater configuration\n# Generated by `palmwater init`\n# Environment variable substitution (${{VAR}}) is supported.\n# Any key can be overridden with PALMWATER__SECTION__KEY.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
            return result;
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("PALMWATER_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| PlannerError::Config("Cannot determine data directory".into()))?
            .join(APP_DIR);

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("palmwater.db"))
    }

    /// Receipt directory: configured output dir, else `<data dir>/receipts`.
    pub fn receipts_dir(&self, data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        match &self.export.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir(data_dir_override)?.join("receipts")),
        }
    }
}

fn input_error(e: dialoguer::Error) -> PlannerError {
    PlannerError::Config(format!("Input error: {}", e))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plantation: PlantationConfig {
                name: "Main Estate".into(),
                operator: "Operator".into(),
                latitude: 3.5609,
                longitude: 101.6585,
                cost_per_square_meter: default_cost_per_square_meter(),
                currency: default_currency(),
            },
            openweathermap: None,
            forecast: ForecastConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

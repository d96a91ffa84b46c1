use crate::utils::error::{Result, StockError};
use crate::utils::logger::LogOptions;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_STORAGE_ROOT: &str = "./stock";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockpileConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    pub policy: PolicyConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_STORAGE_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Caller identity with unlimited quota and no cooldown.
    pub owner: String,
    /// Highest privilege first; the first tier a caller belongs to wins.
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    /// Membership key the front end reports (e.g. a role id). Defaults to `name`.
    pub role: Option<String>,
    pub max_withdraw: usize,
    #[serde(default)]
    pub cooldown_ms: u64,
}

impl TierConfig {
    pub fn new(name: &str, max_withdraw: usize, cooldown: Duration) -> Self {
        Self {
            name: name.to_string(),
            role: None,
            max_withdraw,
            cooldown_ms: u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn role_key(&self) -> &str {
        self.role.as_deref().unwrap_or(&self.name)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub json: Option<bool>,
    pub verbose: Option<bool>,
    /// `EnvFilter` directive, e.g. `"stockpile::core=debug,warn"`; `RUST_LOG` still wins.
    pub filter: Option<String>,
}

impl StockpileConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${STOCKPILE_OWNER})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn storage_root(&self) -> &str {
        &self.storage.root
    }

    pub fn log_options(&self) -> LogOptions {
        match &self.logging {
            Some(logging) => LogOptions {
                json: logging.json.unwrap_or(false),
                verbose: logging.verbose.unwrap_or(false),
                directive: logging.filter.clone(),
            },
            None => LogOptions::default(),
        }
    }
}

impl Validate for PolicyConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("policy.owner", &self.owner)?;
        validation::validate_no_placeholder("policy.owner", &self.owner)?;

        for tier in &self.tiers {
            validation::validate_non_empty_string("policy.tiers.name", &tier.name)?;
            validation::validate_non_empty_string("policy.tiers.role", tier.role_key())?;
            validation::validate_positive_number(
                &format!("policy.tiers.{}.max_withdraw", tier.name),
                tier.max_withdraw,
                1,
            )?;
        }

        validation::validate_unique("policy.tiers.name", self.tiers.iter().map(|t| t.name.as_str()))?;
        validation::validate_unique("policy.tiers.role", self.tiers.iter().map(|t| t.role_key()))
    }
}

impl Validate for StockpileConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("storage.root", &self.storage.root)?;
        validation::validate_no_placeholder("storage.root", &self.storage.root)?;
        if let Some(filter) = self.logging.as_ref().and_then(|l| l.filter.as_deref()) {
            if let Err(e) = EnvFilter::try_new(filter) {
                return Err(StockError::InvalidConfigValueError {
                    field: "logging.filter".to_string(),
                    value: filter.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        self.policy.validate()
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockError {
    #[error("Service not found: {service}")]
    NotFound { service: String },

    #[error("Service already exists: {service}")]
    AlreadyExists { service: String },

    #[error("Not enough stock in {service}: requested {requested}, available {available}")]
    InsufficientStock {
        service: String,
        requested: usize,
        available: usize,
    },

    #[error("Caller {caller} has no tier that permits withdrawals")]
    PolicyDenied { caller: String },

    #[error("Cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    #[error("Requested {requested} records, tier allows at most {max}")]
    QuotaExceeded { requested: usize, max: usize },

    #[error("Only the owner may perform this operation (caller: {caller})")]
    OwnerOnly { caller: String },

    #[error("Invalid withdrawal count: {count}")]
    InvalidCount { count: usize },

    #[error("Invalid service name '{name}': {reason}")]
    InvalidServiceName { name: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing config field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lookup,
    Conflict,
    Stock,
    Policy,
    Input,
    Storage,
    Config,
}

impl StockError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StockError::NotFound { .. } => ErrorCategory::Lookup,
            StockError::AlreadyExists { .. } => ErrorCategory::Conflict,
            StockError::InsufficientStock { .. } => ErrorCategory::Stock,
            StockError::PolicyDenied { .. }
            | StockError::CooldownActive { .. }
            | StockError::QuotaExceeded { .. }
            | StockError::OwnerOnly { .. } => ErrorCategory::Policy,
            StockError::InvalidCount { .. } | StockError::InvalidServiceName { .. } => {
                ErrorCategory::Input
            }
            StockError::Storage(_) => ErrorCategory::Storage,
            StockError::ConfigParse(_)
            | StockError::InvalidConfigValueError { .. }
            | StockError::MissingConfigError { .. } => ErrorCategory::Config,
        }
    }

    /// 是否為政策拒絕 (非故障)
    pub fn is_denial(&self) -> bool {
        self.category() == ErrorCategory::Policy
    }

    /// CLI 結束碼: 2 拒絕, 3 查無/衝突/庫存不足, 4 儲存失敗, 其他 1
    pub fn exit_code(&self) -> i32 {
        if self.is_denial() {
            return 2;
        }
        match self.category() {
            ErrorCategory::Lookup | ErrorCategory::Conflict | ErrorCategory::Stock => 3,
            ErrorCategory::Storage => 4,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, StockError>;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    InvalidFormat(String),
    DuplicateCode(String),
    CodeGenerationExhausted(String),
    QuotaExceeded(String),
    InvalidExpiry(String),
    NotFound(String),
    IntegrityConflict(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Serialization(String),
}

impl LinkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::InvalidFormat(_) => "E001",
            LinkError::DuplicateCode(_) => "E002",
            LinkError::CodeGenerationExhausted(_) => "E003",
            LinkError::QuotaExceeded(_) => "E004",
            LinkError::InvalidExpiry(_) => "E005",
            LinkError::NotFound(_) => "E006",
            LinkError::IntegrityConflict(_) => "E007",
            LinkError::DatabaseConfig(_) => "E008",
            LinkError::DatabaseConnection(_) => "E009",
            LinkError::DatabaseOperation(_) => "E010",
            LinkError::Serialization(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkError::InvalidFormat(_) => "Invalid Format",
            LinkError::DuplicateCode(_) => "Duplicate Code",
            LinkError::CodeGenerationExhausted(_) => "Code Generation Exhausted",
            LinkError::QuotaExceeded(_) => "Quota Exceeded",
            LinkError::InvalidExpiry(_) => "Invalid Expiry",
            LinkError::NotFound(_) => "Resource Not Found",
            LinkError::IntegrityConflict(_) => "Integrity Conflict",
            LinkError::DatabaseConfig(_) => "Database Configuration Error",
            LinkError::DatabaseConnection(_) => "Database Connection Error",
            LinkError::DatabaseOperation(_) => "Database Operation Error",
            LinkError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkError::InvalidFormat(msg)
            | LinkError::DuplicateCode(msg)
            | LinkError::CodeGenerationExhausted(msg)
            | LinkError::QuotaExceeded(msg)
            | LinkError::InvalidExpiry(msg)
            | LinkError::NotFound(msg)
            | LinkError::IntegrityConflict(msg)
            | LinkError::DatabaseConfig(msg)
            | LinkError::DatabaseConnection(msg)
            | LinkError::DatabaseOperation(msg)
            | LinkError::Serialization(msg) => msg,
        }
    }

    /// 调用方输入导致的错误（Web 层渲染为用户提示，不应重试）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LinkError::InvalidFormat(_)
                | LinkError::DuplicateCode(_)
                | LinkError::QuotaExceeded(_)
                | LinkError::InvalidExpiry(_)
                | LinkError::NotFound(_)
        )
    }

    /// 格式化为彩色输出（用于 CLI 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkError {}

// 便捷的构造函数
impl LinkError {
    pub fn invalid_format<T: Into<String>>(msg: T) -> Self {
        LinkError::InvalidFormat(msg.into())
    }

    pub fn duplicate_code<T: Into<String>>(msg: T) -> Self {
        LinkError::DuplicateCode(msg.into())
    }

    pub fn code_generation_exhausted<T: Into<String>>(msg: T) -> Self {
        LinkError::CodeGenerationExhausted(msg.into())
    }

    pub fn quota_exceeded<T: Into<String>>(msg: T) -> Self {
        LinkError::QuotaExceeded(msg.into())
    }

    pub fn invalid_expiry<T: Into<String>>(msg: T) -> Self {
        LinkError::InvalidExpiry(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkError::NotFound(msg.into())
    }

    pub fn integrity_conflict<T: Into<String>>(msg: T) -> Self {
        LinkError::IntegrityConflict(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkError::DatabaseOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkError::Serialization(msg.into())
    }
}

impl From<sea_orm::DbErr> for LinkError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            LinkError::invalid_format("x"),
            LinkError::duplicate_code("x"),
            LinkError::code_generation_exhausted("x"),
            LinkError::quota_exceeded("x"),
            LinkError::invalid_expiry("x"),
            LinkError::not_found("x"),
            LinkError::integrity_conflict("x"),
            LinkError::database_config("x"),
            LinkError::database_connection("x"),
            LinkError::database_operation("x"),
            LinkError::serialization("x"),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = LinkError::quota_exceeded("limit of 5 permanent links reached");
        assert_eq!(
            err.to_string(),
            "Quota Exceeded: limit of 5 permanent links reached"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(LinkError::duplicate_code("taken").is_validation());
        assert!(LinkError::not_found("gone").is_validation());
        assert!(!LinkError::integrity_conflict("busy").is_validation());
        assert!(!LinkError::code_generation_exhausted("3 attempts").is_validation());
    }

    #[test]
    fn test_from_db_err() {
        let err: LinkError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, LinkError::DatabaseOperation(_)));
        assert!(err.message().contains("boom"));
    }
}

/// Coarse classification of a schema decode/normalize failure, mirroring
/// the LDAP result codes the server reports for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// The value does not conform to the grammar of its syntax.
    InvalidAttributeSyntax,
    /// The grammar is fine but a referenced schema element cannot be
    /// resolved against the live schema.
    ConstraintViolation,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{0}")]
    InvalidAttributeSyntax(String),

    #[error("{0}")]
    ConstraintViolation(String),
}

impl SchemaError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            SchemaError::InvalidAttributeSyntax(_) => ResultCode::InvalidAttributeSyntax,
            SchemaError::ConstraintViolation(_) => ResultCode::ConstraintViolation,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SchemaError::InvalidAttributeSyntax(m) => m,
            SchemaError::ConstraintViolation(m) => m,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// Shorthand for the malformed-grammar case.
pub fn syntax_error(msg: impl Into<String>) -> SchemaError {
    SchemaError::InvalidAttributeSyntax(msg.into())
}

/// Shorthand for the unresolved-reference case.
pub fn constraint_error(msg: impl Into<String>) -> SchemaError {
    SchemaError::ConstraintViolation(msg.into())
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl PlanError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        PlanError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn division_by_zero(context: &str) -> Self {
        PlanError::DivisionByZero {
            context: context.to_string(),
        }
    }

    /// Lifts validator output into an error, or `Ok(())` when there is nothing to report.
    pub fn from_validation(errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PlanError::Validation(errors))
        }
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(e: serde_json::Error) -> Self {
        PlanError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for PlanError {
    fn from(e: std::io::Error) -> Self {
        PlanError::Io(e.to_string())
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = PlanError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
    }

    #[test]
    fn from_validation_is_ok_when_empty() {
        assert!(PlanError::from_validation(Vec::new()).is_ok());
        let err = PlanError::from_validation(vec!["bad".to_string()]).expect_err("must fail");
        assert_eq!(err, PlanError::Validation(vec!["bad".to_string()]));
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let parse = serde_json::from_str::<u32>("not json").expect_err("must fail");
        assert!(matches!(PlanError::from(parse), PlanError::Serialization(_)));
    }
}

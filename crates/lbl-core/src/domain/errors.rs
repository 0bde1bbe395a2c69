use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LblResult<T> = Result<T, LblError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LblErrorCategory {
    InputValidationError,
    DataAvailabilityError,
    ComputationError,
    InternalError,
}

impl LblErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::DataAvailabilityError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::DataAvailabilityError => "DataAvailabilityError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LblError {
    category: LblErrorCategory,
    placeholder: &'static str,
    message: String,
    conditions: Option<String>,
}

impl LblError {
    pub fn new(
        category: LblErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
            conditions: None,
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(LblErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn data_availability(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(LblErrorCategory::DataAvailabilityError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(LblErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(LblErrorCategory::InternalError, placeholder, message)
    }

    /// Attaches the condition set of the failing synthesis call. The first
    /// attachment wins so nested stages cannot overwrite the outer record.
    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        if self.conditions.is_none() {
            self.conditions = Some(conditions.into());
        }
        self
    }

    pub const fn category(&self) -> LblErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn conditions(&self) -> Option<&str> {
        self.conditions.as_deref()
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        match &self.conditions {
            Some(conditions) => format!(
                "ERROR: [{}] {} (conditions: {})",
                self.placeholder, self.message, conditions
            ),
            None => format!("ERROR: [{}] {}", self.placeholder, self.message),
        }
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for LblError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )?;
        if let Some(conditions) = &self.conditions {
            write!(f, " (conditions: {conditions})")?;
        }
        Ok(())
    }
}

impl Error for LblError {}

//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_SERVICE_TYPE_LEN: usize = 64;
const MAX_CUSTOMER_NAME_LEN: usize = 128;

/// Validates that a service type tag is non-empty and reasonably sized.
pub fn validate_service_type(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("service_type_empty");
        err.message = Some("serviceType must not be empty".into());
        return Err(err);
    }
    if value.len() > MAX_SERVICE_TYPE_LEN {
        let mut err = ValidationError::new("service_type_length");
        err.message = Some(
            format!("serviceType must be at most {MAX_SERVICE_TYPE_LEN} characters").into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates an optional customer display name.
pub fn validate_customer_name(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_CUSTOMER_NAME_LEN {
        let mut err = ValidationError::new("customer_name_length");
        err.message = Some(
            format!("customerName must be at most {MAX_CUSTOMER_NAME_LEN} characters").into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates that a claimed counter id is a positive integer.
pub fn validate_counter_id(id: u32) -> Result<(), ValidationError> {
    if id == 0 {
        let mut err = ValidationError::new("counter_id_zero");
        err.message = Some("counterId must be a positive integer".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_must_not_be_blank() {
        assert!(validate_service_type("general").is_ok());
        assert!(validate_service_type("").is_err());
        assert!(validate_service_type("   ").is_err());
    }

    #[test]
    fn service_type_length_is_bounded() {
        assert!(validate_service_type(&"x".repeat(64)).is_ok());
        assert!(validate_service_type(&"x".repeat(65)).is_err());
    }

    #[test]
    fn customer_name_length_is_bounded() {
        assert!(validate_customer_name("Ada Lovelace").is_ok());
        assert!(validate_customer_name(&"x".repeat(129)).is_err());
    }

    #[test]
    fn counter_id_must_be_positive() {
        assert!(validate_counter_id(1).is_ok());
        assert!(validate_counter_id(0).is_err());
    }
}

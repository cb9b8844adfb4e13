//! Result type alias for Batchfeed

use super::errors::BatchfeedError;

/// Result type alias for Batchfeed operations
///
/// # Examples
///
/// ```
/// use batchfeed::domain::result::Result;
/// use batchfeed::domain::errors::BatchfeedError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(BatchfeedError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BatchfeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(BatchfeedError::Validation("test error".to_string()));
        assert!(result.is_err());
    }
}

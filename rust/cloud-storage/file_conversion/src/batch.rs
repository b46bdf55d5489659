use crate::{ConversionError, Result};

/// The maximum number of items accepted by one batch
pub const MAX_BATCH_SIZE: usize = 50;

/// The outcome of one batch item
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome<T> {
    Succeeded { output: T },
    Failed { error: String },
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct BatchItemResult<K, T> {
    /// Position of the item in the submitted batch
    pub index: usize,
    pub key: K,
    #[serde(flatten)]
    pub outcome: BatchOutcome<T>,
}

impl<K, T> BatchItemResult<K, T> {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Succeeded { .. })
    }
}

/// Checks the size of a batch before any work starts
pub fn validate_size(len: usize) -> Result<()> {
    if len == 0 {
        return Err(ConversionError::invalid("batch is empty"));
    }
    if len > MAX_BATCH_SIZE {
        return Err(ConversionError::invalid(format!(
            "a batch holds at most {MAX_BATCH_SIZE} items"
        )));
    }
    Ok(())
}

/// Runs `op` over every item in order. A failing item is recorded and the batch carries on.
pub fn run<K, I, T, E, F>(items: Vec<(K, I)>, mut op: F) -> Vec<BatchItemResult<K, T>>
where
    F: FnMut(I) -> std::result::Result<T, E>,
    E: std::fmt::Display,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, (key, item))| {
            let outcome = match op(item) {
                Ok(output) => BatchOutcome::Succeeded { output },
                Err(e) => {
                    tracing::warn!(index, error = %e, "batch item failed");
                    BatchOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            BatchItemResult {
                index,
                key,
                outcome,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_going_after_failures() {
        let results = run(
            vec![("a", 2), ("b", 0), ("c", 5)],
            |divisor: i32| -> Result<i32> {
                if divisor == 0 {
                    return Err(ConversionError::invalid("division by zero"));
                }
                Ok(10 / divisor)
            },
        );

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].outcome,
            BatchOutcome::Succeeded { output: 5 }
        );
        assert!(!results[1].is_success());
        assert_eq!(results[1].key, "b");
        assert_eq!(
            results[1].outcome,
            BatchOutcome::Failed {
                error: "invalid input: division by zero".to_string()
            }
        );
        assert_eq!(results[2].index, 2);
        assert!(results[2].is_success());
    }

    #[test]
    fn serializes_outcomes_flat() {
        let results = run(vec![(7, ())], |_| -> Result<&str> {
            Err(ConversionError::UnsupportedFormat("svg".to_string()))
        });
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index": 0,
                "key": 7,
                "status": "failed",
                "error": "unsupported format: svg"
            })
        );
    }

    #[test]
    fn validates_batch_size() {
        assert!(validate_size(0).is_err());
        assert!(validate_size(1).is_ok());
        assert!(validate_size(MAX_BATCH_SIZE + 1).is_err());
    }
}

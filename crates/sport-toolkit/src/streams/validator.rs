use super::StreamError;

/// Checks that every stream of one response has the declared sample count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSizeValidator {
    expected_size: usize,
}

impl DatasetSizeValidator {
    pub fn new(expected_size: usize) -> Self {
        Self { expected_size }
    }

    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    /// Fails on the first `(name, length)` pair whose length differs
    pub fn validate<'a, I>(&self, streams: I) -> Result<(), StreamError>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        for (name, actual_size) in streams {
            if actual_size != self.expected_size {
                return Err(StreamError::StreamSize {
                    stream_name: name.to_string(),
                    actual_size,
                    expected_size: self.expected_size,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_sizes_pass() {
        let validator = DatasetSizeValidator::new(3);
        assert!(validator
            .validate([("time", 3), ("distance", 3), ("heartrate", 3)])
            .is_ok());
        assert!(validator.validate(std::iter::empty()).is_ok());
    }

    #[test]
    fn test_mismatch_names_stream_and_sizes() {
        let err = DatasetSizeValidator::new(4179)
            .validate([("time", 4179), ("heartrate", 4178), ("altitude", 10)])
            .unwrap_err();
        assert_eq!(
            err,
            StreamError::StreamSize {
                stream_name: "heartrate".to_string(),
                actual_size: 4178,
                expected_size: 4179
            }
        );
        assert!(err.to_string().contains("heartrate"));
        assert!(err.to_string().contains("4178"));
    }
}

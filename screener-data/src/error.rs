use thiserror::Error;

/// All errors generated in `screener-data`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("http request failed: {0}")]
    Http(String),

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("exchange rejected request ({exchange}): code {code}: {message}")]
    Api {
        exchange: &'static str,
        code: String,
        message: String,
    },

    #[error("unknown exchange: {0}")]
    UnknownExchange(String),
}

impl DataError {
    /// Determine if an error is likely to clear on the next polling cycle.
    ///
    /// Transport failures come and go with the network; decode and API
    /// rejections keep failing until the code or configuration changes.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_transient() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: transport failure is transient
                input: DataError::Http("connection reset by peer".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: decode failure is not transient
                input: DataError::Decode("missing field `symbol`".to_string()),
                expected: false,
            },
            TestCase {
                // TC2: API rejection is not transient
                input: DataError::Api {
                    exchange: "okx",
                    code: "50011".to_string(),
                    message: "rate limited".to_string(),
                },
                expected: false,
            },
            TestCase {
                // TC3: unknown exchange is not transient
                input: DataError::UnknownExchange("ftx".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_transient(), test.expected, "TC{} failed", index);
        }
    }
}

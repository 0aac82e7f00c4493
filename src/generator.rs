//! Value generators
//!
//! A [`Generator`] produces the value cached for a key. The cache calls it once
//! per key during the initial load and again on every refresh pass.

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

/// Characters used by [`RandomStringGenerator`] unless overridden
pub const DEFAULT_CHARSET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of values produced by [`RandomStringGenerator`] unless overridden
pub const DEFAULT_LENGTH: usize = 10;

/// Errors a generator may report for a single key
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Generation failed with a message
    #[error("generation failed: {0}")]
    Failed(String),

    /// Generation failed with an underlying error
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Produces the value for a key on demand
#[async_trait]
pub trait Generator: Send + Sync {
    /// Type of value stored in the cache
    type Value: Clone + Send + Sync + 'static;

    /// Generates a fresh value for `key`
    async fn generate(&self, key: &str) -> Result<Self::Value, GenerateError>;
}

/// Generates fixed-length random strings, ignoring the key
#[derive(Debug, Clone)]
pub struct RandomStringGenerator {
    length: usize,
    charset: Vec<char>,
}

impl Default for RandomStringGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            charset: DEFAULT_CHARSET.chars().collect(),
        }
    }
}

impl RandomStringGenerator {
    /// Creates a generator with the default length and charset
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the length of generated values
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Sets the characters values are drawn from
    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = charset.chars().collect();
        self
    }

    /// Length of generated values
    pub fn length(&self) -> usize {
        self.length
    }

    // Kept synchronous so the thread-local RNG never lives inside a future.
    fn random_string(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| self.charset[rng.gen_range(0..self.charset.len())])
            .collect()
    }
}

#[async_trait]
impl Generator for RandomStringGenerator {
    type Value = String;

    async fn generate(&self, _key: &str) -> Result<String, GenerateError> {
        if self.charset.is_empty() {
            return Err(GenerateError::Failed("charset is empty".to_string()));
        }
        Ok(self.random_string())
    }
}

/// Adapts a closure into a [`Generator`]
pub struct FnGenerator<F> {
    f: F,
}

impl<F> FnGenerator<F> {
    /// Wraps `f`, which is called once per key and pass
    pub fn new<V>(f: F) -> Self
    where
        F: Fn(&str) -> Result<V, GenerateError>,
    {
        Self { f }
    }
}

#[async_trait]
impl<F, V> Generator for FnGenerator<F>
where
    F: Fn(&str) -> Result<V, GenerateError> + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    async fn generate(&self, key: &str) -> Result<V, GenerateError> {
        (self.f)(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_string_has_default_length() {
        let generator = RandomStringGenerator::new();
        let value = generator.generate("apple").await.unwrap();
        assert_eq!(value.len(), DEFAULT_LENGTH);
    }

    #[tokio::test]
    async fn test_random_string_uses_only_charset() {
        let generator = RandomStringGenerator::new().with_length(64).with_charset("xy");
        let value = generator.generate("apple").await.unwrap();
        assert_eq!(value.len(), 64);
        assert!(value.chars().all(|c| c == 'x' || c == 'y'));
    }

    #[tokio::test]
    async fn test_default_charset_is_alphanumeric() {
        let generator = RandomStringGenerator::new().with_length(256);
        let value = generator.generate("k").await.unwrap();
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_empty_charset_fails() {
        let generator = RandomStringGenerator::new().with_charset("");
        let err = generator.generate("apple").await.unwrap_err();
        assert!(err.to_string().contains("charset is empty"));
    }

    #[tokio::test]
    async fn test_zero_length_yields_empty_string() {
        let generator = RandomStringGenerator::new().with_length(0);
        assert_eq!(generator.generate("apple").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_fn_generator_passes_key() {
        let generator = FnGenerator::new(|key: &str| Ok(key.to_uppercase()));
        assert_eq!(generator.generate("abc").await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn test_fn_generator_propagates_error() {
        let generator =
            FnGenerator::new(|_: &str| Err::<String, _>(GenerateError::Failed("down".into())));
        let err = generator.generate("abc").await.unwrap_err();
        assert_eq!(err.to_string(), "generation failed: down");
    }
}

use crate::algorithms::{self, AlgorithmFactory};
use crate::error::ConfigError;
use crate::secret::{read_key_file, ExposeSecret};
use crate::verifier::KeyEntry;
use std::path::Path;

/// Verifies every token against one configured key.
#[derive(Debug)]
pub struct StaticKeyVerifier {
    entry: KeyEntry,
}

impl StaticKeyVerifier {
    /// Resolve `algorithm`, read `key_file` and bind the two together.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownAlgorithm` if the name is not in the registry,
    /// `ConfigError::Read` if the file cannot be read, `ConfigError::InvalidKey`
    /// if the algorithm rejects its contents.
    pub fn initialize(algorithm: &str, key_file: &Path) -> Result<Self, ConfigError> {
        let algorithm = algorithms::lookup(algorithm)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(algorithm.to_string()))?;
        let key = read_key_file("key", key_file)?;
        let verifier = Self::build(algorithm, key.expose_secret(), key_file.display().to_string())?;

        tracing::info!(
            target: "bearer_auth.keys",
            algorithm = algorithm.name(),
            key_file = %key_file.display(),
            "Loaded static verification key"
        );
        Ok(verifier)
    }

    /// Bind in-memory key material to `algorithm`.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidKey` if the algorithm rejects the key.
    pub fn from_key(algorithm: &'static AlgorithmFactory, key: &[u8]) -> Result<Self, ConfigError> {
        Self::build(algorithm, key, format!("@{}", algorithm.name()))
    }

    fn build(
        algorithm: &'static AlgorithmFactory,
        key: &[u8],
        origin: String,
    ) -> Result<Self, ConfigError> {
        let entry = algorithm.create(key, None).map_err(|e| {
            tracing::error!(
                target: "bearer_auth.keys",
                algorithm = algorithm.name(),
                origin = %origin,
                error = %e,
                "Static key rejected"
            );
            ConfigError::InvalidKey {
                origin,
                reason: e.to_string(),
            }
        })?;
        Ok(Self { entry })
    }

    pub(crate) fn entry(&self) -> &KeyEntry {
        &self.entry
    }

    #[must_use]
    pub fn algorithm(&self) -> &'static AlgorithmFactory {
        self.entry.algorithm()
    }
}

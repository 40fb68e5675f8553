//! Startup configuration read from the environment.

use std::time::Duration;

use docqa_rag::config::{DEFAULT_GENERATION_MODEL, OPENROUTER_API_BASE};
use docqa_rag::semantic::DEFAULT_FASTEMBED_MODEL;
use docqa_rag::{
    EmbeddingBackend, GenerationBackend, HashingEmbeddingProvider, Orchestrator, RagConfig,
    RagError, Result,
};
use tracing::info;

/// Environment variable holding the generator API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rag: RagConfig,
    pub embedding: EmbeddingBackend,
    pub generation: GenerationBackend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            rag: RagConfig::default(),
            embedding: EmbeddingBackend::FastEmbed { model: DEFAULT_FASTEMBED_MODEL.to_string() },
            generation: GenerationBackend::default(),
        }
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read the `DOCQA_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] when a variable cannot be parsed or
    /// the resulting [`RagConfig`] is invalid.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let rag_defaults = RagConfig::default();

        let host = lookup("DOCQA_HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "DOCQA_PORT")?.unwrap_or(defaults.port);

        let rag = RagConfig::builder()
            .chunk_size(parse_var(&lookup, "DOCQA_CHUNK_SIZE")?.unwrap_or(rag_defaults.chunk_size))
            .chunk_overlap(
                parse_var(&lookup, "DOCQA_CHUNK_OVERLAP")?.unwrap_or(rag_defaults.chunk_overlap),
            )
            .top_k(parse_var(&lookup, "DOCQA_TOP_K")?.unwrap_or(rag_defaults.top_k))
            .build()?;

        let embedding = match lookup("DOCQA_EMBEDDING").as_deref().map(str::trim) {
            None | Some("") | Some("fastembed") => EmbeddingBackend::FastEmbed {
                model: lookup("DOCQA_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_FASTEMBED_MODEL.to_string()),
            },
            Some("hashing") => EmbeddingBackend::Hashing {
                dimensions: HashingEmbeddingProvider::DEFAULT_DIMENSIONS,
            },
            Some("openai") => EmbeddingBackend::OpenAI {
                base_url: lookup("DOCQA_EMBEDDING_BASE_URL")
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model: lookup("DOCQA_EMBEDDING_MODEL")
                    .unwrap_or_else(|| "text-embedding-3-small".to_string()),
                dimensions: parse_var(&lookup, "DOCQA_EMBEDDING_DIMENSIONS")?.unwrap_or(1536),
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_secs: whole_secs(rag.embedding_timeout()),
            },
            Some(other) => {
                return Err(RagError::Configuration(format!(
                    "DOCQA_EMBEDDING must be 'fastembed', 'hashing' or 'openai', got '{other}'"
                )));
            }
        };

        let generation = GenerationBackend::OpenAICompatible {
            base_url: lookup("DOCQA_GENERATOR_BASE_URL")
                .unwrap_or_else(|| OPENROUTER_API_BASE.to_string()),
            model: lookup("DOCQA_GENERATOR_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            api_key_env: API_KEY_ENV.to_string(),
            timeout_secs: whole_secs(rag.generation_timeout()),
        };

        Ok(Self { host, port, rag, embedding, generation })
    }

    /// Instantiate the backends and assemble the shared [`Orchestrator`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a backend credential is missing.
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        // Resolve credentials before loading any local model.
        let generator = self.generation.build()?;
        let embedder = self.embedding.build()?;
        info!(
            embedding = embedder.name(),
            generator = generator.name(),
            chunk_size = self.rag.chunk_size,
            top_k = self.rag.top_k,
            "configured pipeline"
        );
        Orchestrator::builder()
            .config(self.rag.clone())
            .embedding_provider(embedder)
            .generator(generator)
            .build()
    }
}

/// Per-request HTTP timeout covering `timeout`, rounded up to whole seconds.
fn whole_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            RagError::Configuration(format!("{name} has an invalid value: '{raw}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.rag, RagConfig::default());
        assert_eq!(
            config.embedding,
            EmbeddingBackend::FastEmbed { model: "all-MiniLM-L6-v2".to_string() }
        );
        assert_eq!(config.generation, GenerationBackend::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DOCQA_PORT", "9100"),
            ("DOCQA_CHUNK_SIZE", "800"),
            ("DOCQA_CHUNK_OVERLAP", "80"),
            ("DOCQA_TOP_K", "6"),
            ("DOCQA_GENERATOR_MODEL", "meta-llama/llama-3-8b-instruct"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.rag.chunk_size, 800);
        assert_eq!(config.rag.chunk_overlap, 80);
        assert_eq!(config.rag.top_k, 6);
        let GenerationBackend::OpenAICompatible { model, .. } = &config.generation;
        assert_eq!(model, "meta-llama/llama-3-8b-instruct");
    }

    #[test]
    fn hashing_embedder_can_be_selected_for_offline_runs() {
        let config = ServerConfig::from_lookup(lookup(&[("DOCQA_EMBEDDING", "hashing")])).unwrap();
        assert_eq!(config.embedding, EmbeddingBackend::Hashing { dimensions: 384 });

        let config = ServerConfig::from_lookup(lookup(&[
            ("DOCQA_EMBEDDING", "fastembed"),
            ("DOCQA_EMBEDDING_MODEL", "bge-small-en-v1.5"),
        ]))
        .unwrap();
        assert_eq!(
            config.embedding,
            EmbeddingBackend::FastEmbed { model: "bge-small-en-v1.5".to_string() }
        );
    }

    #[test]
    fn request_timeouts_round_up_to_whole_seconds() {
        assert_eq!(whole_secs(Duration::from_millis(1500)), 2);
        assert_eq!(whole_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn unparsable_and_invalid_values_are_configuration_errors() {
        let err = ServerConfig::from_lookup(lookup(&[("DOCQA_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));

        let err = ServerConfig::from_lookup(lookup(&[("DOCQA_CHUNK_OVERLAP", "600")])).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));

        let err = ServerConfig::from_lookup(lookup(&[("DOCQA_EMBEDDING", "bert")])).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn missing_api_key_fails_at_startup() {
        let config = ServerConfig {
            generation: GenerationBackend::OpenAICompatible {
                base_url: OPENROUTER_API_BASE.to_string(),
                model: DEFAULT_GENERATION_MODEL.to_string(),
                api_key_env: "DOCQA_SERVER_TEST_KEY_NEVER_SET".to_string(),
                timeout_secs: 60,
            },
            embedding: EmbeddingBackend::Hashing { dimensions: 384 },
            ..ServerConfig::default()
        };
        let err = config.build_orchestrator().err().unwrap();
        assert_eq!(err.kind(), docqa_rag::ErrorKind::Configuration);
        assert!(err.to_string().contains("DOCQA_SERVER_TEST_KEY_NEVER_SET"));
    }
}

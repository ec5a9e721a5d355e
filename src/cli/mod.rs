use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    /// Serve over HTTPS using the configured certificate and key.
    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- Store Args ---
    /// Application store type (memory, redis)
    #[arg(long, env = "STORE_TYPE", default_value = "memory")]
    pub store_type: String,

    /// Redis endpoint for the redis store backend (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "STORE_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub store_redis_url: String,

    /// Prefix for redis store keys.
    #[arg(long, env = "STORE_REDIS_PREFIX", default_value = "stylist:")]
    pub store_redis_prefix: String,

    /// Path to the product catalog seed file, loaded when the catalog is empty.
    #[arg(long, env = "SEED_PRODUCTS_PATH", default_value = "json/seed_products.json")]
    pub seed_products_path: String,

    /// Path to the keyword lexicon override file. Built-in tables are used when absent.
    #[arg(long, env = "LEXICON_PATH", default_value = "json/lexicon.json")]
    pub lexicon_path: String,

    // --- Shopping Search Args ---
    /// API key for the external shopping search service. Empty disables external
    /// search; the internal catalog serves every query instead.
    #[arg(long, env = "SHOPPING_API_KEY", default_value = "")]
    pub shopping_api_key: String,

    /// Endpoint of the shopping search service.
    #[arg(long, env = "SHOPPING_ENDPOINT", default_value = "https://serpapi.com/search.json")]
    pub shopping_endpoint: String,

    /// Search engine identifier passed to the shopping search service.
    #[arg(long, env = "SHOPPING_ENGINE", default_value = "google_shopping_light")]
    pub shopping_engine: String,

    /// Maximum candidates kept per search.
    #[arg(long, env = "SEARCH_LIMIT", default_value = "10")]
    pub search_limit: usize,

    /// Per-call timeout for external search requests, in seconds.
    #[arg(long, env = "SEARCH_TIMEOUT_SECS", default_value = "10")]
    pub search_timeout_secs: u64,

    /// Bounded worker count for resolving multiple product requests in one turn.
    #[arg(long, env = "SEARCH_CONCURRENCY", default_value = "3")]
    pub search_concurrency: usize,

    // --- Extraction LLM Provider Args ---
    /// Type of LLM provider for query extraction (gemini, openai, ollama)
    #[arg(long, env = "EXTRACT_LLM_TYPE", default_value = "gemini")]
    pub extract_llm_type: String,

    /// Base URL for the extraction LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "EXTRACT_BASE_URL")] // No default, let adapters handle defaults if None
    pub extract_base_url: Option<String>,

    /// API Key for the extraction LLM provider. Empty disables language-model
    /// extraction; keyword parsing still runs.
    #[arg(long, env = "EXTRACT_API_KEY", default_value = "")]
    pub extract_api_key: String,

    /// Model name for query extraction (e.g., gemini-2.0-flash-exp, gpt-4o-mini)
    #[arg(long, env = "EXTRACT_MODEL")] // No default, rely on adapter defaults if None
    pub extract_model: Option<String>,

    // --- Try-On Args ---
    /// Endpoint of the image-generation service. Unset disables composite
    /// generation; turns still return items and text.
    #[arg(long, env = "TRYON_ENDPOINT")]
    pub tryon_endpoint: Option<String>,

    /// Optional bearer token for the image-generation service.
    #[arg(long, env = "TRYON_API_KEY", default_value = "")]
    pub tryon_api_key: String,

    /// Per-call timeout for image-generation requests, in seconds.
    #[arg(long, env = "TRYON_TIMEOUT_SECS", default_value = "60")]
    pub tryon_timeout_secs: u64,
}

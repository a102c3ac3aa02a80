use deadpool_postgres::Pool;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use crate::config::Config;
use crate::crypto::vault::Vault;
use crate::genai::GenAiClient;
use crate::platform::bridge::BridgeClient;
use crate::platform::client::PublishClient;
use crate::error::Result;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: Pool,
    /// The Redis connection manager.
    pub redis: ConnectionManager,
    /// The application's configuration.
    pub config: Config,
    /// The credential vault.
    pub vault: Vault,
    /// The generative content API client.
    pub genai: Arc<GenAiClient>,
    /// The publishing platform client.
    pub platform: Arc<dyn PublishClient>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        let vault = Vault::new(&config.master_key)?;
        tracing::info!("✅ Credential vault initialized");

        let genai = Arc::new(GenAiClient::new(
            &config.genai_base_url,
            &config.genai_api_key,
            &config.genai_model,
        ));
        tracing::info!("✅ Generative API client initialized (model {})", config.genai_model);

        let platform: Arc<dyn PublishClient> =
            Arc::new(BridgeClient::new(&config.bridge_base_url));
        tracing::info!("✅ Platform bridge client initialized ({})", config.bridge_base_url);

        Ok(AppState {
            db,
            redis,
            config: config.clone(),
            vault,
            genai,
            platform,
        })
    }
}

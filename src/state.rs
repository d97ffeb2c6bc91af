use std::sync::Arc;

use crate::config::Config;
use crate::crypto::token::TokenService;
use crate::error::{AppError, Result};
use crate::repositories::{
    course::PgCourseRepository, entity::PgEntityRepository, CourseRepository, EntityRepository,
};
use crate::upload::UploadSpec;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The identity directory.
    pub entities: Arc<dyn EntityRepository>,
    /// The course store.
    pub courses: Arc<dyn CourseRepository>,
    /// Issues and verifies session tokens.
    pub tokens: TokenService,
    /// The application's configuration.
    pub config: Config,
    /// Upload settings for profile images.
    pub profile_uploads: UploadSpec,
    /// Upload settings for course images.
    pub course_uploads: UploadSpec,
}

impl AppState {
    /// Creates a new `AppState` over the given storage adapters.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    /// * `entities` - The identity directory adapter.
    /// * `courses` - The course store adapter.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(
        config: Config,
        entities: Arc<dyn EntityRepository>,
        courses: Arc<dyn CourseRepository>,
    ) -> Result<Self> {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_hours)
            .map_err(|e| AppError::Crypto(e.to_string()))?;

        Ok(AppState {
            entities,
            courses,
            tokens,
            profile_uploads: UploadSpec::profile_image(&config),
            course_uploads: UploadSpec::course_image(&config),
            config,
        })
    }

    /// Connects to PostgreSQL, bootstraps the schema and builds the state.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        crate::db::ensure_schema(&pool).await?;
        tracing::info!("✅ Database schema ready");

        Self::new(
            config.clone(),
            Arc::new(PgEntityRepository::new(pool.clone())),
            Arc::new(PgCourseRepository::new(pool)),
        )
    }
}

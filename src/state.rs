use std::convert::Infallible;
use std::sync::Arc;

use warp::Filter;

use crate::config::Config;
use crate::db::{self, Database};
use crate::error::AppError;
use crate::presence::Hub;
use crate::uploads::Uploads;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub hub: Hub,
    pub uploads: Uploads,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let pool = db::connect(&config.database_url).await?;
        Ok(Self::with_database(config, Database::new(pool)))
    }

    pub fn with_database(config: Config, db: Database) -> Self {
        let uploads = Uploads::new(config.uploads_dir.clone(), config.max_upload_bytes);
        Self {
            config: Arc::new(config),
            db,
            hub: Hub::new(),
            uploads,
        }
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

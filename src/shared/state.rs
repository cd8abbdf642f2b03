use crate::config::AppConfig;
use crate::shared::utils::DbPool;
use reqwest::Client as HttpClient;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub http: HttpClient,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            http: self.http.clone(),
        }
    }
}

use std::sync::Arc;

use crate::auth::repo::{MemoryUserRepo, PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::db;
use crate::notes::repo::{MemoryNoteRepo, NoteRepo, PgNoteRepo};
use crate::summarizer::Summarizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub notes: Arc<dyn NoteRepo>,
    pub summarizer: Summarizer,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let summarizer = Summarizer::from_config(&config.summarizer)?;

        let (users, notes) = match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                (
                    Arc::new(PgUserRepo::new(pool.clone())) as Arc<dyn UserRepo>,
                    Arc::new(PgNoteRepo::new(pool)) as Arc<dyn NoteRepo>,
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
                (
                    Arc::new(MemoryUserRepo::new()) as Arc<dyn UserRepo>,
                    Arc::new(MemoryNoteRepo::new()) as Arc<dyn NoteRepo>,
                )
            }
        };

        Ok(Self::from_parts(config, users, notes, summarizer))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        notes: Arc<dyn NoteRepo>,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            config,
            users,
            notes,
            summarizer,
        }
    }

    /// In-memory stores, test signing key, no network summarizer.
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryUserRepo::new()),
            Arc::new(MemoryNoteRepo::new()),
            Summarizer::fallback_only(),
        )
    }
}

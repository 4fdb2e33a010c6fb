use crate::core::{Session, SessionStore, Storage};
use crate::utils::error::Result;

/// Well-known key the session is stored under.
pub const STORAGE_KEY: &str = "flb-input-filter";

/// Session persisted as `{ "input": ..., "filter": ... }` through a [`Storage`].
#[derive(Debug, Clone)]
pub struct FileSessionStore<S: Storage> {
    storage: S,
}

impl<S: Storage> FileSessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn file_name() -> String {
        format!("{}.json", STORAGE_KEY)
    }
}

impl<S: Storage> SessionStore for FileSessionStore<S> {
    async fn load(&self) -> Result<Option<Session>> {
        let Some(data) = self.storage.read_file(&Self::file_name()).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<Session>(&data) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Ignoring corrupt saved session: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_vec(session)?;
        self.storage.write_file(&Self::file_name(), &data).await
    }

    async fn clear(&self) -> Result<()> {
        self.storage.remove_file(&Self::file_name()).await
    }
}

/// 啟動時還原上次的 session，沒有或讀取失敗時使用內建範例
pub async fn restore_session<T: SessionStore>(store: &T) -> Session {
    match store.load().await {
        Ok(Some(session)) => {
            tracing::info!("📂 Restored saved session");
            session
        }
        Ok(None) => Session::sample(),
        Err(e) => {
            tracing::warn!("Could not read saved session, using sample: {}", e);
            Session::sample()
        }
    }
}

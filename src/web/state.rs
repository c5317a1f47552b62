use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{client::ApiClient, config::AppConfig, session::{CredentialStore, SessionStore}};

/// Shared state handed to every handler: the configuration, the session
/// store, and the set of summary ids with a resend currently in flight.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    session: SessionStore,
    resend_inflight: Arc<Mutex<HashSet<i64>>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let credentials = CredentialStore::open(config.credential_path.clone());
        let session = SessionStore::new(&config.api_base_url, credentials);

        Self {
            config: Arc::new(config),
            session,
            resend_inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        self.session.api()
    }

    /// Claims the resend slot for a summary. Returns false while an earlier
    /// resend for the same summary has not finished.
    pub fn begin_resend(&self, summary_id: i64) -> bool {
        self.resend_inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(summary_id)
    }

    pub fn finish_resend(&self, summary_id: i64) {
        self.resend_inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&summary_id);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn test_state() -> AppState {
        AppState::new(AppConfig {
            api_base_url: "http://127.0.0.1:1".to_string(),
            port: 0,
            credential_path: PathBuf::from("/nonexistent/credential/token"),
        })
    }

    #[test]
    fn resend_guard_admits_one_flight_per_summary() {
        let state = test_state();

        assert!(state.begin_resend(7));
        assert!(!state.begin_resend(7));
        assert!(state.begin_resend(8));

        state.finish_resend(7);
        assert!(state.begin_resend(7));
    }
}

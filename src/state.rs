use crate::{config::Config, forum::Forum};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub forum: Forum,
    pub config: Config,
}

impl FromRef<AppState> for Forum {
    fn from_ref(state: &AppState) -> Self {
        state.forum.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

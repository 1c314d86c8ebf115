use crate::engine::Engine;
use crate::feed::FeedSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub feeds: FeedSet,
}

impl AppState {
    pub fn new(engine: Engine, feeds: FeedSet) -> Self {
        Self {
            engine: Arc::new(engine),
            feeds,
        }
    }
}

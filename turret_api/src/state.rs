//! Shared handler state: the control-plane handles the HTTP surface
//! drives and reads from.

use std::sync::Arc;

use turret_control::perception::PerceptionLoop;
use turret_control::{AimCoordinator, InterlockManager};
use turret_journal::EventJournal;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub aim: Arc<AimCoordinator>,
    pub interlock: Arc<InterlockManager>,
    pub journal: Arc<EventJournal>,
    pub perception: Arc<PerceptionLoop>,
    pub index_html: Arc<str>,
}

impl AppState {
    pub fn new(
        aim: Arc<AimCoordinator>,
        interlock: Arc<InterlockManager>,
        journal: Arc<EventJournal>,
        perception: Arc<PerceptionLoop>,
    ) -> Self {
        Self {
            aim,
            interlock,
            journal,
            perception,
            index_html: Arc::from(INDEX_HTML),
        }
    }
}

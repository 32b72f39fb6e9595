use std::sync::Arc;

use hustleflow_board::narrative::MatchNarrator;
use hustleflow_board::Repository;
use hustleflow_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub repo: Repository<Database>,
    /// Advisory narrator; `None` disables the post-create narrative.
    pub narrator: Option<Arc<dyn MatchNarrator>>,
}

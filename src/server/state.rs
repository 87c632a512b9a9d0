use std::sync::Arc;

use crate::editor::Editor;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) editor: Arc<Editor>,
}

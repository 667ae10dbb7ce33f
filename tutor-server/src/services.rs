use std::sync::Arc;
use tutor_core::{ChatCompletion, TutorConfig, TutorStore};

use crate::context::ContextProvider;
use crate::exercises::StatementSource;
use crate::subsystems::notifier::Notifier;

/// Collaborators shared by request handlers and background tasks.
///
/// Cloning is cheap; every spawned task gets its own clone.
#[derive(Clone)]
pub struct TutorServices {
    pub store: Arc<dyn TutorStore>,
    pub llm: Arc<dyn ChatCompletion>,
    pub statements: Arc<dyn StatementSource>,
    pub context: Arc<dyn ContextProvider>,
    pub notifier: Notifier,
    pub config: Arc<TutorConfig>,
}

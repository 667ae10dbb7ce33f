pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod llm;
pub mod models;
pub mod store;

pub use config::TutorConfig;
pub use error::TutorError;
pub use events::{EventKind, StatusEvent};
pub use llm::{
    complete_bounded, ChatClientConfig, ChatCompletion, ChatMessage, LlmError, OpenAiChatClient,
    Role,
};
pub use models::{
    ChatEntry, Color, Dimension, GradedAnswer, Intent, Interaction, NewAnswer, NewChatEntry,
    NewInteraction, ReviewStatus, StudentStatus, TeacherAction,
};
pub use store::{
    AnswerStore, ChatStore, InteractionStore, MemoryStore, PgStore, StoreError, TutorStore,
};

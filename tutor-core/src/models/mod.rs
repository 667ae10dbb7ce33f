pub mod answer;
pub mod chat;
pub mod interaction;

pub use answer::{GradedAnswer, NewAnswer, ReviewStatus, TeacherAction};
pub use chat::{ChatEntry, NewChatEntry};
pub use interaction::{Color, Dimension, Intent, Interaction, NewInteraction, StudentStatus};

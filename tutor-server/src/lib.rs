pub mod context;
pub mod exercises;
pub mod http;
pub mod services;
pub mod subsystems;

#[cfg(test)]
pub(crate) mod test_support;

pub use services::TutorServices;

pub mod classifier;
pub mod grading;
pub mod model_output;
pub mod notifier;
pub mod pipeline;
pub mod recorder;
pub mod review;
pub mod semaphore;
pub mod tutor;

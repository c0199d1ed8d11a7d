pub mod openai;
pub mod scrub;

pub use openai::ChatCompletionClient;
pub use scrub::{sanitize_api_error, scrub_secret_patterns};

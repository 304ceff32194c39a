pub mod error;
pub mod gemini;
pub mod generate;
pub mod narration;
pub mod retry;
pub mod session;

pub use error::{GenError, GenResult};
pub use gemini::GeminiClient;
pub use generate::RecipeGenerator;
pub use session::RecipeSession;

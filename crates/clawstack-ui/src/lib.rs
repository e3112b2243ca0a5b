mod progress;
mod prompt;
mod summary;

pub use progress::{emit, fail, ok, spinner, step, warn};
pub use prompt::{Prompter, TermPrompter};
pub use summary::{print_summary, render_summary};

use crate::commands::{ExecRequest, Host};
use clawstack_core::AppError;
use clawstack_ui::{self as ui, Prompter};
use console::style;

/// A step that hands the terminal to a human (browser sign-in).
///
/// The only completion signal is the child process exiting, so the step
/// announces what the operator must do before it blocks.
pub struct HumanStep<'a> {
    pub title: &'a str,
    pub announcement: &'a [&'a str],
    /// Ask before starting; a "no" aborts the run.
    pub confirm: Option<&'a str>,
    pub request: ExecRequest,
}

impl HumanStep<'_> {
    pub async fn run(self, host: &dyn Host, prompter: &dyn Prompter) -> Result<(), AppError> {
        ui::emit(&format!("\n  {}", style(self.title).cyan().bold()));
        for line in self.announcement {
            ui::emit(&format!("  {line}"));
        }

        if let Some(question) = self.confirm {
            if !prompter.confirm(question, true)? {
                return Err(AppError::provision(
                    self.title,
                    "operator declined the interactive step",
                ));
            }
        }

        ui::emit(&format!(
            "  {}",
            style("Waiting for the interactive step to finish...").dim()
        ));
        let req = self.request.interactive();
        let out = host.exec(&req).await?;
        if !out.success() {
            return Err(AppError::Command {
                command: req.script,
                code: out.code,
                output: "(interactive; see the output above)".into(),
            });
        }
        Ok(())
    }
}

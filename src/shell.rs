use std::io::{self, Write};

use crate::builtins::{self, BuiltinAction};
use crate::config::Config;
use crate::editor::LineEditor;
use crate::executor;
use crate::history::History;
use crate::jobs::JobTable;
use crate::parser::parse_line;

/// Everything the read-eval loop owns for one session.
pub struct Shell {
    config: Config,
    jobs: JobTable,
    history: History,
    editor: LineEditor,
    last_status: i32,
}

impl Shell {
    pub fn new(config: Config, history: History) -> Self {
        Self {
            config,
            jobs: JobTable::new(),
            history,
            editor: LineEditor::new(),
            last_status: 0,
        }
    }

    /// Read and run lines until `exit` or end of input. Returns the process
    /// exit status.
    pub fn run(&mut self) -> i32 {
        let code = loop {
            self.jobs.sync_with_reaper();

            let line = match self.editor.read_line(&self.config.prompt, &self.history) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    println!("\nGoodbye!");
                    break self.last_status;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    eprintln!("forksh: error reading input: {e}");
                    break self.last_status;
                }
            };

            self.history.add(&line);
            match self.eval(&line, &mut io::stdout(), &mut io::stderr()) {
                BuiltinAction::Continue(status) => self.last_status = status,
                BuiltinAction::Exit(status) => break status,
            }
        };

        self.shutdown();
        code
    }

    /// Run one input line. Built-ins only apply to single-stage lines;
    /// anything else goes to the pipeline executor.
    pub fn eval(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> BuiltinAction {
        let Some(pipeline) = parse_line(line) else {
            return BuiltinAction::Continue(self.last_status);
        };

        let simple = pipeline.as_simple().and_then(|words| words.split_first());
        if let Some((program, args)) = simple {
            if builtins::is_builtin(program) {
                tracing::debug!(program = %program, "running builtin");
                let (jobs, history) = (&mut self.jobs, &self.history);
                return builtins::execute(program, args, stdout, stderr, jobs, history);
            }
        }

        match executor::run_pipeline(&pipeline, &mut self.jobs, stdout, stderr) {
            Ok(status) => BuiltinAction::Continue(status),
            Err(e) => {
                let _ = writeln!(stderr, "forksh: {e}");
                BuiltinAction::Continue(e.exit_code())
            }
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.history.flush() {
            tracing::warn!("cannot write history: {e}");
        }
        let _ = io::stdout().flush();
    }
}

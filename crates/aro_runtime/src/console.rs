//! Process console.

use aro_engine::services::Console;

/// Writes lines to the process's standard output and error.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn print(&self, line: &str) {
        println!("{line}");
    }

    fn eprint(&self, line: &str) {
        eprintln!("{line}");
    }
}

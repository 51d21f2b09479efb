use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Instant;

use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::menu::MenuState;
use super::session::GameSession;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut session = app.session;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    info!(entity_count = session.world().len(), "console_ready");
    match drive(&mut session, stdin.lock(), &mut stdout) {
        Ok(()) => {
            info!("shutdown");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "console_io_failed");
            ExitCode::FAILURE
        }
    }
}

/// Reads commands until EOF or a quit request. Wall time between lines
/// drives the session clock.
fn drive(
    session: &mut GameSession,
    mut input: impl BufRead,
    output: &mut impl Write,
) -> io::Result<()> {
    writeln!(output, "type 'help' for commands")?;
    let mut last_tick = Instant::now();
    let mut line = String::new();
    loop {
        write!(output, "{}", prompt(session.menu()))?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let now = Instant::now();
        session.tick(now.duration_since(last_tick).as_secs_f32());
        last_tick = now;

        for printed in session.handle_line(&line) {
            writeln!(output, "{printed}")?;
        }
        if let Some(message) = session.world().message() {
            writeln!(output, "  >> {}", message.text)?;
        }
        if session.quit_requested() {
            return Ok(());
        }
    }
}

fn prompt(menu: MenuState) -> String {
    if menu.is_open() {
        format!("[menu: {}] > ", menu.label())
    } else {
        "> ".to_string()
    }
}

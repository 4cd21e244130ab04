//! Interactive terminal loop.
//!
//! The presentation layer only reads session state and calls session
//! operations. Input comes from a blocking rustyline thread; output is driven
//! by the session's change notifications.

use chrono::Local;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    error::ClientError,
    formatter::MessageFormatter,
    session::{ConnectionStatus, SessionController},
    ui::{Command, prompt, redisplay_prompt},
};

/// Whether the loop should keep going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply one parsed command to the session.
pub fn handle_command(session: &SessionController, command: Command) -> Flow {
    match command {
        Command::Send(text) => {
            if !session.status().is_connected() {
                println!("Not connected, message dropped. Use /connect to reconnect.");
            }
            session.send_message(&text);
        }
        Command::Room(room) => session.join_room(room),
        Command::Name(name) => session.set_identity(name),
        Command::Connect => session.connect(),
        Command::Disconnect => session.disconnect_socket(),
        Command::Help => print!("{}", MessageFormatter::format_help()),
        Command::Quit => return Flow::Quit,
        Command::Invalid(line) => {
            println!("Unknown command: {}", line);
            print!("{}", MessageFormatter::format_help());
        }
    }
    Flow::Continue
}

/// Turns session changes into terminal output.
///
/// Notifications may be coalesced, so every render compares against what was
/// already shown instead of trusting the latest change kind.
pub struct Renderer {
    shown_messages: usize,
    shown_status: ConnectionStatus,
    shown_room: String,
    shown_identity: String,
}

impl Renderer {
    /// Start after the history that is already on screen.
    pub fn new(session: &SessionController) -> Self {
        Self {
            shown_messages: session.message_count(),
            shown_status: session.status(),
            shown_room: session.room(),
            shown_identity: session.identity(),
        }
    }

    /// Output for everything that changed since the last render.
    pub fn render(&mut self, session: &SessionController) -> String {
        let mut output = String::new();

        let status = session.status();
        if status != self.shown_status {
            output.push_str(&MessageFormatter::format_status(status));
            self.shown_status = status;
        }

        let room = session.room();
        let identity = session.identity();
        if room != self.shown_room || identity != self.shown_identity {
            output.push_str(&MessageFormatter::format_room_header(&room, &identity));
            self.shown_room = room;
            self.shown_identity = identity;
        }

        let messages = session.messages();
        if messages.len() > self.shown_messages {
            for message in &messages[self.shown_messages..] {
                output.push_str(&MessageFormatter::format_message(message));
                output.push('\n');
            }
            self.shown_messages = messages.len();
        }

        output
    }
}

/// Spawn the blocking line editor. Lines arrive on the returned channel, which
/// closes on Ctrl+C, Ctrl+D or an editor error.
async fn spawn_line_reader(
    prompt_rx: watch::Receiver<String>,
) -> Result<mpsc::UnboundedReceiver<String>, ClientError> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => {
                let _ = ready_tx.send(Ok(()));
                rl
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
        };

        loop {
            let prompt = prompt_rx.borrow().clone();
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str()).ok();
                    }
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    match ready_rx.await {
        Ok(Ok(())) => Ok(input_rx),
        Ok(Err(e)) => Err(ClientError::Input(e)),
        Err(_) => Err(ClientError::Input("line editor thread exited".to_string())),
    }
}

/// Run the interactive client until the user quits.
///
/// Connects on start and always disconnects before returning.
pub async fn run_client(session: SessionController) -> Result<(), ClientError> {
    print!(
        "{}",
        MessageFormatter::format_room_header(&session.room(), &session.identity())
    );
    print!(
        "{}",
        MessageFormatter::format_history(&session.messages(), &Local)
    );
    print!("{}", MessageFormatter::format_help());

    let (prompt_tx, prompt_rx) = watch::channel(prompt(&session.identity(), &session.room()));
    let mut input_rx = spawn_line_reader(prompt_rx).await?;

    let mut changes = session.subscribe();
    let mut renderer = Renderer::new(&session);

    session.connect();

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if handle_command(&session, command) == Flow::Quit {
                    break;
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                changes.borrow_and_update();
                let output = renderer.render(&session);
                prompt_tx.send_replace(prompt(&session.identity(), &session.room()));
                if !output.is_empty() {
                    print!("{}", output);
                    redisplay_prompt(&session.identity(), &session.room());
                }
            }
        }
    }

    session.disconnect_socket();
    tracing::info!("Client session ended");
    Ok(())
}

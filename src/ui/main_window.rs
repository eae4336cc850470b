use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::api::client::ApiClient;
use crate::api::events::SocketEvent;
use crate::api::models::{ConversationId, ProjectId, UserId};
use crate::api::socket::SocketClient;
use crate::app::Settings;
use crate::chat::ConversationBridge;
use crate::error::Result;

const HELP: &str = "\
/list                      show conversations
/open <n|id>               open a conversation by list number or id
/close                     close the open conversation
/dm <user-id>              start (or reopen) a direct conversation
/group <title> <id,id,..>  create a group conversation
/project <project-id>      open the conversation attached to a project
/retry                     resend messages that failed
/discard                   drop messages that failed
/reconnect                 reconnect the real-time link
/quit                      leave
anything else is sent to the open conversation";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    List,
    Open(String),
    Close,
    Direct(UserId),
    Group { title: String, members: Vec<UserId> },
    Project(ProjectId),
    Retry,
    Discard,
    Reconnect,
    Help,
    Quit,
    Say(String),
}

pub fn parse_input(line: &str) -> std::result::Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Say(line.to_string()));
    };
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let required = |usage: &str| -> std::result::Result<String, String> {
        if rest.is_empty() { Err(format!("usage: {usage}")) } else { Ok(rest.to_string()) }
    };

    match name {
        "list" | "ls" => Ok(Input::List),
        "open" => required("/open <n|id>").map(Input::Open),
        "close" => Ok(Input::Close),
        "dm" => required("/dm <user-id>").map(|u| Input::Direct(UserId::new(u))),
        "group" => {
            let usage = "usage: /group <title> <id,id,..>";
            let (title, members) = rest.rsplit_once(char::is_whitespace).ok_or(usage)?;
            let members: Vec<UserId> = members
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(UserId::new)
                .collect();
            if members.is_empty() || title.trim().is_empty() {
                return Err(usage.to_string());
            }
            Ok(Input::Group { title: title.trim().to_string(), members })
        }
        "project" => required("/project <project-id>").map(|p| Input::Project(ProjectId::new(p))),
        "retry" => Ok(Input::Retry),
        "discard" => Ok(Input::Discard),
        "reconnect" => Ok(Input::Reconnect),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" | "q" => Ok(Input::Quit),
        other => Err(format!("unknown command /{other}, try /help")),
    }
}

/// A list number (1-based) or a raw conversation id.
fn resolve_target(bridge: &ConversationBridge, target: &str) -> ConversationId {
    if let Ok(n) = target.parse::<usize>() {
        if let Some(row) = n.checked_sub(1).and_then(|i| bridge.conversations().get(i)) {
            return row.id.clone();
        }
    }
    ConversationId::new(target)
}

/// Prints only what changed since the last call.
#[derive(Default)]
struct Screen {
    active: Option<ConversationId>,
    shown: usize,
}

impl Screen {
    fn refresh(&mut self, bridge: &mut ConversationBridge, me: Option<&UserId>) {
        if let Some(notice) = bridge.take_notice() {
            eprintln!("! {notice}");
        }
        let messages = bridge.messages();
        if bridge.active() != self.active.as_ref() || messages.len() < self.shown {
            self.active = bridge.active().cloned();
            if self.active.is_some() {
                println!("{}", super::chat_view::render(bridge, me));
            }
        } else {
            for m in &messages[self.shown..] {
                println!("{}", super::chat_view::format_message(m, me));
            }
        }
        self.shown = bridge.messages().len();
    }
}

pub async fn run_chat(settings: &Settings, open: Option<ConversationId>) -> Result<()> {
    let client = Arc::new(ApiClient::from_settings(settings)?);
    let (socket, mut events) = SocketClient::new(settings.socket_url()?, settings.token.clone());
    let socket = Arc::new(socket);

    let me = settings.user_id.as_deref().map(UserId::new);
    let mut bridge = ConversationBridge::new(client, socket.clone());
    if let Some(me) = &me {
        bridge = bridge.with_user(me.clone());
    }
    if let Some(cache) = super::sidebar::open_cache(settings) {
        bridge = bridge.with_cache(cache);
    }
    if bridge.hydrate_from_cache() > 0 {
        println!("{}", super::sidebar::render(bridge.conversations()));
    }

    // With a live socket the Connected event triggers the first load, and the
    // conversation is opened after it.
    let mut pending_open = open;
    match socket.connect().await {
        Ok(()) => log::info!("connected to {}", socket.url()),
        Err(e) => {
            log::warn!("real-time link unavailable: {}", e);
            eprintln!("! Real-time link unavailable ({e}); messages will be sent over HTTP");
            if bridge.load_conversations().await.is_ok() {
                println!("{}", super::sidebar::render(bridge.conversations()));
            }
            if let Some(id) = pending_open.take() {
                let _ = bridge.select_conversation(&id).await;
            }
        }
    }

    let mut screen = Screen::default();
    screen.refresh(&mut bridge, me.as_ref());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let resynced = event == SocketEvent::Connected;
                if let Err(e) = bridge.handle_socket_event(event).await {
                    log::warn!("socket event not applied: {}", e);
                }
                if resynced {
                    if let Some(id) = pending_open.take() {
                        let _ = bridge.select_conversation(&id).await;
                    }
                }
                screen.refresh(&mut bridge, me.as_ref());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = match parse_input(&line) {
                    Ok(input) => input,
                    Err(usage) => {
                        eprintln!("{usage}");
                        continue;
                    }
                };
                if input == Input::Quit {
                    break;
                }
                apply(&mut bridge, &socket, input).await;
                screen.refresh(&mut bridge, me.as_ref());
            }
        }
    }

    socket.disconnect();
    Ok(())
}

async fn apply(bridge: &mut ConversationBridge, socket: &SocketClient, input: Input) {
    match input {
        Input::Empty | Input::Quit => {}
        Input::Help => println!("{HELP}"),
        Input::List => {
            if bridge.load_conversations().await.is_ok() || !bridge.conversations().is_empty() {
                println!("{}", super::sidebar::render(bridge.conversations()));
            }
        }
        Input::Open(target) => {
            let id = resolve_target(bridge, &target);
            let _ = bridge.select_conversation(&id).await;
        }
        Input::Close => bridge.close_conversation(),
        Input::Direct(user) => {
            let _ = bridge.start_direct(&user).await;
        }
        Input::Group { title, members } => {
            let _ = bridge.create_group(&title, &members).await;
        }
        Input::Project(project) => {
            let _ = bridge.open_project_conversation(&project).await;
        }
        Input::Retry => {
            let keys: Vec<Uuid> = bridge.outbox().failed().map(|e| e.client_id).collect();
            if keys.is_empty() {
                println!("Nothing to retry.");
            }
            for key in keys {
                let _ = bridge.retry_failed(key).await;
            }
        }
        Input::Discard => {
            let keys: Vec<Uuid> = bridge.outbox().failed().map(|e| e.client_id).collect();
            let dropped = keys.into_iter().filter_map(|k| bridge.discard_failed(k)).count();
            println!("Discarded {dropped} message(s).");
        }
        Input::Reconnect => {
            socket.disconnect();
            if let Err(e) = socket.connect().await {
                eprintln!("! Reconnect failed: {e}");
            }
        }
        Input::Say(text) => {
            let Some(active) = bridge.active().cloned() else {
                eprintln!("Open a conversation first (/list, /open <n>).");
                return;
            };
            let _ = bridge.send_message(&active, &text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_input("  on my way "), Ok(Input::Say("on my way".into())));
        assert_eq!(parse_input("   "), Ok(Input::Empty));
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(parse_input("/open 3"), Ok(Input::Open("3".into())));
        assert_eq!(parse_input("/dm 42"), Ok(Input::Direct(UserId::new("42"))));
        assert_eq!(parse_input("/project p-9"), Ok(Input::Project(ProjectId::new("p-9"))));
        assert!(parse_input("/open").unwrap_err().starts_with("usage"));
    }

    #[test]
    fn group_title_may_contain_spaces() {
        assert_eq!(
            parse_input("/group 4,5"),
            Err("usage: /group <title> <id,id,..>".to_string())
        );
        assert_eq!(
            parse_input("/group Framing crew 4,5,6"),
            Ok(Input::Group {
                title: "Framing crew".into(),
                members: vec![UserId::new("4"), UserId::new("5"), UserId::new("6")],
            })
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        assert!(parse_input("/dance").unwrap_err().contains("/dance"));
        assert_eq!(parse_input("/q"), Ok(Input::Quit));
    }
}

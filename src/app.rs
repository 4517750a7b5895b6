use std::{
    io::{self, BufRead},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};

use crate::{
    cli::{Cli, Command, RoleArg, WatchCommand, WATCH_HELP},
    domain::{self, role::Role},
    infra::{self, poll_driver::PollDriver},
    render, transport,
    usecases::{
        self, bootstrap,
        context::AppContext,
        errors::ChatError,
        list_conversations::{list_conversations, ListConversationsQuery},
        load_messages::{load_messages, LoadMessagesQuery},
        open_signal::{open_signal, OpenHandle},
        session::ChatSessionController,
    },
};

const MIN_DRIVER_RESOLUTION_MS: u64 = 10;

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;

    tracing::debug!(
        domain = domain::module_name(),
        usecases = usecases::module_name(),
        transport = transport::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Conversations { role, limit } => {
            let mut query = ListConversationsQuery::new(role.into());
            if let Some(limit) = limit {
                query = query.with_limit(limit);
            }
            let conversations = list_conversations(context.transport.as_ref(), &query)
                .map_err(ChatError::from_transport)?;

            if conversations.is_empty() {
                println!("no conversations");
            }
            for conversation in &conversations {
                println!("{}", render::conversation_line(conversation, false));
            }
        }
        Command::Messages {
            conversation_id,
            limit,
        } => {
            let query = LoadMessagesQuery::new(conversation_id, limit.unwrap_or_default());
            let messages = load_messages(context.transport.as_ref(), &query)
                .map_err(ChatError::from_transport)?;

            for message in &messages {
                println!("{}", render::message_line(message, Role::Employee));
            }
        }
        Command::Send {
            conversation_id,
            body,
        } => {
            let mut session = bootstrap::compose_console(&context);
            session.open()?;
            session.select_conversation(conversation_id)?;
            let local_id = session.send(&body)?;
            session.close();

            tracing::info!(conversation_id, local_id = %local_id, "message sent");
            println!("sent");
        }
        Command::Watch { role, conversation } => watch(&context, role, conversation)?,
    }

    Ok(())
}

fn watch(context: &AppContext, role: RoleArg, conversation: Option<i64>) -> Result<()> {
    let (handle, signal) = open_signal();
    let session = match role {
        RoleArg::Employee => bootstrap::compose_console(context),
        RoleArg::Customer => bootstrap::compose_widget(context, Some(signal)),
    };
    let session = Arc::new(Mutex::new(session));

    {
        let mut guard = lock(&session)?;
        match role {
            RoleArg::Employee => guard.open()?,
            RoleArg::Customer => {
                handle.request_open();
                guard.poll_open_requests()?;
            }
        }
        if let Some(conversation_id) = conversation {
            guard.select_conversation(conversation_id)?;
        }
        println!("{}", render::snapshot(&guard));
    }

    let resolution = Duration::from_millis(
        context
            .config
            .polling
            .driver_resolution_ms
            .max(MIN_DRIVER_RESOLUTION_MS),
    );
    let mut last_rendered = String::new();
    let _driver = PollDriver::start(session.clone(), resolution, move |session, failure| {
        let rendered = render::snapshot(session);
        if rendered != last_rendered {
            println!("{rendered}");
            last_rendered = rendered;
        }
        if let Some(error) = failure {
            eprintln!("{error}");
        }
    })?;

    println!("{WATCH_HELP}");
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read command from stdin")?;
        let Some(command) = WatchCommand::parse(&line) else {
            continue;
        };
        if command == WatchCommand::Quit {
            break;
        }

        if let Err(error) = execute(&session, &handle, command) {
            eprintln!("{error}");
        }
        if context.auth.is_rejected() {
            return Err(anyhow!("chat service rejected the credential; check [service] token"));
        }
    }

    let mut guard = lock(&session)?;
    guard.close();
    Ok(())
}

fn execute(session: &Arc<Mutex<ChatSessionController>>, handle: &OpenHandle, command: WatchCommand) -> Result<()> {
    // Sends run without the lock so polling continues meanwhile.
    let command = match command {
        WatchCommand::Send(body) => {
            let outgoing = lock(session)?.begin_send(&body)?;
            let sent = outgoing.run();
            lock(session)?.finish_send(sent)?;
            return print_snapshot(session);
        }
        other => other,
    };

    {
        let mut guard = lock(session)?;
        match command {
            WatchCommand::Help => println!("{WATCH_HELP}"),
            WatchCommand::Open if guard.role() == Role::Customer => {
                handle.request_open();
            }
            WatchCommand::Close if guard.role() == Role::Customer => {
                handle.request_close();
            }
            WatchCommand::Open => guard.open()?,
            WatchCommand::Close => guard.close(),
            WatchCommand::Select(conversation_id) => guard.select_conversation(conversation_id)?,
            WatchCommand::Resend(local_id) => {
                guard.resend(local_id)?;
            }
            WatchCommand::Discard(local_id) => guard.discard_failed(local_id)?,
            WatchCommand::Edit(message_id, body) => guard.edit_message(message_id, &body)?,
            WatchCommand::Recall(message_id) => guard.recall_message(message_id)?,
            WatchCommand::Delete(message_id) => guard.delete_message(message_id)?,
            WatchCommand::Hide(conversation_id) => {
                let outcome = guard.hide_conversation(conversation_id)?;
                tracing::info!(conversation_id, outcome = ?outcome, "conversation hidden");
            }
            WatchCommand::Dismiss(notice_id) => guard.dismiss_notification(notice_id),
            WatchCommand::Unknown(raw) => println!("unknown command `{raw}`; {WATCH_HELP}"),
            WatchCommand::Send(_) | WatchCommand::Quit => {}
        }
    }

    print_snapshot(session)
}

fn print_snapshot(session: &Arc<Mutex<ChatSessionController>>) -> Result<()> {
    println!("{}", render::snapshot(&*lock(session)?));
    Ok(())
}

fn lock(session: &Mutex<ChatSessionController>) -> Result<MutexGuard<'_, ChatSessionController>> {
    session
        .lock()
        .map_err(|_| anyhow!("chat session state is poisoned"))
}

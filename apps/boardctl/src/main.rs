use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, BoardClient, BoardCreation, ClientSettings, DragEnd, SessionGate,
    SessionTokens, StaticToken, TaskUpdate, TransitionOutcome,
};
use shared::{
    domain::{Board, BoardId, Task, TaskDraft, TaskId, TaskStatus},
    protocol::Credentials,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "boardctl", about = "Work with task boards from the terminal")]
struct Cli {
    /// Overrides `server_url` from boards.toml and the environment.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Bearer token for board calls.
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Signup {
        username: String,
        password: String,
    },
    /// Prints the access token on success.
    Signin {
        username: String,
        password: String,
    },
    /// Lists boards with per-column task counts.
    Boards,
    CreateBoard {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// `title` or `title:STATUS`, repeatable.
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    AddTask {
        board_id: BoardId,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assigned_to: Option<String>,
        #[arg(long, default_value = "TODO")]
        status: TaskStatus,
    },
    EditTask {
        board_id: BoardId,
        task_id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assigned_to: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Moves a task to another column as a drag-and-drop would.
    MoveTask {
        board_id: BoardId,
        task_id: TaskId,
        to: TaskStatus,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(token) = cli.token {
        settings.access_token = Some(token);
    }
    tracing::debug!(server_url = %settings.server_url, "boardctl: settings resolved");

    match cli.command {
        Command::Signup { username, password } => {
            let client = connect(&settings, Arc::new(StaticToken::anonymous()))?;
            let created = client
                .auth
                .sign_up(&Credentials::new(username, password))
                .await?;
            println!("{}", created.detail.as_deref().unwrap_or("signed up"));
        }
        Command::Signin { username, password } => {
            let session = Arc::new(SessionTokens::new());
            let client = connect(&settings, session.clone())?;
            client
                .auth
                .sign_in_into(&Credentials::new(username, password), &session)
                .await?;
            let token = session
                .bearer_token()
                .context("server issued no access token")?;
            println!("{token}");
        }
        Command::Boards => {
            let client = authorized_client(&settings)?;
            client.store.load_boards().await?;
            for board in client.store.boards().await {
                print_board_summary(&board);
            }
        }
        Command::CreateBoard {
            name,
            description,
            tasks,
        } => {
            let drafts = tasks
                .iter()
                .map(|spec| parse_task_spec(spec))
                .collect::<Result<Vec<_>>>()?;
            let client = authorized_client(&settings)?;
            let creation = client
                .store
                .create_board(&name, &description, drafts)
                .await?;
            print_creation(&creation);
            creation.into_result()?;
        }
        Command::AddTask {
            board_id,
            title,
            description,
            assigned_to,
            status,
        } => {
            let client = authorized_client(&settings)?;
            client.store.load_boards().await?;
            let mut draft = TaskDraft::new(title).with_status(status);
            draft.description = description;
            draft.assigned_to = assigned_to;
            let task = client.store.add_task(board_id, &draft).await?;
            println!("added task {}", describe_task(&task));
        }
        Command::EditTask {
            board_id,
            task_id,
            title,
            description,
            assigned_to,
            status,
        } => {
            let client = authorized_client(&settings)?;
            client.store.load_boards().await?;
            let mut task = find_task(&client, board_id, task_id).await?;
            if let Some(title) = title {
                task.title = title;
            }
            if description.is_some() {
                task.description = description;
            }
            if assigned_to.is_some() {
                task.assigned_to = assigned_to;
            }
            if let Some(status) = status {
                task.status = status;
            }
            match client.store.update_task(board_id, task).await? {
                TaskUpdate::Applied(updated) => {
                    println!("updated task {}", describe_task(&updated))
                }
                TaskUpdate::Superseded { confirmed, .. } => println!(
                    "task {} accepted but superseded by a newer change",
                    describe_task(&confirmed)
                ),
            }
        }
        Command::MoveTask {
            board_id,
            task_id,
            to,
        } => {
            let client = authorized_client(&settings)?;
            client.store.load_boards().await?;
            client.store.select_board(board_id).await?;
            let task = find_task(&client, board_id, task_id).await?;
            let outcome = client
                .transitions
                .on_drag_end(DragEnd::new(task_id, task.status, Some(to)))
                .await?;
            match outcome {
                TransitionOutcome::Moved(task) => println!("moved task {}", describe_task(&task)),
                TransitionOutcome::Superseded(task) => println!(
                    "move of task {} accepted but superseded by a newer change",
                    task.id
                ),
                TransitionOutcome::Unchanged | TransitionOutcome::Dropped => {
                    println!("task {task_id} already in {}", to.label())
                }
            }
        }
    }

    Ok(())
}

fn connect(settings: &ClientSettings, session: Arc<dyn SessionGate>) -> Result<BoardClient> {
    BoardClient::connect(settings, session)
        .with_context(|| format!("cannot use server url '{}'", settings.server_url))
}

fn authorized_client(settings: &ClientSettings) -> Result<BoardClient> {
    let token = settings
        .access_token
        .clone()
        .context("no access token; pass --token or set BOARDS_ACCESS_TOKEN")?;
    connect(settings, Arc::new(StaticToken::new(token)))
}

async fn find_task(client: &BoardClient, board_id: BoardId, task_id: TaskId) -> Result<Task> {
    let board = client
        .store
        .board(board_id)
        .await
        .with_context(|| format!("board {board_id} does not exist"))?;
    board
        .task(task_id)
        .cloned()
        .with_context(|| format!("task {task_id} is not on board {board_id}"))
}

/// `title` or `title:STATUS`. A suffix that is not a status stays in the title.
fn parse_task_spec(spec: &str) -> Result<TaskDraft> {
    let (title, status) = match spec.rsplit_once(':') {
        Some((title, status)) => match status.trim().parse::<TaskStatus>() {
            Ok(status) => (title, status),
            Err(_) => (spec, TaskStatus::Todo),
        },
        None => (spec, TaskStatus::Todo),
    };
    let title = title.trim();
    anyhow::ensure!(!title.is_empty(), "task title must not be empty in '{spec}'");
    Ok(TaskDraft::new(title).with_status(status))
}

fn describe_task(task: &Task) -> String {
    let mut line = format!("#{} [{}] {}", task.id, task.status, task.title);
    if let Some(assignee) = &task.assigned_to {
        line.push_str(&format!(" (@{assignee})"));
    }
    line
}

fn print_board_summary(board: &Board) {
    let columns = TaskStatus::ALL
        .iter()
        .map(|status| format!("{}: {}", status.label(), board.tasks_with_status(*status).count()))
        .collect::<Vec<_>>()
        .join("  ");
    println!("#{} {}  {}", board.id, board.name, columns);
}

fn print_creation(creation: &BoardCreation) {
    println!("created board #{} {}", creation.board.id, creation.board.name);
    for task in &creation.created {
        println!("  added {}", describe_task(task));
    }
    if let Some(failed) = &creation.failed {
        println!(
            "  task {} '{}' failed: {}",
            failed.index + 1,
            failed.draft.title,
            failed.error
        );
    }
    for draft in &creation.unsubmitted {
        println!("  not submitted: {}", draft.title);
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use filedock_core::project::CreateProject;
use filedock_core::task::{CreateTask, Status};
use filedock_core::user::CreateUser;
use filedock_db::DbConfig;
use filedock_server::auth;
use filedock_server::config::ServerConfig;
use filedock_service::ServiceConfig;
use filedock_store::StoreConfig;

#[derive(Parser)]
#[command(name = "filedock-server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user
    AddUser {
        username: String,
        #[arg(long, default_value = "")]
        display_name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Create a project owned by a user
    AddProject {
        name: String,
        /// Owner user ID
        #[arg(long)]
        owner: String,
    },
    /// Add a user to a project's member list
    AddMember { project_id: String, user_id: String },
    /// Create a task in a project
    AddTask {
        title: String,
        #[arg(long)]
        project: String,
        /// Creator user ID
        #[arg(long)]
        creator: String,
        /// Assignee user ID
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Generate a new API key for a user
    Keygen {
        /// User the key authenticates as
        #[arg(long)]
        user: String,
        /// Human-readable name for the key
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List all API keys (metadata only, no secrets)
    ListKeys,
    /// Revoke (delete) an API key by ID
    RevokeKey {
        /// The API key ID to revoke
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("filedock_server=info,filedock_service=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    let db = filedock_db::open_database(&DbConfig::from_env()).await?;

    match cli.command {
        Some(Commands::AddUser {
            username,
            display_name,
            email,
        }) => {
            let user = db
                .create_user(&CreateUser {
                    username,
                    display_name,
                    email,
                })
                .await?;
            println!("{}", user.id);
        }
        Some(Commands::AddProject { name, owner }) => {
            let project = db
                .create_project(&CreateProject {
                    name,
                    owner_id: owner,
                })
                .await?;
            println!("{}", project.id);
        }
        Some(Commands::AddMember {
            project_id,
            user_id,
        }) => {
            db.add_project_member(&project_id, &user_id).await?;
            eprintln!("Added {user_id} to project {project_id}");
        }
        Some(Commands::AddTask {
            title,
            project,
            creator,
            assignee,
        }) => {
            let task = db
                .create_task(&CreateTask {
                    project_id: project,
                    title,
                    status: Status::Todo,
                    assignee_id: assignee,
                    creator_id: creator,
                })
                .await?;
            println!("{}", task.id);
        }
        Some(Commands::Keygen { user, name }) => {
            // Fails early if the user does not exist.
            db.get_user(&user).await?;
            let raw_key = auth::generate_api_key();
            let hash = auth::sha256_hex(&raw_key);
            let api_key = db.insert_api_key(&user, &name, &hash).await?;
            eprintln!("Created API key (id: {}) for user {user}", api_key.id);
            if !name.is_empty() {
                eprintln!("  name: {name}");
            }
            // Raw key goes to stdout so it can be captured.
            println!("{raw_key}");
            eprintln!("\nSave this key, it cannot be retrieved again.");
        }
        Some(Commands::ListKeys) => {
            let keys = db.list_api_keys().await?;
            if keys.is_empty() {
                eprintln!("No API keys found.");
            } else {
                println!(
                    "{:<38} {:<38} {:<20} {:<28} LAST USED",
                    "ID", "USER", "NAME", "CREATED"
                );
                for key in keys {
                    println!(
                        "{:<38} {:<38} {:<20} {:<28} {}",
                        key.id,
                        key.user_id,
                        if key.name.is_empty() { "-" } else { &key.name },
                        key.created_at,
                        key.last_used_at.as_deref().unwrap_or("never"),
                    );
                }
            }
        }
        Some(Commands::RevokeKey { id }) => {
            db.delete_api_key(&id).await?;
            eprintln!("Revoked API key {id}");
        }
        None => {
            let config = ServerConfig::from_env();
            let addr = config.addr()?;

            let state = filedock_server::build_state(
                db,
                &StoreConfig::from_env(),
                ServiceConfig::from_env(),
            )?;
            filedock_server::maintenance::spawn_sweeps(state.service.clone(), &config);

            let listener = TcpListener::bind(addr).await?;
            tracing::info!("filedock-server listening on http://{addr}");

            filedock_server::serve(listener, state).await?;
        }
    }

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};

use dmart_client::api::content::{self, MediaUpload};
use dmart_client::api::query::{self, EntriesQuery, PublicQuery};
use dmart_client::api::types::{Attachment, Query, QueryType, Record, RequestType};
use dmart_client::api::{media, user, ApiClient};
use dmart_client::{space_config, state};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "dmart", about = "Command-line client for a DMART backend")]
struct Cli {
    /// Log in as this user before managed calls
    #[arg(long, env = "DMART_SHORTNAME", global = true)]
    login_user: Option<String>,

    #[arg(long, env = "DMART_PASSWORD", hide_env_values = true, global = true)]
    login_password: Option<String>,

    /// Select this profile before running the command
    #[arg(long = "profile", env = "DMART_PROFILE", global = true)]
    active_profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the active backend/space
    #[command(subcommand)]
    Space(SpaceCommand),
    Register {
        #[arg(long)]
        user: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        invitation: String,
    },
    /// Log in with --login-user/--login-password and print the response
    Login,
    Query {
        subpath: String,
        #[arg(long = "type", default_value = "subpath")]
        query_type: QueryType,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    Tags,
    PublicQuery {
        subpath: String,
        #[arg(long, value_delimiter = ',')]
        resource_types: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        resource_shortnames: Vec<String>,
        #[arg(long = "type", default_value = "subpath")]
        query_type: QueryType,
        #[arg(long, default_value = "*")]
        search: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    PublicTags {
        #[arg(long, default_value = "/posts")]
        subpath: String,
        #[arg(long, value_delimiter = ',', default_value = "post")]
        resource_types: Vec<String>,
    },
    Entries {
        subpath: String,
        #[arg(long, value_delimiter = ',')]
        filter_types: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        filter_shortnames: Vec<String>,
        #[arg(long = "type", default_value = "subpath")]
        query_type: QueryType,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Submit {
        interaction_type: String,
        subpath: String,
        #[arg(long)]
        parent: Option<String>,
        /// Attributes as a JSON object
        #[arg(long, default_value = "{}")]
        attributes: String,
    },
    /// Upload a file as a media record
    Upload {
        subpath: String,
        shortname: String,
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Send a record (JSON) with the given action
    Content { action: RequestType, record: String },
    Delete {
        resource_type: String,
        subpath: String,
        shortname: String,
        #[arg(long)]
        parent: Option<String>,
    },
    Folder {
        action: RequestType,
        subpath: String,
        shortname: String,
    },
    UpdateEmbedded {
        resource_type: String,
        subpath: String,
        shortname: String,
        #[arg(long, default_value = "text/html; charset=utf8")]
        content_type: String,
        /// File whose text becomes the embedded payload
        file: PathBuf,
    },
    /// Print the payload URL of an attachment (JSON)
    AttachmentUrl { attachment: String },
}

#[derive(Subcommand, Debug)]
enum SpaceCommand {
    Show,
    Set { space_name: String, backend: String },
    Reset,
    /// Activate a named profile
    Use { profile: String },
    Profiles,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_object(raw: &str) -> CliResult<Map<String, Value>> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err("expected a JSON object".into()),
    }
}

async fn ensure_login(client: &ApiClient, cli: &Cli) -> CliResult<()> {
    if let (Some(shortname), Some(password)) = (&cli.login_user, &cli.login_password) {
        user::login(client, shortname, password).await?;
    }
    Ok(())
}

fn run_space(space: &state::ActiveSpace, command: &SpaceCommand) -> CliResult<()> {
    match command {
        SpaceCommand::Show => print_json(&space.get()),
        SpaceCommand::Set {
            space_name,
            backend,
        } => {
            space.set(state::EndpointConfig::new(space_name.as_str(), backend.as_str()))?;
            print_json(&space.get())
        }
        SpaceCommand::Reset => {
            space.reset()?;
            print_json(&space.get())
        }
        SpaceCommand::Use { profile } => print_json(&space.select_profile(profile)?),
        SpaceCommand::Profiles => {
            for profile in space_config::profiles() {
                println!(
                    "{:<10} {:<36} {} ({})",
                    profile.short_name, profile.title, profile.backend, profile.space_name
                );
            }
            Ok(())
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let space = state::global()?;
    let _watch = space.subscribe(|c| log::debug!("Active space: {} @ {}", c.space_name, c.backend));
    if let Some(profile) = &cli.active_profile {
        space.select_profile(profile)?;
    }

    let client = ApiClient::new(Arc::clone(&space))?;
    match &cli.command {
        Command::Space(command) => run_space(&space, command),
        Command::Register {
            user: shortname,
            display_name,
            email,
            new_password,
            invitation,
        } => {
            let resp =
                user::register(&client, shortname, display_name, email, new_password, invitation)
                    .await?;
            print_json(&resp)
        }
        Command::Login => {
            let (Some(shortname), Some(password)) = (&cli.login_user, &cli.login_password) else {
                return Err("login needs --login-user and --login-password".into());
            };
            print_json(&user::login(&client, shortname, password).await?)
        }
        Command::Query {
            subpath,
            query_type,
            search,
            limit,
            offset,
        } => {
            ensure_login(&client, &cli).await?;
            let mut q = Query::new(*query_type, subpath);
            q.search = search.clone();
            q.limit = *limit;
            q.offset = *offset;
            print_json(&query::query(&client, q).await?)
        }
        Command::Tags => {
            ensure_login(&client, &cli).await?;
            print_json(&query::tags(&client).await?)
        }
        Command::PublicQuery {
            subpath,
            resource_types,
            resource_shortnames,
            query_type,
            search,
            limit,
            offset,
        } => {
            let params = PublicQuery {
                subpath: subpath.clone(),
                resource_types: resource_types.clone(),
                resource_shortnames: resource_shortnames.clone(),
                query_type: *query_type,
                search: search.clone(),
                limit: *limit,
                offset: *offset,
            };
            print_json(&query::public_query(&client, &params).await?)
        }
        Command::PublicTags {
            subpath,
            resource_types,
        } => print_json(&query::public_tags(&client, subpath, resource_types.clone()).await?),
        Command::Entries {
            subpath,
            filter_types,
            filter_shortnames,
            query_type,
            search,
            limit,
        } => {
            ensure_login(&client, &cli).await?;
            let params = EntriesQuery {
                subpath: subpath.clone(),
                filter_types: filter_types.clone(),
                filter_shortnames: filter_shortnames.clone(),
                query_type: *query_type,
                search: search.clone(),
                limit: *limit,
            };
            print_json(&query::entries(&client, &params).await?)
        }
        Command::Submit {
            interaction_type,
            subpath,
            parent,
            attributes,
        } => {
            ensure_login(&client, &cli).await?;
            let attributes = parse_object(attributes)?;
            let resp = content::submit(
                &client,
                interaction_type,
                subpath,
                parent.as_deref(),
                attributes,
            )
            .await?;
            print_json(&resp)
        }
        Command::Upload {
            subpath,
            shortname,
            file,
            content_type,
        } => {
            ensure_login(&client, &cli).await?;
            let mut upload = MediaUpload::from_path(file).await?;
            upload.content_type = content_type.clone();
            let record = Record::new("media", subpath, shortname);
            print_json(&content::post_media(&client, record, upload).await?)
        }
        Command::Content { action, record } => {
            ensure_login(&client, &cli).await?;
            let record: Record = serde_json::from_str(record)?;
            print_json(&content::content(&client, *action, record).await?)
        }
        Command::Delete {
            resource_type,
            subpath,
            shortname,
            parent,
        } => {
            ensure_login(&client, &cli).await?;
            let result = content::delete_content(
                &client,
                resource_type,
                subpath,
                shortname,
                parent.as_deref(),
            )
            .await?;
            print_json(&result)
        }
        Command::Folder {
            action,
            subpath,
            shortname,
        } => {
            ensure_login(&client, &cli).await?;
            print_json(&content::folder(&client, *action, subpath, shortname).await?)
        }
        Command::UpdateEmbedded {
            resource_type,
            subpath,
            shortname,
            content_type,
            file,
        } => {
            ensure_login(&client, &cli).await?;
            let embedded = tokio::fs::read_to_string(file).await?;
            let result = content::update_embedded(
                &client,
                content_type,
                &embedded,
                subpath,
                shortname,
                resource_type,
            )
            .await?;
            print_json(&result)
        }
        Command::AttachmentUrl { attachment } => {
            let attachment: Attachment = serde_json::from_str(attachment)?;
            match media::attachment_url(&client, &attachment) {
                Some(url) => println!("{}", url),
                None => log::warn!("Attachment has no payload file"),
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

use crate::api::mattermost::{MattermostApi, MattermostClient};
use crate::cli::Args;
use crate::format::{self, AuthorStyle};
use crate::models::{Post, User};
use crate::settings::{self, ServerConfig};
use crate::{reconcile, schema};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

/// State threaded through the pipeline stages.
///
/// Each resolved field is written by exactly one stage and is read-only once
/// set; writing twice or reading before the owning stage ran is a bug and is
/// reported as an error rather than silently overwritten.
#[derive(Debug)]
pub struct ResolutionContext {
    channel_name: String,
    since: Option<DateTime<Local>>,
    limit: Option<u32>,
    server: Option<ServerConfig>,
    users: Option<HashMap<String, User>>,
    team_id: Option<String>,
    channel_id: Option<String>,
    posts: Option<Vec<Post>>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<()> {
    if slot.is_some() {
        return Err(anyhow!("{} was already resolved", name));
    }
    *slot = Some(value);
    Ok(())
}

fn resolved<'a, T>(slot: &'a Option<T>, name: &str) -> Result<&'a T> {
    slot.as_ref()
        .ok_or_else(|| anyhow!("{} has not been resolved yet", name))
}

impl ResolutionContext {
    pub fn new(channel_name: impl Into<String>, since: Option<DateTime<Local>>) -> Self {
        Self {
            channel_name: channel_name.into(),
            since,
            limit: None,
            server: None,
            users: None,
            team_id: None,
            channel_id: None,
            posts: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn server(&self) -> Result<&ServerConfig> {
        resolved(&self.server, "server configuration")
    }

    pub fn users(&self) -> Result<&HashMap<String, User>> {
        resolved(&self.users, "user directory")
    }

    pub fn team_id(&self) -> Result<&str> {
        resolved(&self.team_id, "team").map(String::as_str)
    }

    pub fn channel_id(&self) -> Result<&str> {
        resolved(&self.channel_id, "channel").map(String::as_str)
    }

    pub fn posts(&self) -> Result<&[Post]> {
        resolved(&self.posts, "posts").map(Vec::as_slice)
    }
}

/// Stage 1: obtain the server connection parameters. No network I/O.
pub fn load_configuration<L>(mut ctx: ResolutionContext, load: L) -> Result<ResolutionContext>
where
    L: FnOnce() -> Result<ServerConfig>,
{
    let server = load().context("loading configuration")?;
    debug!("using server {} and team {}", server.url, server.team);
    set_once(&mut ctx.server, server, "server configuration")?;
    Ok(ctx)
}

/// Stage 2: fetch the whole user directory, keyed by user id.
pub async fn fetch_users(
    mut ctx: ResolutionContext,
    api: &(impl MattermostApi + Sync),
) -> Result<ResolutionContext> {
    let users = async {
        let raw = api.get_all(&["users"], &[]).await?;
        schema::user_list(serde_json::Value::Array(raw))
    }
    .await
    .context("listing users")?;

    info!("fetched {} users", users.len());
    let directory = users
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect::<HashMap<_, _>>();

    set_once(&mut ctx.users, directory, "user directory")?;
    Ok(ctx)
}

/// Stage 3: look up the configured team by name.
pub async fn resolve_team(
    mut ctx: ResolutionContext,
    api: &(impl MattermostApi + Sync),
) -> Result<ResolutionContext> {
    let team = ctx.server()?.team.clone();

    let team_id = async {
        let raw = api.get(&["teams", "name", team.as_str()], &[]).await?;
        Ok::<_, anyhow::Error>(schema::string_id(&raw, "team")?)
    }
    .await
    .with_context(|| format!("finding team \"{}\"", team))?;

    debug!("team {} has id {}", team, team_id);
    set_once(&mut ctx.team_id, team_id, "team")?;
    Ok(ctx)
}

/// Stage 4: look up the requested channel within the resolved team.
pub async fn resolve_channel(
    mut ctx: ResolutionContext,
    api: &(impl MattermostApi + Sync),
) -> Result<ResolutionContext> {
    let channel_id = async {
        let team_id = ctx.team_id()?;
        let raw = api
            .get(&["teams", team_id, "channels", "name", ctx.channel_name()], &[])
            .await?;
        Ok::<_, anyhow::Error>(schema::string_id(&raw, "channel")?)
    }
    .await
    .context("listing channels")?;

    debug!("channel {} has id {}", ctx.channel_name, channel_id);
    set_once(&mut ctx.channel_id, channel_id, "channel")?;
    Ok(ctx)
}

/// Query for the post request: the `since` bound in epoch milliseconds, or a
/// page size when no bound is given.
pub fn post_query(since: Option<DateTime<Local>>, limit: Option<u32>) -> Vec<(&'static str, String)> {
    match (since, limit) {
        (Some(since), _) => vec![("since", since.timestamp_millis().to_string())],
        (None, Some(limit)) => vec![("per_page", limit.to_string())],
        (None, None) => vec![],
    }
}

/// Stage 5: fetch, validate and reconcile the channel's posts.
pub async fn fetch_posts(
    mut ctx: ResolutionContext,
    api: &(impl MattermostApi + Sync),
) -> Result<ResolutionContext> {
    let posts = async {
        let channel_id = ctx.channel_id()?;
        let query = post_query(ctx.since, ctx.limit);
        let raw = api.get(&["channels", channel_id, "posts"], &query).await?;
        let list = schema::post_list(raw)?;
        Ok::<_, anyhow::Error>(reconcile::chronological(list)?)
    }
    .await
    .context("listing posts")?;

    info!("fetched {} posts", posts.len());
    set_once(&mut ctx.posts, posts, "posts")?;
    Ok(ctx)
}

/// Runs every stage in order, stopping at the first failure.
///
/// `connect` builds the transport from the loaded configuration, so nothing
/// reaches the network when configuration fails.
pub async fn execute<L, C, A>(
    ctx: ResolutionContext,
    load: L,
    connect: C,
) -> Result<ResolutionContext>
where
    L: FnOnce() -> Result<ServerConfig>,
    C: FnOnce(&ServerConfig) -> Result<A>,
    A: MattermostApi + Sync,
{
    let ctx = load_configuration(ctx, load)?;
    let api = connect(ctx.server()?).context("loading configuration")?;

    let ctx = fetch_users(ctx, &api).await?;
    let ctx = resolve_team(ctx, &api).await?;
    let ctx = resolve_channel(ctx, &api).await?;
    fetch_posts(ctx, &api).await
}

/// Formats every post of a fully resolved context, oldest first.
pub fn render(ctx: &ResolutionContext, style: AuthorStyle) -> Result<Vec<String>> {
    let users = ctx.users()?;
    ctx.posts()?
        .iter()
        .map(|post| format::format_post(post, users, style).context("listing posts"))
        .collect()
}

pub async fn run(args: Args) -> Result<()> {
    let style = if args.full_name {
        AuthorStyle::FullName
    } else {
        AuthorStyle::Username
    };
    let ctx = ResolutionContext::new(args.channel.clone(), args.since).with_limit(args.limit);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message(format!("Fetching posts of ~{}...", args.channel));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = execute(
        ctx,
        || settings::resolve_server_config(&args),
        |server| MattermostClient::new(&server.url, &server.token),
    )
    .await
    .and_then(|ctx| render(&ctx, style));

    spinner.finish_and_clear();
    let lines = result?;

    let mut stdout = io::stdout().lock();
    for line in &lines {
        writeln!(stdout, "{}", line)?;
    }
    stdout.flush()?;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use fetch_core::{
    AbortableFetch, AbortableSearch, FetchState, ListingsClient, SearchMetrics, SearchState,
};
use shared::protocol::SearchResponse;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

mod config;
mod table;

#[derive(Parser, Debug)]
#[command(name = "listings", about = "Browse users and posts from a remote listings API")]
struct Args {
    /// Overrides the configured API base URL.
    #[arg(long)]
    api_base_url: Option<String>,
    /// Overrides the configured search debounce, in milliseconds.
    #[arg(long)]
    debounce_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the user collection and render it as a table.
    Users {
        /// Substring filter over name, username, email, phone and website.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Fetch the post collection and render it as a table.
    Posts {
        /// Substring filter over post titles.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Interactive debounced search over post titles and bodies.
    Search,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }
    if let Some(ms) = args.debounce_ms {
        settings.debounce_ms = ms;
    }

    let client = ListingsClient::new(settings.api_base_url.clone());
    tracing::info!(base_url = %client.base_url(), "listings client ready");

    match args.command {
        Command::Users { filter } => run_users(client, filter.as_deref()).await,
        Command::Posts { filter } => run_posts(client, filter.as_deref()).await,
        Command::Search => run_search(client, Duration::from_millis(settings.debounce_ms)).await,
    }
}

async fn run_users(client: ListingsClient, filter: Option<&str>) -> Result<()> {
    let fetch_client = client.clone();
    let controller = AbortableFetch::new(move |_key: String, token: CancellationToken| {
        let client = fetch_client.clone();
        async move { client.list_users(&token).await }
    });
    let mut rx = controller.subscribe();
    controller.load("/users".to_string());

    let state = wait_terminal(&mut rx).await;
    match state {
        FetchState {
            data: Some(users), ..
        } => {
            println!("{}", table::render_users(&users, filter));
            Ok(())
        }
        FetchState {
            error: Some(err), ..
        } => bail!("failed to fetch users: {err}"),
        _ => bail!("user fetch was cancelled before it settled"),
    }
}

async fn run_posts(client: ListingsClient, filter: Option<&str>) -> Result<()> {
    let fetch_client = client.clone();
    let controller = AbortableFetch::new(move |_key: String, token: CancellationToken| {
        let client = fetch_client.clone();
        async move { client.list_posts(&token).await }
    });
    let mut rx = controller.subscribe();
    controller.load("/posts".to_string());

    let state = wait_terminal(&mut rx).await;
    match state {
        FetchState {
            data: Some(posts), ..
        } => {
            println!("{}", table::render_posts(&posts, filter));
            Ok(())
        }
        FetchState {
            error: Some(err), ..
        } => bail!("failed to fetch posts: {err}"),
        _ => bail!("post fetch was cancelled before it settled"),
    }
}

async fn run_search(client: ListingsClient, debounce: Duration) -> Result<()> {
    let search_client = client.clone();
    let search = AbortableSearch::new_with_dependencies(
        move |query: String, token: CancellationToken| {
            let client = search_client.clone();
            async move { client.search_posts(&query, &token).await }
        },
        debounce,
        Some(Box::new(|| println!("-- search cancelled --"))),
    );

    println!("Type to search posts; ':cancel' aborts the in-flight search, ':quit' exits.");

    let printer = {
        let search = Arc::clone(&search);
        let mut rx = search.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                print_search_state(&state, search.metrics());
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim_end() {
            ":quit" => break,
            ":cancel" => search.cancel(),
            query => search.set_query(query),
        }
    }

    search.shutdown();
    printer.abort();
    Ok(())
}

async fn wait_terminal<T: Clone>(rx: &mut watch::Receiver<FetchState<T>>) -> FetchState<T> {
    loop {
        {
            let state = rx.borrow_and_update();
            if !state.loading && (state.data.is_some() || state.error.is_some() || state.aborted) {
                return state.clone();
            }
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

fn print_search_state(state: &SearchState<SearchResponse>, metrics: SearchMetrics) {
    if state.loading {
        println!("searching '{}' ...", state.query);
        return;
    }
    if let Some(err) = &state.error {
        println!("error: {err}");
    } else if state.aborted {
        println!("search aborted");
    } else if let Some(results) = &state.results {
        println!("{} result(s) for '{}'", results.total, state.query);
        for post in &results.posts {
            println!("  [{}] {}", post.id.0, post.title);
        }
    } else {
        // Query echo or idle reset; nothing settled yet.
        return;
    }
    println!(
        "  requests issued={} completed={} cancelled={}",
        metrics.issued, metrics.completed, metrics.cancelled
    );
}

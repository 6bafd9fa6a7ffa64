//! feedgram — Binary Entrypoint
//! One forwarding run per invocation; pair it with cron or a systemd timer.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedgram::app::App;

#[derive(Parser)]
#[command(name = "feedgram", about = "Forward new feed items to a Telegram chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forward new toots from the configured Mastodon account
    ForwardToots,
    /// Forward new posts from the configured Bluesky author
    ForwardPosts,
    /// Forward new mails from the configured JMAP mailbox
    ForwardMails,
    /// Forward new submissions from the configured redditor
    ForwardReddit,
    /// Forward new entries from the configured RSS feed
    ForwardRss,
    /// Forward new Xcode releases
    ForwardReleases,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedgram=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let app = App::from_env()?;

    let result = match cli.command {
        Command::ForwardToots => app.forward_toots().await,
        Command::ForwardPosts => app.forward_posts().await,
        Command::ForwardMails => app.forward_mails().await,
        Command::ForwardReddit => app.forward_reddit().await,
        Command::ForwardRss => app.forward_rss().await,
        Command::ForwardReleases => app.forward_releases().await,
    };

    app.close().await;
    result
}

use anyhow::Result;
use clap::Parser;
use complink::commands::{group, link};
use std::path::PathBuf;

/// complink - workspace component linker
///
/// Exposes workspace components under node_modules and orders workspace
/// projects for installation.
///
/// Examples:
///   complink link --components components.json
///   complink group --manifests manifests.json
#[derive(Parser, Debug)]
#[command(author, version = env!("COMPLINK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root directory (defaults to the current directory; also via COMPLINK_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "COMPLINK_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Link components into node_modules
    Link(LinkArgs),

    /// Print the install chunks of a set of project manifests
    Group(GroupArgs),
}

#[derive(clap::Args, Debug)]
pub struct LinkArgs {
    /// JSON file with the components to link
    #[arg(long, value_name = "FILE")]
    pub components: PathBuf,

    /// Scope for components without one
    #[arg(long = "default-scope", env = "COMPLINK_DEFAULT_SCOPE", value_name = "SCOPE")]
    pub default_scope: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct GroupArgs {
    /// JSON file mapping project directories to their package.json contents
    #[arg(long, value_name = "FILE")]
    pub manifests: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = complink::runtime::RealRuntime;

    match cli.command {
        Commands::Link(args) => {
            link(runtime, &args.components, cli.root, args.default_scope).await?
        }
        Commands::Group(args) => group(runtime, &args.manifests)?,
    }
    Ok(())
}

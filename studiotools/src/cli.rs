use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use studiotools_core::storage::{AssetSort, NodeKind};

/// Studiotools: browse and manage production project folders.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory to work from instead of the current directory.
    #[arg(long, global = true, env = "STUDIOTOOLS_CWD")]
    pub cwd: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the current project and working directory.
    Context,
    /// List the classified child folders of a directory.
    Ls(LsArgs),
    /// Print the folder tree below a directory.
    Tree(TreeArgs),
    /// List asset versions below a task or any folder above tasks.
    Assets(AssetsArgs),
    /// List the work files of a task.
    Files(FilesArgs),
    /// Publish an asset version.
    Publish(PublishArgs),
    /// Create projects and folders.
    Create(CreateArgs),
    /// Prepare a new work file for an application in the current task.
    NewFile(NewFileArgs),
    /// Delete a folder or file.
    Delete(DeleteArgs),
    /// Print the next free version number in a folder.
    NextVersion(NextVersionArgs),
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory to list. Defaults to the working directory.
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Root of the tree. Defaults to the project root, or the working directory
    /// outside of a project.
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AssetsArgs {
    /// Task or folder to scan. Defaults to the working directory.
    pub path: Option<PathBuf>,

    /// Column to sort by.
    #[arg(long, value_enum, default_value_t = SortKey::Modified)]
    pub sort: SortKey,

    /// Sort ascending instead of descending.
    #[arg(long)]
    pub asc: bool,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FilesArgs {
    /// Task to scan. Defaults to the working directory.
    pub path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SortKey::Modified)]
    pub sort: SortKey,

    #[arg(long)]
    pub asc: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Version entry to publish, e.g. `anim/versions/render_v002`.
    pub entry: PathBuf,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(subcommand)]
    pub command: CreateCommands,
}

#[derive(Subcommand, Debug)]
pub enum CreateCommands {
    /// Create a new project with the default folder structure.
    Project {
        name: String,
        /// Directory to create. Must not exist yet.
        path: PathBuf,
    },
    /// Create a folder, task area or task.
    Folder {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = KindArg::Folder)]
        kind: KindArg,
        /// Subkind, e.g. `asset` or `shot` for task areas. Defaults to `custom`.
        #[arg(long)]
        subkind: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct NewFileArgs {
    /// Id of an application configured in the project's `apps.yaml`.
    #[arg(long)]
    pub app: String,

    /// Start the application on the new file.
    #[arg(long)]
    pub launch: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub path: PathBuf,

    /// Skip the confirmation prompt.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct NextVersionArgs {
    pub scope: PathBuf,

    /// Include files in all subdirectories.
    #[arg(long, short)]
    pub recursive: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Version,
    Size,
    Modified,
}

impl From<SortKey> for AssetSort {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Name => AssetSort::Name,
            SortKey::Version => AssetSort::Version,
            SortKey::Size => AssetSort::Size,
            SortKey::Modified => AssetSort::Modified,
        }
    }
}

// Projects are created with `create project`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Folder,
    Taskarea,
    Task,
}

impl From<KindArg> for NodeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Folder => NodeKind::Folder,
            KindArg::Taskarea => NodeKind::TaskArea,
            KindArg::Task => NodeKind::Task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assets_args() {
        let cli = Cli::try_parse_from(["studiotools", "assets", "shots", "--sort", "version", "--asc", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Assets(args) => {
                assert_eq!(args.path, Some(PathBuf::from("shots")));
                assert_eq!(AssetSort::from(args.sort), AssetSort::Version);
                assert!(args.asc);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_folder() {
        let cli = Cli::try_parse_from([
            "studiotools", "create", "folder", "build/chair", "--kind", "taskarea", "--subkind", "asset",
        ])
        .unwrap();
        let Commands::Create(CreateArgs { command: CreateCommands::Folder { path, kind, subkind } }) = cli.command
        else {
            panic!("expected create folder");
        };
        assert_eq!(path, PathBuf::from("build/chair"));
        assert_eq!(NodeKind::from(kind), NodeKind::TaskArea);
        assert_eq!(subkind.as_deref(), Some("asset"));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

use std::path::Path;

use anyhow::{Context as _, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use studiotools_core::application::{launch_command, load_project_applications};
use studiotools_core::format::{format_age, format_file_size, format_version};
use studiotools_core::storage::{
    self, classify, list_children, scan_tree, Asset, NodeKind, TaskFile, TreeNode,
};
use tracing::{info, warn};

use crate::cli::{
    AssetsArgs, CreateArgs, CreateCommands, DeleteArgs, FilesArgs, LsArgs, NewFileArgs,
    NextVersionArgs, PublishArgs, TreeArgs,
};
use crate::AppContext;

pub async fn handle_context(cx: &AppContext) -> Result<()> {
    let context = &cx.context;
    if context.project.is_empty() {
        println!("Project: {}", style("none").dim());
    } else {
        println!("Project: {} ({})", style(&context.project.name).bold(), context.project.path.display());
    }
    let classification = classify(&context.cwd).await;
    println!("Cwd:     {} [{} / {}]", context.cwd.display(), classification.kind, classification.subkind);
    Ok(())
}

pub async fn handle_ls(args: LsArgs, cx: &AppContext) -> Result<()> {
    let path = cx.resolve(args.path.as_deref());
    let node = TreeNode::load(&path).await;
    for child in list_children(&node).await {
        println!("{}", node_row(&child));
    }
    Ok(())
}

pub async fn handle_tree(args: TreeArgs, cx: &AppContext) -> Result<()> {
    let root = match args.path.as_deref() {
        Some(path) => cx.resolve(Some(path)),
        None if !cx.context.project.is_empty() => cx.context.project.path.clone(),
        None => cx.context.cwd.clone(),
    };
    let tree = scan_tree(&root).await;
    print_tree(&tree, 0);
    Ok(())
}

fn print_tree(node: &TreeNode, depth: usize) {
    println!("{}{}", "  ".repeat(depth), node_row(node));
    for child in node.children.iter().flatten() {
        print_tree(child, depth + 1);
    }
}

fn node_row(node: &TreeNode) -> String {
    let marker = if node.has_children { "+" } else { " " };
    let label = match node.kind {
        NodeKind::Task => style(&node.label).green(),
        NodeKind::TaskArea => style(&node.label).cyan(),
        NodeKind::Project => style(&node.label).bold(),
        NodeKind::Folder => style(&node.label),
    };
    format!("{} {} {}", marker, label, style(format!("({}/{})", node.kind, node.subkind)).dim())
}

pub async fn handle_assets(args: AssetsArgs, cx: &AppContext) -> Result<()> {
    let path = cx.resolve(args.path.as_deref());
    let mut assets = storage::list_assets(&path).await;
    storage::sort_assets(&mut assets, args.sort.into(), args.asc);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&assets)?);
        return Ok(());
    }
    if assets.is_empty() {
        println!("No assets found under {}", path.display());
    }
    for asset in &assets {
        println!("{}", asset_row(asset));
    }
    Ok(())
}

fn asset_row(asset: &Asset) -> String {
    let published = if asset.published { style("published").green().to_string() } else { String::new() };
    format!(
        "{:<24} {:>5} {:>10} {:>16} {:<8} {}",
        asset.name,
        format_version(asset.version),
        format_file_size(asset.size),
        asset.modified.map(format_age).unwrap_or_else(|| "-".to_string()),
        asset.asset_type,
        published,
    )
}

pub async fn handle_files(args: FilesArgs, cx: &AppContext) -> Result<()> {
    let task = cx.resolve(args.path.as_deref());
    if classify(&task).await.kind != NodeKind::Task {
        warn!("{} is not a task folder", task.display());
    }
    let mut files = storage::list_task_files(&task).await;
    storage::sort_task_files(&mut files, args.sort.into(), args.asc);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }
    for file in &files {
        println!("{}", file_row(file));
    }
    Ok(())
}

fn file_row(file: &TaskFile) -> String {
    format!(
        "{:<24} {:>5} {:>10} {:>16} {}",
        file.name,
        format_version(file.version),
        format_file_size(file.size),
        file.modified.map(format_age).unwrap_or_else(|| "-".to_string()),
        style(file.app.as_deref().unwrap_or("")).dim(),
    )
}

pub async fn handle_publish(args: PublishArgs, cx: &AppContext) -> Result<()> {
    let entry = cx.resolve(Some(&args.entry));
    let asset = storage::read_asset(&entry)
        .await
        .with_context(|| format!("{} is not an asset version (missing metadata.yaml?)", entry.display()))?;

    storage::publish(&asset)
        .await
        .with_context(|| format!("Failed to publish {}", entry.display()))?;
    println!("Published {} {}", style(&asset.name).bold(), format_version(asset.version));
    Ok(())
}

pub async fn handle_create(args: CreateArgs, cx: &AppContext) -> Result<()> {
    match args.command {
        CreateCommands::Project { name, path } => {
            let path = cx.resolve(Some(&path));
            let project = storage::create_project(&name, &path)
                .await
                .with_context(|| format!("Failed to create project at {}", path.display()))?;
            println!("Project '{}' created at {}", project.name, project.path.display());
        }
        CreateCommands::Folder { path, kind, subkind } => {
            let path = cx.resolve(Some(&path));
            let kind = NodeKind::from(kind);
            let subkind = subkind.unwrap_or_else(|| storage::DEFAULT_SUBKIND.to_string());

            if tokio::fs::try_exists(&path).await? {
                anyhow::bail!("{} already exists", path.display());
            }
            let parent = path
                .parent()
                .with_context(|| format!("{} has no parent directory", path.display()))?;
            let parent_class = classify(parent).await;
            if !parent_class.kind.child_kinds().contains(&kind) {
                anyhow::bail!("A {} cannot be created inside a {}", kind, parent_class.kind);
            }
            let offered = storage::subkind_options(parent_class.kind, &parent_class.subkind);
            if !offered.contains(&subkind.as_str()) {
                warn!("Subkind '{}' is not one of the usual choices here: {}", subkind, offered.join(", "));
            }

            storage::create_folder(&path, kind, &subkind)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            println!("Created {} '{}' at {}", kind, subkind, path.display());
        }
    }
    Ok(())
}

pub async fn handle_new_file(args: NewFileArgs, cx: &AppContext) -> Result<()> {
    let apps = load_project_applications(&cx.context.project).await;
    let app = apps
        .iter()
        .find(|app| app.id == args.app)
        .with_context(|| format!("No application '{}' in the project's apps.yaml", args.app))?;
    if !app.enabled {
        anyhow::bail!("Application '{}' is disabled", app.display_name());
    }

    let file = storage::create_task_file(app, &cx.context).await?;
    println!("{}", file.display());

    if args.launch {
        info!("Launching {} on {}", app.display_name(), file.display());
        launch_command(app, &file, &cx.context)
            .spawn()
            .with_context(|| format!("Failed to launch {}", app.executable.display()))?;
    }
    Ok(())
}

pub async fn handle_delete(args: DeleteArgs, cx: &AppContext) -> Result<()> {
    let path = cx.resolve(Some(&args.path));
    let kind = classify(&path).await.kind;
    if !kind.is_deletable() {
        anyhow::bail!("Refusing to delete {}: {} folders cannot be deleted", path.display(), kind);
    }

    if !args.yes && !confirm_delete(&path).await? {
        println!("Aborted.");
        return Ok(());
    }

    storage::delete_entry(&path).await?;
    println!("Deleted {}", path.display());
    Ok(())
}

async fn confirm_delete(path: &Path) -> Result<bool> {
    let prompt = format!("Delete {} and everything inside it?", path.display());
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    })
    .await
    .context("Blocking task failed (panic)")??;
    Ok(answer)
}

pub async fn handle_next_version(args: NextVersionArgs, cx: &AppContext) -> Result<()> {
    let scope = cx.resolve(Some(&args.scope));
    let version = storage::next_global_version(&scope, args.recursive).await;
    println!("{}", format_version(version));
    Ok(())
}

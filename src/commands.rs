// Command table and handlers. Each handler receives the API client
// explicitly and performs at most two calls: a listing to resolve the
// ephemeral number, then the action itself.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::api::ApiClient;
use crate::error::Error;
use crate::task::Task;
use crate::ui;

#[derive(Debug, Parser)]
#[command(name = "to-do", version, about = "Microsoft To-Do client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Override the settings directory (mostly for testing purposes)
    #[arg(long = "config-dir", env = "TODO_CONFIG_DIR", hide = true, global = true)]
    pub config_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add new to-do item
    #[command(alias = "a")]
    Add(AddArgs),
    /// Show to-do items
    #[command(alias = "l")]
    List(ListArgs),
    /// Show specified to-do item
    #[command(alias = "s")]
    Show(ShowArgs),
    /// Delete specified to-do item
    #[command(alias = "d")]
    Delete(TargetArgs),
    /// Mark the specified to-do item as done
    #[command(alias = "c")]
    Done(TargetArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Subject of the new item
    pub subject: String,
    /// Optional body text
    pub body: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Number shown by `list`
    pub number: String,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Number shown by `list`
    pub number: String,
}

/// Where handlers write their output.
pub struct Output<'a> {
    pub out: &'a mut dyn Write,
    pub color: bool,
}

pub fn run(api: &ApiClient, command: Command, output: &mut Output<'_>) -> Result<()> {
    match command {
        Command::Add(args) => add(api, args),
        Command::List(args) => list(api, args, output),
        Command::Show(args) => show(api, args, output),
        Command::Delete(args) => delete(api, args),
        Command::Done(args) => done(api, args),
    }
}

fn add(api: &ApiClient, args: AddArgs) -> Result<()> {
    let body = args.body.as_deref().filter(|b| !b.is_empty());
    let task = Task::new(&args.subject, body);
    api.create_task(&task).context("Failed to add item")
}

fn list(api: &ApiClient, args: ListArgs, output: &mut Output<'_>) -> Result<()> {
    let tasks = api.list_tasks().context("Failed to list items")?;
    if args.json {
        ui::render_json(output.out, &tasks)?;
    } else {
        ui::render_list(output.out, &tasks, output.color)?;
    }
    Ok(())
}

fn show(api: &ApiClient, args: ShowArgs, output: &mut Output<'_>) -> Result<()> {
    let tasks = api.list_tasks().context("Failed to list items")?;
    let task = select(&tasks, &args.number)?;
    if args.json {
        ui::render_json(output.out, task)?;
    } else {
        ui::render_task(output.out, task)?;
    }
    Ok(())
}

fn delete(api: &ApiClient, args: TargetArgs) -> Result<()> {
    let tasks = api.list_tasks().context("Failed to list items")?;
    let task = select(&tasks, &args.number)?;
    log::debug!("deleting '{}'", task.subject());
    api.delete_task(task).context("Failed to delete item")
}

fn done(api: &ApiClient, args: TargetArgs) -> Result<()> {
    let tasks = api.list_tasks().context("Failed to list items")?;
    let task = select(&tasks, &args.number)?;
    log::debug!("completing '{}'", task.subject());
    api.complete_task(task).context("Failed to complete item")
}

/// Resolve a number printed by `list` against the same listing. Valid
/// numbers are `1..=tasks.len()`.
pub fn select<'a>(tasks: &'a [Task], number: &str) -> Result<&'a Task, Error> {
    let n: usize = number
        .trim()
        .parse()
        .map_err(|_| Error::InvalidIdentifier(number.to_string()))?;
    if n == 0 {
        return Err(Error::InvalidIdentifier(number.to_string()));
    }
    tasks
        .get(n - 1)
        .ok_or_else(|| Error::InvalidIdentifier(number.to_string()))
}

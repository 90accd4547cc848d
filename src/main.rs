use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use recipe_box::config::{default_config_yaml, load_effective_config};
use recipe_box::query::SearchQuery;
use recipe_box::store::{RecipeInput, RecipeStore};
use recipe_box::tags::flatten_forest;
use recipe_box::{CatalogError, RecipeId, TagId, logging};
use serde_json::{Value, json};

const STORAGE_DIR: &str = ".recipe-box";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(value: CatalogError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<recipe_box::config::ConfigError> for CliError {
    fn from(value: recipe_box::config::ConfigError) -> Self {
        Self::new("config_error", value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "recipe-box")]
#[command(about = "A local recipe catalogue with hierarchical tags")]
struct Cli {
    #[arg(long, global = true)]
    global: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init,
    #[command(subcommand)]
    Tags(TagCommand),
    Add(RecipeArgs),
    Update(UpdateArgs),
    Rm(IdArgs),
    Show(IdArgs),
    Search(SearchArgs),
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    List(TagListArgs),
    Add(TagAddArgs),
    Rm(IdArgs),
    Usage(IdArgs),
    Mv(TagMoveArgs),
}

#[derive(Args, Debug)]
struct IdArgs {
    id: String,
}

#[derive(Args, Debug)]
struct TagListArgs {
    #[arg(long)]
    flat: bool,
}

#[derive(Args, Debug)]
struct TagAddArgs {
    name: String,
    #[arg(long)]
    parent: Option<String>,
}

#[derive(Args, Debug)]
struct TagMoveArgs {
    id: String,
    #[arg(long)]
    parent: Option<String>,
}

#[derive(Args, Debug)]
struct RecipeArgs {
    #[arg(long)]
    stdin: bool,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    ingredients: Option<String>,
    #[arg(long)]
    instructions: Option<String>,
    #[arg(long)]
    prep_time: Option<i64>,
    #[arg(long)]
    cook_time: Option<i64>,
    #[arg(long)]
    servings: Option<i64>,
    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: String,
    #[command(flatten)]
    recipe: RecipeArgs,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    text: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoragePaths {
    root: PathBuf,
    repo_config: PathBuf,
    user_config: PathBuf,
    home: PathBuf,
    mode: StorageMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageMode {
    RepoLocal,
    Global,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?;
    let paths = storage_paths(&cwd, cli.global)?;
    match cli.command {
        Command::Init => cmd_init(&cwd, &paths),
        command => {
            require_initialized_paths(&paths)?;
            let store = open_store(&cwd, &paths)?;
            dispatch(&store, command)
        }
    }
}

fn dispatch(store: &RecipeStore, command: Command) -> Result<(), CliError> {
    match command {
        Command::Init => Ok(()),
        Command::Tags(command) => cmd_tags(store, command),
        Command::Add(args) => cmd_add(store, args),
        Command::Update(args) => cmd_update(store, args),
        Command::Rm(args) => cmd_rm(store, args),
        Command::Show(args) => cmd_show(store, args),
        Command::Search(args) => cmd_search(store, args),
    }
}

fn cmd_init(cwd: &Path, paths: &StoragePaths) -> Result<(), CliError> {
    fs::create_dir_all(&paths.root).map_err(|err| CliError::io("mkdir_error", err))?;
    write_default_config(paths)?;
    let config = load_effective_config(
        cwd,
        &paths.root,
        Some(&paths.repo_config),
        Some(&paths.user_config),
        &paths.home,
    )?;
    let _ = RecipeStore::open(&config.database, config.busy_timeout)?;

    print_json(&json!({
        "status": "ok",
        "storage_dir": paths.root,
        "database": config.database,
        "mode": match paths.mode {
            StorageMode::RepoLocal => "repo",
            StorageMode::Global => "global",
        },
    }))
}

fn open_store(cwd: &Path, paths: &StoragePaths) -> Result<RecipeStore, CliError> {
    let config = load_effective_config(
        cwd,
        &paths.root,
        Some(&paths.repo_config),
        Some(&paths.user_config),
        &paths.home,
    )?;
    logging::init(&config.log_level)
        .map_err(|err| CliError::new("logger_error", err.to_string()))?;
    Ok(RecipeStore::open(&config.database, config.busy_timeout)?)
}

fn cmd_tags(store: &RecipeStore, command: TagCommand) -> Result<(), CliError> {
    match command {
        TagCommand::List(args) => {
            if args.flat {
                let tags = store.list_tags_flat()?;
                return print_json(&json!({ "tags": tags }));
            }
            let forest = store.list_tags()?;
            let reachable = flatten_forest(&forest).len();
            print_json(&json!({
                "tags": forest,
                "reachable_count": reachable,
            }))
        }
        TagCommand::Add(args) => {
            let parent = parse_optional_tag_id(args.parent.as_deref())?;
            let tag = store.create_tag(&args.name, parent)?;
            print_json(&json!({ "status": "ok", "tag": tag }))
        }
        TagCommand::Rm(args) => {
            let id: TagId = args.id.parse()?;
            let report = store.delete_tag(id)?;
            print_json(&json!({ "status": "ok", "report": report }))
        }
        TagCommand::Usage(args) => {
            let id: TagId = args.id.parse()?;
            let recipes = store.tag_usage(id)?;
            print_json(&json!({
                "tag_id": id,
                "count": recipes.len(),
                "recipes": recipes,
            }))
        }
        TagCommand::Mv(args) => {
            let id: TagId = args.id.parse()?;
            let parent = parse_optional_tag_id(args.parent.as_deref())?;
            let tag = store.move_tag(id, parent)?;
            print_json(&json!({ "status": "ok", "tag": tag }))
        }
    }
}

fn cmd_add(store: &RecipeStore, args: RecipeArgs) -> Result<(), CliError> {
    let input = recipe_input(args)?;
    let id = store.create_recipe(&input)?;
    print_json(&json!({ "status": "ok", "id": id }))
}

fn cmd_update(store: &RecipeStore, args: UpdateArgs) -> Result<(), CliError> {
    let id: RecipeId = args.id.parse()?;
    let input = recipe_input(args.recipe)?;
    store.update_recipe(id, &input)?;
    print_json(&json!({ "status": "ok", "id": id }))
}

fn cmd_rm(store: &RecipeStore, args: IdArgs) -> Result<(), CliError> {
    let id: RecipeId = args.id.parse()?;
    store.delete_recipe(id)?;
    print_json(&json!({ "status": "ok", "id": id }))
}

fn cmd_show(store: &RecipeStore, args: IdArgs) -> Result<(), CliError> {
    let id: RecipeId = args.id.parse()?;
    let recipe = store.get_recipe(id)?;
    print_json(&json!({ "recipe": recipe }))
}

fn cmd_search(store: &RecipeStore, args: SearchArgs) -> Result<(), CliError> {
    let query = SearchQuery {
        text: args.text,
        tags: args.tags,
    };
    let recipes = store.search(&query)?;
    print_json(&json!({
        "count": recipes.len(),
        "recipes": recipes,
    }))
}

fn recipe_input(args: RecipeArgs) -> Result<RecipeInput, CliError> {
    let has_field_flags = args.title.is_some()
        || args.description.is_some()
        || args.ingredients.is_some()
        || args.instructions.is_some()
        || args.prep_time.is_some()
        || args.cook_time.is_some()
        || args.servings.is_some()
        || !args.tags.is_empty();
    if args.stdin && has_field_flags {
        return Err(CliError::new(
            "invalid_recipe_args",
            "use either `--stdin` with a JSON recipe or field flags, not both",
        ));
    }

    if args.stdin {
        let mut stdin_buf = String::new();
        io::stdin()
            .read_to_string(&mut stdin_buf)
            .map_err(|err| CliError::io("stdin_error", err))?;
        return Ok(serde_json::from_str(&stdin_buf)?);
    }

    Ok(RecipeInput {
        title: args.title.unwrap_or_default(),
        description: args.description,
        ingredients: args.ingredients.unwrap_or_default(),
        instructions: args.instructions.unwrap_or_default(),
        prep_time: args.prep_time,
        cook_time: args.cook_time,
        servings: args.servings,
        tags: args.tags,
    })
}

fn parse_optional_tag_id(raw: Option<&str>) -> Result<Option<TagId>, CliError> {
    match raw {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}

fn storage_paths(cwd: &Path, global: bool) -> Result<StoragePaths, CliError> {
    let home = home_dir()?;
    let (root, mode) = if global {
        (home.join(STORAGE_DIR), StorageMode::Global)
    } else {
        (cwd.join(STORAGE_DIR), StorageMode::RepoLocal)
    };

    Ok(StoragePaths {
        repo_config: cwd.join(STORAGE_DIR).join(CONFIG_FILE),
        user_config: home.join(STORAGE_DIR).join(CONFIG_FILE),
        root,
        home,
        mode,
    })
}

fn require_initialized_paths(paths: &StoragePaths) -> Result<(), CliError> {
    if !paths.root.exists() {
        return Err(CliError::new(
            "not_initialized",
            "recipe box is not initialized; run `recipe-box init`",
        ));
    }
    Ok(())
}

fn write_default_config(paths: &StoragePaths) -> Result<(), CliError> {
    let config_path = match paths.mode {
        StorageMode::RepoLocal => &paths.repo_config,
        StorageMode::Global => &paths.user_config,
    };
    if config_path.exists() {
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|err| CliError::io("mkdir_error", err))?;
    }
    fs::write(config_path, default_config_yaml()).map_err(|err| CliError::io("write_error", err))
}

fn home_dir() -> Result<PathBuf, CliError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| CliError::new("home_error", "HOME environment variable is not set"))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

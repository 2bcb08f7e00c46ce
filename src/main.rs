use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use once_cell::unsync::OnceCell;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plugbot::application::errors::{BotError, BotResult, ConfigError, TransportError};
use plugbot::application::messaging::{Inbox, InboxWorker};
use plugbot::application::services::Settings;
use plugbot::domain::entities::{Contact, SettingKey, SCOPE_SEPARATOR};
use plugbot::domain::traits::Transport;
use plugbot::infrastructure::adapters::ConsoleAdapter;
use plugbot::infrastructure::config::Config;
use plugbot::infrastructure::database::Database;
use plugbot::plugins::{self, builtin::admin::banned_list};
use plugbot::Bot;

#[derive(Parser)]
#[command(name = "plugbot")]
#[command(about = "A plugin-oriented chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Database path (overrides config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log level or filter directives (overrides config and RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the bot account
    Init {
        /// Address of the bot account
        addr: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Show account and bot information
    Info,
    /// Start the bot and read console messages from stdin
    Serve,
    /// List, enable or disable plugins
    Plugin(PluginArgs),
    /// Set the bot display name
    SetName { name: String },
    /// Set the bot status text
    SetStatus { text: String },
    /// Show or set a low level account config value
    SetConfig { key: String, value: Option<String> },
    /// Manage administrators
    Admin(AdminArgs),
    /// Ban a contact
    Ban { addr: String },
    /// Unban a contact
    Unban { addr: String },
    /// List banned contacts
    ListBanned,
    /// Inspect and edit the settings store
    Db(DbArgs),
    /// Show version
    Version,
    /// Print the default config
    InitConfig,
}

#[derive(Args)]
#[group(multiple = false)]
struct PluginArgs {
    /// List registered plugins
    #[arg(long)]
    list: bool,
    /// Enable bundled plugins
    #[arg(long, num_args = 1.., value_name = "NAME")]
    add: Vec<String>,
    /// Disable plugins
    #[arg(long, num_args = 1.., value_name = "NAME")]
    del: Vec<String>,
}

#[derive(Args)]
#[group(multiple = false)]
struct AdminArgs {
    #[arg(long, value_name = "ADDR")]
    add: Option<String>,
    #[arg(long, value_name = "ADDR")]
    del: Option<String>,
    /// List administrators, also what happens without a flag
    #[arg(long)]
    #[allow(dead_code)]
    list: bool,
}

#[derive(Args)]
#[group(multiple = false)]
struct DbArgs {
    /// List settings, optionally of one scope only
    #[arg(long, value_name = "SCOPE", num_args = 0..=1)]
    list: Option<Option<String>>,
    #[arg(long, value_name = "SCOPE/KEY")]
    get: Option<String>,
    #[arg(long, num_args = 2, value_names = ["SCOPE/KEY", "VALUE"])]
    set: Option<Vec<String>>,
    #[arg(long, value_name = "SCOPE/KEY")]
    del: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => fail(e.into()),
    };
    if let Some(database) = &cli.database {
        config.bot.database = database.clone();
    }

    init_logging(cli.log_level.as_deref().or(config.logging.level.as_deref()));

    if let Err(e) = run(cli.command, config) {
        fail(e);
    }
}

fn fail(e: BotError) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Shared state of one CLI invocation. The database opens on first use.
struct App {
    config: Config,
    db: OnceCell<Arc<Database>>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> BotResult<Arc<Database>> {
        let db = self
            .db
            .get_or_try_init(|| Database::new(&self.config.bot.database).map(Arc::new))?;
        Ok(db.clone())
    }

    fn settings(&self) -> BotResult<Settings> {
        Ok(Settings::new(self.db()?))
    }

    /// Open the console account, pinning what the `account` config section sets.
    fn adapter(&self) -> BotResult<Arc<ConsoleAdapter>> {
        let sender = Contact::new(self.config.console.sender.clone());
        let adapter = ConsoleAdapter::new(self.settings()?, sender)?;
        for (key, value) in self.config.account.overrides() {
            if adapter.get_config(key).as_deref() != Some(value) {
                info!("applying account {} from config", key);
                adapter.set_config(key, value)?;
            }
        }
        Ok(Arc::new(adapter))
    }

    /// Assemble the bot with the built-ins and every enabled bundled plugin.
    fn bot(&self) -> BotResult<(Arc<ConsoleAdapter>, Arc<Bot>)> {
        let adapter = self.adapter()?;
        let mut builder = Bot::builder(adapter.clone(), self.db()?);
        for name in plugins::enabled(&self.settings()?, &self.config.plugins.enabled)? {
            match plugins::bundled(&name) {
                Some(plugin) => builder = builder.plugin(name, plugin),
                None => warn!("unknown plugin {:?} is enabled, skipping it", name),
            }
        }
        Ok((adapter, builder.build()?))
    }
}

fn run(command: Commands, config: Config) -> BotResult<()> {
    let app = App::new(config);
    match command {
        Commands::Init { addr, name } => {
            if !addr.contains('@') {
                return Err(BotError::InvalidAddress(addr));
            }
            let adapter = app.adapter()?;
            adapter.set_config("addr", &addr)?;
            if let Some(name) = name {
                adapter.set_config("displayname", &name)?;
            }
            println!("account {} configured", addr);
        }
        Commands::Info => {
            let (adapter, bot) = app.bot()?;
            println!("{:<20} {}", "bot name", app.config.bot.name);
            if let Some(path) = bot.database().path() {
                println!("{:<20} {}", "database", path.display());
            }
            for (key, value) in adapter.info() {
                println!("{:<20} {}", key, value);
            }
        }
        Commands::Serve => serve(&app)?,
        Commands::Plugin(args) => plugin(&app, args)?,
        Commands::SetName { name } => app.adapter()?.set_config("displayname", &name)?,
        Commands::SetStatus { text } => app.adapter()?.set_config("selfstatus", &text)?,
        Commands::SetConfig { key, value } => {
            let adapter = app.adapter()?;
            match value {
                Some(value) => adapter.set_config(&key, &value)?,
                None => println!(
                    "{}={}",
                    key,
                    adapter.get_config(&key).as_deref().unwrap_or("None")
                ),
            }
        }
        Commands::Admin(args) => {
            let (_, bot) = app.bot()?;
            if let Some(addr) = &args.add {
                bot.add_admin(addr)?;
                println!("{} added to administrators", addr);
            } else if let Some(addr) = &args.del {
                bot.del_admin(addr)?;
                println!("{} removed from administrators", addr);
            } else {
                let admins = bot.admins()?;
                if admins.is_empty() {
                    println!("Administrators:\n(Empty list)");
                } else {
                    println!("Administrators:\n{}", admins.join("\n"));
                }
            }
        }
        Commands::Ban { addr } => {
            let (_, bot) = app.bot()?;
            bot.ban(&addr)?;
            println!("{} banned", addr);
        }
        Commands::Unban { addr } => {
            let (_, bot) = app.bot()?;
            bot.unban(&addr)?;
            println!("{} unbanned", addr);
        }
        Commands::ListBanned => {
            let (_, bot) = app.bot()?;
            println!("{}", banned_list(&bot));
        }
        Commands::Db(args) => db(&app, args)?,
        Commands::Version => println!("plugbot v{}", env!("CARGO_PKG_VERSION")),
        Commands::InitConfig => {
            println!("{}", Config::default().to_yaml()?);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
    }
    Ok(())
}

fn plugin(app: &App, args: PluginArgs) -> BotResult<()> {
    let settings = app.settings()?;
    let defaults = &app.config.plugins.enabled;

    for name in &args.add {
        if plugins::enable(&settings, defaults, name)? {
            println!("plugin {:?} enabled", name);
        } else {
            println!("plugin {:?} already enabled", name);
        }
    }
    for name in &args.del {
        if plugins::disable(&settings, defaults, name)? {
            println!("plugin {:?} disabled", name);
        } else {
            return Err(BotError::NotFound(format!("enabled plugin {:?}", name)));
        }
    }

    if args.list || (args.add.is_empty() && args.del.is_empty()) {
        let (_, bot) = app.bot()?;
        for (name, description) in bot.plugins().list() {
            println!("{:<12} {}", name, description);
        }
        let available: Vec<&str> = plugins::BUNDLED
            .iter()
            .copied()
            .filter(|name| !bot.plugins().contains(name))
            .collect();
        if !available.is_empty() {
            println!("\nAvailable: {}", available.join(", "));
        }
    }
    Ok(())
}

fn parse_key(raw: &str) -> BotResult<SettingKey> {
    SettingKey::parse(raw).map_err(|e| BotError::from(ConfigError::InvalidValue(e)))
}

fn db(app: &App, args: DbArgs) -> BotResult<()> {
    let settings = app.settings()?;

    if let Some(raw) = args.get {
        let value = settings.get(&parse_key(&raw)?)?;
        println!("{}", value.as_deref().unwrap_or("None"));
    } else if let Some(pair) = args.set {
        if let [raw, value] = pair.as_slice() {
            let key = parse_key(raw)?;
            let old = settings.set(&key, value)?;
            println!("old: {}={}", key, old.as_deref().unwrap_or("None"));
            println!("new: {}={}", key, value);
        }
    } else if let Some(raw) = args.del {
        let key = parse_key(&raw)?;
        match settings.delete(&key)? {
            Some(old) => println!("deleted {}={}", key, old),
            None => return Err(BotError::NotFound(format!("setting {}", key))),
        }
    } else {
        let scope = args.list.flatten();
        if let Some(scope) = scope.as_deref().filter(|s| s.contains(SCOPE_SEPARATOR)) {
            return Err(ConfigError::InvalidValue(format!("invalid scope {:?}", scope)).into());
        }
        let entries = settings.list(scope.as_deref())?;
        if entries.is_empty() {
            println!("no settings");
        }
        for (key, value) in entries {
            println!("{}={}", key, value);
        }
    }
    Ok(())
}

fn serve(app: &App) -> BotResult<()> {
    let (adapter, bot) = app.bot()?;
    bot.start()?;

    let mut worker = InboxWorker::start(bot.clone(), app.config.shutdown_timeout())?;
    let inbox = bot.inbox();

    let runtime = tokio::runtime::Runtime::new().map_err(TransportError::Io)?;
    let result = runtime.block_on(console_loop(&adapter, &inbox));

    worker.stop();
    bot.shutdown();
    result
}

async fn console_loop(adapter: &ConsoleAdapter, inbox: &Inbox) -> BotResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!(
        "type messages as {}, Ctrl-C or EOF to stop",
        adapter.sender().address
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.map_err(TransportError::Io)? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let id = adapter.receive(&line);
                if let Err(e) = inbox.incoming_message(id) {
                    warn!("failed to queue message id={}: {}", id, e);
                }
            }
        }
    }
    Ok(())
}

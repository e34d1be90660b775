use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::backend::{Backend, BackendRegistry, ConnectionParams, Role};
use crate::config::Config;
use crate::core::Result;
use crate::credentials::Credentials;
use crate::forward::{forwards_table, ForwardStore, Setup};
use crate::postfix::{LookupConfig, Postconf};
use crate::prompt::read_password;

/// Account used by `setup` when no `--user` is given.
pub const DEFAULT_ADMIN_USER: &str = "root";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Manage database-backed postfix mail forwarding."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database backend (overrides the configuration).
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Database user (admin for `setup`, otherwise the role's account).
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Database password; prompted for when missing.
    #[arg(long, short = 'p', global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database, forwards table, accounts and lookup files.
    Setup {
        /// Password for the read-only lookup account.
        #[arg(long)]
        viewer_password: Option<String>,
        /// Password for the editing account.
        #[arg(long)]
        editor_password: Option<String>,
        /// Do not point postfix at the new lookup table.
        #[arg(long)]
        no_postconf: bool,
    },
    /// Forward SOURCE to DESTINATION, replacing any existing forward.
    Add { source: String, destination: String },
    /// Stop forwarding SOURCE.
    Remove { source: String },
    /// List forwards.
    List {
        /// Only show the forward for this address.
        #[arg(long)]
        source: Option<String>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Apply a single `key = value` setting to postfix's main.cf.
    Postconf { key: String, value: String },
    /// Print a postfix lookup-table file for the viewer account.
    LookupConfig {
        #[arg(long)]
        table: String,
        #[arg(long)]
        result_column: String,
        #[arg(long)]
        match_column: String,
    },
}

/// Everything resolved once at start and shared by the commands.
struct Context {
    config: Config,
    credentials: Credentials,
    registry: BackendRegistry,
    backend: String,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let credentials = Credentials::load(&config.postfix.conf_dir);
        let backend = cli
            .backend
            .clone()
            .unwrap_or_else(|| config.database.backend.clone());
        Ok(Context {
            config,
            credentials,
            registry: BackendRegistry::with_defaults(),
            backend,
        })
    }

    fn params(&self, role: Role, user: Option<&str>, password: Option<&str>) -> Result<ConnectionParams> {
        ConnectionParams::for_role(
            role,
            &self.credentials,
            &self.config.database.host,
            user,
            password,
            &mut |prompt: &str| read_password(prompt),
        )
    }

    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Backend>> {
        self.registry.create(&self.backend, params, &self.config)
    }

    fn postconf(&self) -> Postconf {
        Postconf::new(self.config.postfix.postconf.clone())
    }
}

/// Executes the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::load(&cli)?;
    let user = cli.user.as_deref();
    let password = cli.password.as_deref();
    let database = ctx.credentials.database().to_string();
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Setup {
            viewer_password,
            editor_password,
            no_postconf,
        } => {
            let admin_user = user.unwrap_or(DEFAULT_ADMIN_USER);
            let admin_password = match password {
                Some(password) => password.to_string(),
                None => read_password(&format!("Enter mysql password for {}:", admin_user))?,
            };
            let admin = ConnectionParams {
                host: ctx.config.database.host.clone(),
                user: admin_user.to_string(),
                password: admin_password,
                database: None,
            };
            let setup = Setup {
                database: database.clone(),
                viewer: ctx.params(Role::Viewer, None, viewer_password.as_deref())?,
                editor: ctx.params(Role::Editor, None, editor_password.as_deref())?,
                conf_dir: ctx.config.postfix.conf_dir.clone(),
            };
            let mut backend = ctx.open(&admin)?;
            let postconf = ctx.postconf();
            setup.run(backend.as_mut(), (!no_postconf).then_some(&postconf))?;
            info!("Setup of {} complete", database);
        }
        Commands::Add { source, destination } => {
            let mut backend = ctx.open(&ctx.params(Role::Editor, user, password)?)?;
            let table = forwards_table(backend.as_ref(), &database);
            ForwardStore::new(backend.as_mut(), table).add(source, destination)?;
        }
        Commands::Remove { source } => {
            let mut backend = ctx.open(&ctx.params(Role::Editor, user, password)?)?;
            let table = forwards_table(backend.as_ref(), &database);
            if !ForwardStore::new(backend.as_mut(), table).remove(source)? {
                writeln!(stdout, "No forward for {}", source)?;
            }
        }
        Commands::List { source, json } => {
            let mut backend = ctx.open(&ctx.params(Role::Viewer, user, password)?)?;
            let table = forwards_table(backend.as_ref(), &database);
            let forwards = ForwardStore::new(backend.as_mut(), table).list(source.as_deref())?;
            if *json {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&forwards)?)?;
            } else {
                for forward in forwards {
                    writeln!(stdout, "{} -> {}", forward.source, forward.destination)?;
                }
            }
        }
        Commands::Postconf { key, value } => {
            ctx.postconf().set(key, value)?;
        }
        Commands::LookupConfig {
            table,
            result_column,
            match_column,
        } => {
            let viewer = ctx.params(Role::Viewer, user, password)?;
            let lookup = LookupConfig {
                hosts: viewer.host,
                user: viewer.user,
                password: viewer.password,
                dbname: database,
                result_column: result_column.clone(),
                table: table.clone(),
                match_column: match_column.clone(),
            };
            write!(stdout, "{}", lookup.render())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from([
            "postfix-forward",
            "--backend",
            "sqlite",
            "add",
            "a@example.com",
            "b@example.org",
        ])
        .unwrap();
        assert_eq!(cli.backend.as_deref(), Some("sqlite"));
        match cli.command {
            Commands::Add { source, destination } => {
                assert_eq!(source, "a@example.com");
                assert_eq!(destination, "b@example.org");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["postfix-forward", "list", "--json", "-u", "postfix"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("postfix"));
        assert!(matches!(cli.command, Commands::List { json: true, source: None }));
    }

    #[test]
    fn test_lookup_config_requires_columns() {
        assert!(Cli::try_parse_from(["postfix-forward", "lookup-config", "--table", "forwards"]).is_err());
    }
}

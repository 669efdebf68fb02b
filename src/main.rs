use clap::Parser;
use keyrouter::cli::{
    budget, key, policy, handle_completions, handle_config_init, BudgetCommands, Cli, Commands,
    ConfigCommands, KeyCommands, PolicyCommands,
};
use keyrouter::config::RouterConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => keyrouter::cli::serve::run_serve(args).await,
        Commands::Key(cmd) => handle_key_command(cmd).await,
        Commands::Policy(cmd) => handle_policy_command(cmd),
        Commands::Budget(cmd) => handle_budget_command(cmd),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: &std::path::Path) -> RouterConfig {
    RouterConfig::load(Some(path)).unwrap_or_else(|_| RouterConfig::default())
}

async fn handle_key_command(cmd: KeyCommands) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match &cmd {
        KeyCommands::Register(a) => &a.config,
        KeyCommands::List(a) => &a.config,
        KeyCommands::Rotate(a) => &a.config,
        KeyCommands::Revoke(a) => &a.config,
    };
    let config = load_config(config_path);
    let stack = keyrouter::cli::serve::build_stack(&config)?;

    let output = match cmd {
        KeyCommands::Register(args) => key::handle_key_register(&args, &stack.key_manager).await?,
        KeyCommands::List(args) => key::handle_key_list(&args, &stack.key_manager).await?,
        KeyCommands::Rotate(args) => key::handle_key_rotate(&args, &stack.key_manager).await?,
        KeyCommands::Revoke(args) => key::handle_key_revoke(&args, &stack.key_manager).await?,
    };
    println!("{}", output);
    Ok(())
}

fn handle_policy_command(cmd: PolicyCommands) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match &cmd {
        PolicyCommands::Create(a) => &a.config,
        PolicyCommands::List(a) => &a.config,
        PolicyCommands::Delete(a) => &a.config,
    };
    let config = load_config(config_path);
    let stack = keyrouter::cli::serve::build_stack(&config)?;

    let output = match cmd {
        PolicyCommands::Create(args) => policy::handle_policy_create(&args, &stack.policy_engine)?,
        PolicyCommands::List(args) => policy::handle_policy_list(&args, &stack.policy_engine)?,
        PolicyCommands::Delete(args) => policy::handle_policy_delete(&args, &stack.policy_engine)?,
    };
    println!("{}", output);
    Ok(())
}

fn handle_budget_command(cmd: BudgetCommands) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match &cmd {
        BudgetCommands::Create(a) => &a.config,
        BudgetCommands::List(a) => &a.config,
        BudgetCommands::Delete(a) => &a.config,
    };
    let config = load_config(config_path);
    let stack = keyrouter::cli::serve::build_stack(&config)?;

    let output = match cmd {
        BudgetCommands::Create(args) => budget::handle_budget_create(&args, &stack.cost_controller)?,
        BudgetCommands::List(args) => budget::handle_budget_list(&args, &stack.cost_controller)?,
        BudgetCommands::Delete(args) => budget::handle_budget_delete(&args, &stack.cost_controller)?,
    };
    println!("{}", output);
    Ok(())
}

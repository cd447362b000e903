use clap::{Arg, ArgMatches, Command};
use log::{error, info};
use serde::Serialize;
use std::path::Path;
use std::process::exit;
use supervisor_rpc::{rpc::*, types::*};

fn print_json<T: Serialize>(value: &T) -> RpcResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(matches: ArgMatches) -> RpcResult<()> {
    // Required by clap, so always present.
    let config_path = matches.value_of("config").unwrap_or_default();
    let config = Config::load(Path::new(config_path))?;
    info!("connecting to {}", config.supervisor_address);
    let client = SupervisorClient::connect(config.supervisor_address.clone()).await?;
    let ctx = config.context();

    match matches.subcommand() {
        Some(("init-auth", _)) => print_json(&client.init_auth_sequence(&ctx, &(), &[]).await?),
        Some(("authenticate", args)) => {
            let request = Authentication {
                signed_nonce: tokio::fs::read(args.value_of("signed-nonce").unwrap_or_default())
                    .await?,
                identity_key: tokio::fs::read(args.value_of("identity-key").unwrap_or_default())
                    .await?,
            };
            print_json(&client.authenticate(&ctx, &request, &[]).await?)
        }
        Some(("get-config", _)) => print_json(&client.get_config(&ctx, &(), &[]).await?),
        Some(("set-config", args)) => {
            let config = tokio::fs::read_to_string(args.value_of("file").unwrap_or_default()).await?;
            let request = SetConfigRequest { config };
            print_json(&client.set_config(&ctx, &request, &[]).await?)
        }
        Some(("status", _)) => print_json(&client.status(&ctx, &(), &[]).await?),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = Command::new("supervisor-rpc")
        .version("0.1.0")
        .about("Talk to a KUBE supervisor")
        .arg(
            Arg::new("config")
                .short('c')
                .takes_value(true)
                .help("configuration file path")
                .required(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("init-auth").about("Obtain a nonce and the KUBE identity"))
        .subcommand(
            Command::new("authenticate")
                .about("Authenticate with a signed nonce")
                .arg(
                    Arg::new("signed-nonce")
                        .long("signed-nonce")
                        .takes_value(true)
                        .help("file containing the signed nonce")
                        .required(true),
                )
                .arg(
                    Arg::new("identity-key")
                        .long("identity-key")
                        .takes_value(true)
                        .help("file containing the identity public key")
                        .required(true),
                ),
        )
        .subcommand(Command::new("get-config").about("Print KUBE config"))
        .subcommand(
            Command::new("set-config")
                .about("Replace KUBE config")
                .arg(
                    Arg::new("file")
                        .takes_value(true)
                        .help("config document to upload")
                        .required(true),
                ),
        )
        .subcommand(Command::new("status").about("Print KUBE status and running services"))
        .get_matches();

    if let Err(err) = run(matches).await {
        error!("{}", err);
        exit(1);
    }
}

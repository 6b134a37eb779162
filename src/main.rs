use anyhow::Context;
use clap::Parser;
use lambda_connectors::adapters::discord::{DiscordChannel, DiscordConfig};
use lambda_connectors::adapters::dynamo::Dynamo;
use lambda_connectors::adapters::merkle::{build_filename, build_payload, MerkleContact, MerkleMeta};
use lambda_connectors::adapters::opus_health::OpusHealthPartnerInterface;
use lambda_connectors::adapters::teams::{TeamsConfig, TeamsWebhook};
use lambda_connectors::config::cli::{DiscordCommand, DynamoCommand, MerklePreviewArgs, TeamsArgs};
use lambda_connectors::config::required_env;
use lambda_connectors::utils::logger;
use lambda_connectors::{CliConfig, Command, FailureAlert, FailureNotifier, HandlerResponse};
use serde_json::Value;

async fn teams(args: TeamsArgs) -> lambda_connectors::Result<HandlerResponse> {
    let webhook = TeamsWebhook::new(TeamsConfig::new(args.webhook_url))?;
    let alert = FailureAlert {
        lambda_name: args.lambda_name,
        function_name: args.function_name,
        location: args.location,
        status: args.status,
        description: args.description,
        logs_link: args.logs_link,
    };
    webhook.notify(&alert).await?;
    Ok(HandlerResponse::success("Teams card sent"))
}

async fn discord(command: DiscordCommand) -> lambda_connectors::Result<HandlerResponse> {
    let channel = DiscordChannel::new(DiscordConfig::from_env()?)?;
    let body = match command {
        DiscordCommand::Post { content } => {
            channel
                .post_message_to_channel(&serde_json::json!({ "content": content }))
                .await?
        }
        DiscordCommand::List => channel.get_messages_from_channel().await?,
    };
    Ok(HandlerResponse::success(&body.to_string()))
}

async fn opus() -> lambda_connectors::Result<HandlerResponse> {
    let interface = OpusHealthPartnerInterface::from_env()?;
    let document_number = interface.next_document_number().await?;
    Ok(HandlerResponse::success(&document_number))
}

fn merkle_preview(args: MerklePreviewArgs) -> anyhow::Result<HandlerResponse> {
    let contact: MerkleContact = serde_json::from_str(
        &std::fs::read_to_string(&args.contact)
            .with_context(|| format!("reading {}", args.contact.display()))?,
    )?;
    let meta_json = match &args.meta {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => required_env("mrkle_meta")?,
    };
    let meta: MerkleMeta = serde_json::from_str(&meta_json)?;

    let captured_at = chrono::Local::now().naive_local();
    let payload = build_payload(&meta, &contact, &captured_at)?;
    println!("{}", build_filename(&meta, &captured_at));
    print!("{}", payload);
    Ok(HandlerResponse::success("preview only, nothing uploaded"))
}

async fn dynamo(command: DynamoCommand) -> lambda_connectors::Result<HandlerResponse> {
    let body = match command {
        DynamoCommand::Scan { table, status } => {
            let dynamo = Dynamo::from_env().await.with_table(&table);
            let items = match status {
                Some(status) => dynamo.filter_by_status(&status).await?,
                None => dynamo.get_all().await?,
            };
            Value::from(items.into_iter().map(Value::Object).collect::<Vec<_>>())
        }
        DynamoCommand::Get {
            table,
            key_name,
            key_value,
        } => {
            let dynamo = Dynamo::from_env().await.with_table(&table);
            dynamo
                .get_item(&key_name, key_value)
                .await?
                .map(Value::Object)
                .unwrap_or(Value::Null)
        }
    };
    Ok(HandlerResponse::success(&body.to_string()))
}

async fn run(command: Command) -> anyhow::Result<HandlerResponse> {
    let response = match command {
        Command::Teams(args) => teams(args).await?,
        Command::Discord(command) => discord(command).await?,
        Command::Opus => opus().await?,
        Command::MerklePreview(args) => merkle_preview(args)?,
        Command::Dynamo(command) => dynamo(command).await?,
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_lambda_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("CLI config: {:?}", config);

    let response = match run(config.command).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Command failed: {:#}", e);
            HandlerResponse::failure(&format!("{:#}", e))
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

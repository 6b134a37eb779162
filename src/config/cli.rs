use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "lambda-connectors")]
#[command(about = "Exercise the third-party connectors by hand")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log JSON lines instead of compact text")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send a failure card to a Teams incoming webhook
    Teams(TeamsArgs),

    /// Post to or read from a Discord channel
    #[command(subcommand)]
    Discord(DiscordCommand),

    /// Fetch the next OPUS Health document number
    Opus,

    /// Print the Merkle XML and filename for a contact JSON file
    MerklePreview(MerklePreviewArgs),

    /// Read from a DynamoDB table
    #[command(subcommand)]
    Dynamo(DynamoCommand),
}

#[derive(Debug, Clone, Args)]
pub struct TeamsArgs {
    #[arg(long, env = "TEAMS_WEBHOOK_URL")]
    pub webhook_url: String,

    #[arg(long, default_value = "manual-test")]
    pub lambda_name: String,

    #[arg(long, default_value = "handler")]
    pub function_name: String,

    #[arg(long, default_value = "us-east-1")]
    pub location: String,

    #[arg(long, default_value = "Failed")]
    pub status: String,

    #[arg(long, default_value = "Triggered from the command line")]
    pub description: String,

    #[arg(long, default_value = "https://console.aws.amazon.com/cloudwatch/home")]
    pub logs_link: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum DiscordCommand {
    /// Post a plain text message
    Post {
        #[arg(long)]
        content: String,
    },
    /// List recent messages
    List,
}

#[derive(Debug, Clone, Args)]
pub struct MerklePreviewArgs {
    /// Contact form JSON
    #[arg(long)]
    pub contact: PathBuf,

    /// Campaign metadata JSON; falls back to `mrkle_meta`
    #[arg(long)]
    pub meta: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum DynamoCommand {
    /// Scan every item, optionally filtered by status
    Scan {
        #[arg(long)]
        table: String,

        #[arg(long)]
        status: Option<String>,
    },
    /// Get one item by key
    Get {
        #[arg(long)]
        table: String,

        #[arg(long)]
        key_name: String,

        #[arg(long)]
        key_value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dynamo_get() {
        let cli = CliConfig::parse_from([
            "lambda-connectors",
            "--verbose",
            "dynamo",
            "get",
            "--table",
            "contacts",
            "--key-name",
            "email",
            "--key-value",
            "jane@site.com",
        ]);
        assert!(cli.verbose);
        assert!(!cli.json_logs);
        match cli.command {
            Command::Dynamo(DynamoCommand::Get { table, key_name, .. }) => {
                assert_eq!(table, "contacts");
                assert_eq!(key_name, "email");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_discord_post() {
        let cli = CliConfig::parse_from([
            "lambda-connectors",
            "discord",
            "post",
            "--content",
            "hello",
            "--json-logs",
        ]);
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Command::Discord(DiscordCommand::Post { ref content }) if content == "hello"
        ));
    }
}

// One module per vendor API. Each adapter builds a payload, performs one
// call and reports the outcome; none of them depend on each other.

pub mod http;

pub mod campaign_monitor;
pub mod discord;
pub mod dynamo;
pub mod epsilon;
pub mod marketo;
pub mod merkle;
pub mod notifications;
pub mod opus_health;
pub mod s3;
pub mod sendgrid;
pub mod ses;
pub mod teams;

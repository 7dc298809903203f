//! Outgoing email.
//!
//! Delivery sits behind [`Mailer`]. The default implementation writes each
//! message to the log, which is enough for development and for deployments
//! that forward logs to a relay.

use crate::{
	config::Config,
	route::{auth::model::User, post::model::Post, taxonomy::model::Category},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	pub from: String,
	pub to: Vec<String>,
	pub subject: String,
	pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
	#[error("no recipients")]
	NoRecipients,
}

#[axum::async_trait]
pub trait Mailer: Send + Sync + 'static {
	async fn send(&self, message: Message) -> Result<(), MailError>;
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[axum::async_trait]
impl Mailer for LogMailer {
	async fn send(&self, message: Message) -> Result<(), MailError> {
		if message.to.is_empty() {
			return Err(MailError::NoRecipients);
		}

		tracing::info!(
			from = %message.from,
			to = ?message.to,
			subject = %message.subject,
			"{}",
			message.body,
		);

		Ok(())
	}
}

/// The email sent to administrators when `post` is published.
pub fn publish_notice(
	config: &Config,
	post: &Post,
	author: &User,
	category: Option<&Category>,
	to: Vec<String>,
) -> Message {
	let author = author
		.full_name()
		.unwrap_or_else(|| author.username.clone());
	let category = category.map_or("None", |category| category.name.as_str());
	let published = post.published_at.unwrap_or(post.created_at);

	Message {
		from: config.from_email.clone(),
		to,
		subject: format!("New Post Published: {}", post.title),
		body: format!(
			"A new post has been published on the blog:\n\n\
			 Title: {title}\n\
			 Author: {author}\n\
			 Category: {category}\n\
			 Published: {published}\n\n\
			 View the post: {site}/posts/{slug}\n",
			title = post.title,
			site = config.site_url,
			slug = post.slug,
		),
	}
}

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Result, Store, StoreError, Unique};
use crate::{
	role::{Permission, Role},
	route::{
		auth::model::{NewUser, Session, UpdateProfileInput, User},
		comment::model::{Comment, CommentQuery},
		post::model::{Post, PostCounts, PostQuery, PostStatus},
		taxonomy::model::{Category, NewTerm, Tag},
	},
};

#[derive(Debug, Default)]
struct Inner {
	users: HashMap<Uuid, User>,
	roles: BTreeMap<Role, Vec<Permission>>,
	sessions: HashMap<Uuid, Session>,
	comment_times: HashMap<(Uuid, Uuid), DateTime<Utc>>,
	categories: HashMap<Uuid, Category>,
	tags: HashMap<Uuid, Tag>,
	posts: HashMap<Uuid, Post>,
	comments: HashMap<Uuid, Comment>,
}

impl Inner {
	fn check_user(&self, email: &str, username: &str, except: Option<Uuid>) -> Result<()> {
		for user in self.users.values().filter(|user| Some(user.id) != except) {
			if user.email == email {
				return Err(StoreError::Conflict(Unique::UserEmail));
			}

			if user.username == username {
				return Err(StoreError::Conflict(Unique::UserUsername));
			}
		}

		Ok(())
	}

	fn insert_user(&mut self, user: NewUser) -> Result<User> {
		self.check_user(&user.email, &user.username, None)?;

		let user = User {
			id: user.id,
			email: user.email,
			username: user.username,
			password: user.password,
			first_name: user.first_name,
			last_name: user.last_name,
			is_superuser: user.is_superuser,
			created_at: Utc::now(),
			roles: Vec::new(),
		};

		self.users.insert(user.id, user.clone());
		Ok(user)
	}

	fn create_session(&mut self, user_id: Uuid) -> Session {
		let session = Session {
			id: Uuid::new_v4(),
			user_id,
			created_at: Utc::now(),
		};

		self.sessions.insert(session.id, session.clone());
		session
	}

	fn check_post(&self, post: &Post) -> Result<()> {
		if self
			.posts
			.values()
			.any(|other| other.id != post.id && other.slug == post.slug)
		{
			return Err(StoreError::Conflict(Unique::PostSlug));
		}

		Ok(())
	}

	/// Drops a post and everything hanging off it.
	fn remove_post(&mut self, id: Uuid) -> bool {
		let removed = self.posts.remove(&id).is_some();

		self.comments.retain(|_, comment| comment.post_id != id);
		self.comment_times.retain(|(_, post_id), _| *post_id != id);

		removed
	}
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
	items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
	items
		.into_iter()
		.skip(usize::try_from(offset).unwrap_or(0))
		.take(usize::try_from(limit).unwrap_or(usize::MAX))
		.collect()
}

/// A [`Store`] kept entirely in memory, with the same uniqueness and
/// cascade rules as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[axum::async_trait]
impl Store for MemoryStore {
	async fn insert_user(&self, user: NewUser) -> Result<User> {
		self.inner.write().await.insert_user(user)
	}

	async fn register_user(&self, user: NewUser, role: Role) -> Result<(User, Session)> {
		let mut inner = self.inner.write().await;
		let mut user = inner.insert_user(user)?;

		if inner.roles.contains_key(&role) {
			user.roles.push(role);
			inner.users.insert(user.id, user.clone());
		}

		let session = inner.create_session(user.id);

		Ok((user, session))
	}

	async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
		Ok(self.inner.read().await.users.get(&id).cloned())
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
		let inner = self.inner.read().await;

		Ok(inner.users.values().find(|user| user.email == email).cloned())
	}

	async fn update_user(&self, id: Uuid, input: UpdateProfileInput) -> Result<User> {
		let mut inner = self.inner.write().await;

		let Some(current) = inner.users.get(&id).cloned() else {
			return Err(StoreError::Database(sqlx::Error::RowNotFound));
		};

		let email = input.email.unwrap_or(current.email.clone());
		inner.check_user(&email, &current.username, Some(id))?;

		let user = User {
			email,
			first_name: input.first_name.unwrap_or(current.first_name.clone()),
			last_name: input.last_name.unwrap_or(current.last_name.clone()),
			..current
		};

		inner.users.insert(id, user.clone());
		Ok(user)
	}

	async fn delete_user(&self, id: Uuid) -> Result<bool> {
		let mut inner = self.inner.write().await;

		if inner.users.remove(&id).is_none() {
			return Ok(false);
		}

		let sessions = inner
			.sessions
			.values()
			.filter(|session| session.user_id == id)
			.map(|session| session.id)
			.collect::<Vec<_>>();

		for session in &sessions {
			inner.sessions.remove(session);
		}

		inner
			.comment_times
			.retain(|(session, _), _| !sessions.contains(session));
		inner.comments.retain(|_, comment| comment.user_id != id);

		let posts = inner
			.posts
			.values()
			.filter(|post| post.author_id == id)
			.map(|post| post.id)
			.collect::<Vec<_>>();

		for post in posts {
			inner.remove_post(post);
		}

		Ok(true)
	}

	async fn admin_emails(&self) -> Result<Vec<String>> {
		let inner = self.inner.read().await;

		let mut emails = inner
			.users
			.values()
			.filter(|user| user.is_superuser || user.roles.contains(&Role::Admin))
			.map(|user| user.email.clone())
			.filter(|email| !email.is_empty())
			.collect::<Vec<_>>();

		emails.sort();
		emails.dedup();
		Ok(emails)
	}

	async fn ensure_role(&self, role: Role, permissions: &[Permission]) -> Result<bool> {
		let mut inner = self.inner.write().await;

		if inner.roles.contains_key(&role) {
			return Ok(false);
		}

		inner.roles.insert(role, permissions.to_vec());
		Ok(true)
	}

	async fn seeded_roles(&self) -> Result<Vec<Role>> {
		Ok(self.inner.read().await.roles.keys().copied().collect())
	}

	async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<bool> {
		let mut inner = self.inner.write().await;

		if !inner.roles.contains_key(&role) {
			return Ok(false);
		}

		if let Some(user) = inner.users.get_mut(&user_id) {
			if !user.roles.contains(&role) {
				user.roles.push(role);
				user.roles.sort();
			}
		}

		Ok(true)
	}

	async fn create_session(&self, user_id: Uuid) -> Result<Session> {
		Ok(self.inner.write().await.create_session(user_id))
	}

	async fn delete_session(&self, id: Uuid) -> Result<bool> {
		let mut inner = self.inner.write().await;

		inner.comment_times.retain(|(session, _), _| *session != id);
		Ok(inner.sessions.remove(&id).is_some())
	}

	async fn user_by_session(&self, session_id: Uuid) -> Result<Option<User>> {
		let inner = self.inner.read().await;

		Ok(inner
			.sessions
			.get(&session_id)
			.and_then(|session| inner.users.get(&session.user_id))
			.cloned())
	}

	async fn last_comment_at(&self, session_id: Uuid, post_id: Uuid) -> Result<Option<DateTime<Utc>>> {
		let inner = self.inner.read().await;

		Ok(inner.comment_times.get(&(session_id, post_id)).copied())
	}

	async fn categories(&self) -> Result<Vec<Category>> {
		let mut categories = self
			.inner
			.read()
			.await
			.categories
			.values()
			.cloned()
			.collect::<Vec<_>>();

		categories.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(categories)
	}

	async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>> {
		Ok(self.inner.read().await.categories.get(&id).cloned())
	}

	async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
		let inner = self.inner.read().await;

		Ok(inner
			.categories
			.values()
			.find(|category| category.slug == slug)
			.cloned())
	}

	async fn category_slug_taken(&self, slug: &str) -> Result<bool> {
		Ok(self.category_by_slug(slug).await?.is_some())
	}

	async fn get_or_create_category(&self, term: NewTerm) -> Result<(Category, bool)> {
		let mut inner = self.inner.write().await;

		if let Some(category) = inner.categories.values().find(|c| c.name == term.name) {
			return Ok((category.clone(), false));
		}

		if inner.categories.values().any(|c| c.slug == term.slug) {
			return Err(StoreError::Conflict(Unique::CategorySlug));
		}

		let category = Category {
			id: Uuid::new_v4(),
			name: term.name,
			slug: term.slug,
			created_at: Utc::now(),
		};

		inner.categories.insert(category.id, category.clone());
		Ok((category, true))
	}

	async fn delete_category(&self, id: Uuid) -> Result<bool> {
		let mut inner = self.inner.write().await;

		if inner.categories.remove(&id).is_none() {
			return Ok(false);
		}

		for post in inner.posts.values_mut() {
			if post.category_id == Some(id) {
				post.category_id = None;
			}
		}

		Ok(true)
	}

	async fn tags(&self) -> Result<Vec<Tag>> {
		let mut tags = self
			.inner
			.read()
			.await
			.tags
			.values()
			.cloned()
			.collect::<Vec<_>>();

		tags.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(tags)
	}

	async fn tags_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Tag>> {
		let inner = self.inner.read().await;

		let mut tags = ids
			.iter()
			.filter_map(|id| inner.tags.get(id))
			.cloned()
			.collect::<Vec<_>>();

		tags.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(tags)
	}

	async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
		let inner = self.inner.read().await;

		Ok(inner.tags.values().find(|tag| tag.slug == slug).cloned())
	}

	async fn tag_slug_taken(&self, slug: &str) -> Result<bool> {
		Ok(self.tag_by_slug(slug).await?.is_some())
	}

	async fn get_or_create_tag(&self, term: NewTerm) -> Result<(Tag, bool)> {
		let mut inner = self.inner.write().await;

		if let Some(tag) = inner.tags.values().find(|t| t.name == term.name) {
			return Ok((tag.clone(), false));
		}

		if inner.tags.values().any(|t| t.slug == term.slug) {
			return Err(StoreError::Conflict(Unique::TagSlug));
		}

		let tag = Tag {
			id: Uuid::new_v4(),
			name: term.name,
			slug: term.slug,
			created_at: Utc::now(),
		};

		inner.tags.insert(tag.id, tag.clone());
		Ok((tag, true))
	}

	async fn post_slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool> {
		let inner = self.inner.read().await;

		Ok(inner
			.posts
			.values()
			.any(|post| post.slug == slug && Some(post.id) != exclude))
	}

	async fn insert_post(&self, post: &Post) -> Result<Post> {
		let mut inner = self.inner.write().await;

		inner.check_post(post)?;
		inner.posts.insert(post.id, post.clone());

		Ok(post.clone())
	}

	async fn update_post(&self, post: &Post) -> Result<Post> {
		let mut inner = self.inner.write().await;

		if !inner.posts.contains_key(&post.id) {
			return Err(StoreError::Database(sqlx::Error::RowNotFound));
		}

		inner.check_post(post)?;
		inner.posts.insert(post.id, post.clone());

		Ok(post.clone())
	}

	async fn delete_post(&self, id: Uuid) -> Result<bool> {
		Ok(self.inner.write().await.remove_post(id))
	}

	async fn post_by_id(&self, id: Uuid) -> Result<Option<Post>> {
		Ok(self.inner.read().await.posts.get(&id).cloned())
	}

	async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
		let inner = self.inner.read().await;

		Ok(inner.posts.values().find(|post| post.slug == slug).cloned())
	}

	async fn posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
		let inner = self.inner.read().await;

		let mut posts = inner
			.posts
			.values()
			.filter(|post| query.matches(post))
			.cloned()
			.collect::<Vec<_>>();

		newest_first(&mut posts, |post| (post.created_at, post.id));
		Ok(page(posts, query.limit, query.offset))
	}

	async fn post_counts(&self, author_id: Option<Uuid>) -> Result<PostCounts> {
		let inner = self.inner.read().await;

		let mut counts = PostCounts::default();

		for post in inner
			.posts
			.values()
			.filter(|post| author_id.map_or(true, |id| post.author_id == id))
		{
			counts.total += 1;

			match post.status {
				PostStatus::Published => counts.published += 1,
				PostStatus::Draft => counts.drafts += 1,
			}
		}

		Ok(counts)
	}

	async fn insert_comment(&self, comment: &Comment, session_id: Option<Uuid>) -> Result<Comment> {
		let mut inner = self.inner.write().await;

		if !inner.posts.contains_key(&comment.post_id) || !inner.users.contains_key(&comment.user_id) {
			return Err(StoreError::Database(sqlx::Error::RowNotFound));
		}

		inner.comments.insert(comment.id, comment.clone());

		if let Some(session_id) = session_id.filter(|id| inner.sessions.contains_key(id)) {
			inner
				.comment_times
				.insert((session_id, comment.post_id), comment.created_at);
		}

		Ok(comment.clone())
	}

	async fn comment_by_id(&self, id: Uuid) -> Result<Option<Comment>> {
		Ok(self.inner.read().await.comments.get(&id).cloned())
	}

	async fn approve_comment(&self, id: Uuid) -> Result<Option<Comment>> {
		let mut inner = self.inner.write().await;

		Ok(inner.comments.get_mut(&id).map(|comment| {
			comment.is_approved = true;
			comment.updated_at = Utc::now();
			comment.clone()
		}))
	}

	async fn delete_comment(&self, id: Uuid) -> Result<bool> {
		Ok(self.inner.write().await.comments.remove(&id).is_some())
	}

	async fn comments(&self, query: &CommentQuery) -> Result<Vec<Comment>> {
		let inner = self.inner.read().await;

		let mut comments = inner
			.comments
			.values()
			.filter(|comment| query.post_id.map_or(true, |id| comment.post_id == id))
			.filter(|comment| !query.approved_only || comment.is_approved)
			.filter(|comment| {
				query.post_author_id.map_or(true, |author| {
					inner
						.posts
						.get(&comment.post_id)
						.is_some_and(|post| post.author_id == author)
				})
			})
			.cloned()
			.collect::<Vec<_>>();

		newest_first(&mut comments, |comment| (comment.created_at, comment.id));
		Ok(page(comments, query.limit, query.offset))
	}

	async fn approved_comment_count(&self, post_id: Uuid) -> Result<i64> {
		let inner = self.inner.read().await;

		let count = inner
			.comments
			.values()
			.filter(|comment| comment.post_id == post_id && comment.is_approved)
			.count();

		Ok(i64::try_from(count).unwrap_or(i64::MAX))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::test::{comment_on, new_user, post_by};

	#[tokio::test]
	async fn test_duplicate_email_and_username_conflict() {
		let store = MemoryStore::new();
		store.insert_user(new_user("alice")).await.unwrap();

		let mut same_email = new_user("bob");
		same_email.email = "alice@example.com".into();
		assert!(matches!(
			store.insert_user(same_email).await,
			Err(StoreError::Conflict(Unique::UserEmail))
		));

		let mut same_name = new_user("alice");
		same_name.email = "other@example.com".into();
		assert!(matches!(
			store.insert_user(same_name).await,
			Err(StoreError::Conflict(Unique::UserUsername))
		));
	}

	#[tokio::test]
	async fn test_assign_role_requires_seeded_role() {
		let store = MemoryStore::new();
		let user = store.insert_user(new_user("alice")).await.unwrap();

		assert!(!store.assign_role(user.id, Role::Reader).await.unwrap());

		store.ensure_role(Role::Reader, &[]).await.unwrap();
		assert!(store.assign_role(user.id, Role::Reader).await.unwrap());
		assert!(store.assign_role(user.id, Role::Reader).await.unwrap());

		let session = store.create_session(user.id).await.unwrap();
		let user = store.user_by_session(session.id).await.unwrap().unwrap();
		assert_eq!(user.roles, vec![Role::Reader]);
	}

	#[tokio::test]
	async fn test_register_user_attaches_seeded_role_only() {
		let store = MemoryStore::new();

		let (user, session) = store.register_user(new_user("early"), Role::Author).await.unwrap();
		assert!(user.roles.is_empty());
		assert_eq!(session.user_id, user.id);

		store.ensure_role(Role::Author, &[]).await.unwrap();

		let (user, session) = store.register_user(new_user("late"), Role::Author).await.unwrap();
		assert_eq!(user.roles, vec![Role::Author]);

		let stored = store.user_by_session(session.id).await.unwrap().unwrap();
		assert_eq!(stored.roles, vec![Role::Author]);
	}

	#[tokio::test]
	async fn test_comment_time_is_recorded_with_the_comment() {
		let store = MemoryStore::new();
		let author = store.insert_user(new_user("author")).await.unwrap();
		let post = store
			.insert_post(&post_by(&author, PostStatus::Published))
			.await
			.unwrap();
		let session = store.create_session(author.id).await.unwrap();

		let comment = comment_on(&post, &author, true);
		store.insert_comment(&comment, Some(session.id)).await.unwrap();

		assert_eq!(
			store.last_comment_at(session.id, post.id).await.unwrap(),
			Some(comment.created_at)
		);
	}

	#[tokio::test]
	async fn test_deleting_user_cascades() {
		let store = MemoryStore::new();
		let author = store.insert_user(new_user("author")).await.unwrap();
		let reader = store.insert_user(new_user("reader")).await.unwrap();

		let mut own = post_by(&author, PostStatus::Published);
		own.slug = "own".into();
		store.insert_post(&own).await.unwrap();

		let mut other = post_by(&reader, PostStatus::Published);
		other.slug = "other".into();
		store.insert_post(&other).await.unwrap();

		let on_own = comment_on(&own, &reader, true);
		let by_author = comment_on(&other, &author, true);
		store.insert_comment(&on_own, None).await.unwrap();
		store.insert_comment(&by_author, None).await.unwrap();

		assert!(store.delete_user(author.id).await.unwrap());

		assert!(store.post_by_id(own.id).await.unwrap().is_none());
		assert!(store.post_by_id(other.id).await.unwrap().is_some());
		assert!(store.comment_by_id(on_own.id).await.unwrap().is_none());
		assert!(store.comment_by_id(by_author.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_deleting_category_keeps_posts() {
		let store = MemoryStore::new();
		let author = store.insert_user(new_user("author")).await.unwrap();
		let (category, created) = store
			.get_or_create_category(NewTerm {
				name: "Rust".into(),
				slug: "rust".into(),
			})
			.await
			.unwrap();
		assert!(created);

		let mut post = post_by(&author, PostStatus::Published);
		post.slug = "post".into();
		post.category_id = Some(category.id);
		store.insert_post(&post).await.unwrap();

		assert!(store.delete_category(category.id).await.unwrap());

		let post = store.post_by_id(post.id).await.unwrap().unwrap();
		assert_eq!(post.category_id, None);
	}

	#[tokio::test]
	async fn test_get_or_create_is_idempotent() {
		let store = MemoryStore::new();
		let term = NewTerm {
			name: "Rust".into(),
			slug: "rust".into(),
		};

		let (first, created) = store.get_or_create_tag(term.clone()).await.unwrap();
		assert!(created);

		let (second, created) = store.get_or_create_tag(term).await.unwrap();
		assert!(!created);
		assert_eq!(first, second);
		assert_eq!(store.tags().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_post_slug_is_unique() {
		let store = MemoryStore::new();
		let author = store.insert_user(new_user("author")).await.unwrap();

		let mut first = post_by(&author, PostStatus::Draft);
		first.slug = "hello".into();
		store.insert_post(&first).await.unwrap();

		assert!(store.post_slug_taken("hello", None).await.unwrap());
		assert!(!store.post_slug_taken("hello", Some(first.id)).await.unwrap());

		let mut second = post_by(&author, PostStatus::Draft);
		second.slug = "hello".into();
		assert!(matches!(
			store.insert_post(&second).await,
			Err(StoreError::Conflict(Unique::PostSlug))
		));
	}
}
